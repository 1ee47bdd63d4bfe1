use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragprep_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ragprep");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let posts = [
        json!({"post_id": 101, "thread_id": 7, "post_number": 1, "username": "ann",
               "thread_title": "GA2 deadline?", "content": "When is GA2 due? 🙏",
               "created_at": "2025-02-01T09:00:00Z", "post_url": "https://forum.test/t/7/1",
               "category_id": 34, "like_count": 2}),
        json!({"post_id": 102, "thread_id": 7, "post_number": 2, "username": "bob",
               "thread_title": "GA2 deadline?", "content": "Sunday.\n\n\n\nCheck the calendar.",
               "created_at": "2025-02-01T10:00:00Z", "post_url": "https://forum.test/t/7/2",
               "reply_to": 1, "image_paths": ["images/cal.png"]}),
        json!({"post_id": 103, "thread_id": 7, "post_number": 3, "username": "cy",
               "thread_title": "GA2 deadline?", "content": "Thanks!"}),
    ];
    let jsonl: String = posts.iter().map(|p| format!("{}\n", p)).collect();
    fs::write(data_dir.join("posts.jsonl"), jsonl).unwrap();

    let pages = json!([
        {"url": "https://tds.test/#/2025-01/", "content": "Tools in Data Science\n\nA practical course."},
        {"url": "https://tds.test/#/docker", "content": "Docker\n\nDocker runs containers.",
         "title": "Docker", "image_urls": ["https://tds.test/whale.png"],
         "links": ["https://docs.docker.com/"]}
    ]);
    fs::write(
        data_dir.join("pages.json"),
        serde_json::to_string_pretty(&pages).unwrap(),
    )
    .unwrap();

    let config_content = format!(
        r#"[chunk]
input = "{root}/data/pages.json"
output = "{root}/data/chunks.json"
max_tokens = 700

[enrich]
input = "{root}/data/posts.jsonl"
output = "{root}/out/rag_documents.jsonl"
posts_output = "{root}/out/posts_with_context.json"
context_size = 3

[merge]
course = "{root}/data/chunks.json"
discourse = "{root}/out/posts_with_context.json"
output = "{root}/out/combined.json"
"#,
        root = root.display()
    );

    let config_path = root.join("ragprep.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ragprep(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragprep_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragprep binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_jsonl(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_enrich_writes_documents() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragprep(&config_path, &["enrich"]);
    assert!(success, "enrich failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents written: 3"));
    assert!(stdout.contains("ok"));

    let docs = read_jsonl(&tmp.path().join("out/rag_documents.jsonl"));
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0]["id"], json!("7_1"));
    assert_eq!(docs[0]["text"], json!("GA2 deadline?\n\n\n\nann: When is GA2 due?"));
    assert_eq!(
        docs[2]["text"],
        json!("GA2 deadline?\n\nann: When is GA2 due?\n\nbob: Sunday.\n\nCheck the calendar.\n\ncy: Thanks!")
    );
    assert_eq!(docs[1]["meta"]["image_paths"], json!(["images/cal.png"]));
    assert_eq!(docs[2]["meta"]["category"], Value::Null);
}

#[test]
fn test_enrich_context_size_flag() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragprep(&config_path, &["enrich", "--context-size", "1"]);
    assert!(success, "enrich failed: {}", stderr);

    let posts: Vec<Value> = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("out/posts_with_context.json")).unwrap(),
    )
    .unwrap();
    let ctx = posts[2]["thread_context"].as_array().unwrap();
    assert_eq!(ctx.len(), 1);
    assert_eq!(ctx[0]["username"], json!("bob"));
    // The raw post keeps its original content, emoji included.
    assert_eq!(posts[0]["content"], json!("When is GA2 due? 🙏"));
}

#[test]
fn test_full_offline_pipeline() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragprep(&config_path, &["chunk"]);
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("chunks written: 2"));

    let (_, stderr, success) = run_ragprep(&config_path, &["enrich"]);
    assert!(success, "enrich failed: {}", stderr);

    let (stdout, stderr, success) = run_ragprep(&config_path, &["merge"]);
    assert!(success, "merge failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("combined records: 5"));

    let combined: Vec<Value> = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("out/combined.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(combined.len(), 5);

    assert_eq!(combined[0]["source"], json!("course_content"));
    assert_eq!(combined[0]["id"], json!("2025-01_0"));
    assert_eq!(combined[0]["title"], json!("Tools in Data Science"));
    assert_eq!(combined[0]["metadata"]["description"], json!("A practical course."));

    assert_eq!(combined[1]["id"], json!("docker_0"));
    assert_eq!(combined[1]["metadata"]["embedded_urls"], json!(["https://docs.docker.com/"]));

    assert_eq!(combined[2]["source"], json!("discourse"));
    assert_eq!(combined[2]["id"], json!("101"));
    assert_eq!(combined[2]["metadata"]["like_count"], json!(2));
    assert_eq!(combined[3]["metadata"]["reply_to"], json!(1));
    assert_eq!(combined[4]["metadata"]["reply_count"], json!(0));
    assert_eq!(
        combined[4]["metadata"]["thread_context"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_merge_missing_input_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragprep(&config_path, &["merge"]);
    assert!(!success);
    assert!(stderr.contains("Failed to open"));
}

#[test]
fn test_init_refuses_overwrite() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config/ragprep.toml");

    let (stdout, stderr, success) = run_ragprep(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(config_path.exists());

    let (_, stderr, success) = run_ragprep(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("already exists"));
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("ragprep.toml");
    fs::write(&config_path, "[chunk]\nmax_tokens = 0\n").unwrap();

    let (_, stderr, success) = run_ragprep(&config_path, &["merge"]);
    assert!(!success);
    assert!(stderr.contains("chunk.max_tokens"));
}

//! Job progress reporting.
//!
//! Reports what each job is doing (which file is being read, how many pages
//! or posts are done, where output goes) so long crawls are observable.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Reading input or discovering work. Total unknown.
    Loading { job: String, what: String },
    /// `n` of `total` units processed; `item` names the current unit.
    Processing {
        job: String,
        n: u64,
        total: u64,
        item: Option<String>,
    },
    /// Writing output to `path`.
    Writing { job: String, path: String },
}

/// Reports job progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "crawl  processing  12 / 48  #/2025-01/docker".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Loading { job, what } => format!("{}  loading {}\n", job, what),
            ProgressEvent::Processing {
                job,
                n,
                total,
                item,
            } => {
                let mut line = format!(
                    "{}  processing  {} / {}",
                    job,
                    format_number(*n),
                    format_number(*total)
                );
                if let Some(item) = item {
                    line.push_str("  ");
                    line.push_str(item);
                }
                line.push('\n');
                line
            }
            ProgressEvent::Writing { job, path } => format!("{}  writing {}\n", job, path),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Loading { job, what } => serde_json::json!({
                "event": "progress",
                "job": job,
                "phase": "loading",
                "what": what
            }),
            ProgressEvent::Processing {
                job,
                n,
                total,
                item,
            } => serde_json::json!({
                "event": "progress",
                "job": job,
                "phase": "processing",
                "n": n,
                "total": total,
                "item": item
            }),
            ProgressEvent::Writing { job, path } => serde_json::json!({
                "event": "progress",
                "job": job,
                "phase": "writing",
                "path": path
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Captures events for assertions.
    #[derive(Default)]
    pub struct RecordingProgress {
        pub events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn off_mode_is_silent() {
        // NoProgress must accept events without side effects.
        ProgressMode::Off.reporter().report(ProgressEvent::Loading {
            job: "merge".into(),
            what: "x".into(),
        });
    }
}

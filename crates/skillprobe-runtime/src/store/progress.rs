//! Append-only live progress log.
//!
//! One timestamped line per event, flushed per write, so `tail -f` on
//! the file shows a long run moving without waiting for completion.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use super::StoreError;

/// Append-only progress log.
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    /// Designate a progress log file. Created on first event.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one event line.
    pub fn event(&self, scenario_id: &str, message: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{} [{}] {}", Utc::now().to_rfc3339(), scenario_id, message)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_append_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ProgressLog::new(tmp.path().join("progress.log"));

        log.event("scn-a", "baseline invocation started").unwrap();
        log.event("scn-a", "baseline captured").unwrap();
        log.event("scn-a", "treatment invocation started").unwrap();

        let contents = std::fs::read_to_string(tmp.path().join("progress.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("baseline invocation started"));
        assert!(lines[2].contains("treatment invocation started"));
        assert!(lines.iter().all(|l| l.contains("[scn-a]")));
    }
}

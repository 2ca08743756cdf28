//! Result persistence.
//!
//! Three separate surfaces, with different mutability rules:
//!
//! - **Run directories** ([`RunDir`]): one per run, exclusively owned
//!   by the run that created it, append-only while the run executes and
//!   immutable afterward. One file per transcript, one per judgment,
//!   one report/summary file.
//! - **The ledger** ([`Ledger`]): the single mutable shared structure,
//!   an upsert keyed by scenario id behind a single-writer lock.
//! - **The progress log** ([`ProgressLog`]): append-only lines an
//!   observer can tail while a long run is still executing.

mod ledger;
mod progress;

pub use ledger::{Ledger, LedgerEntry, RunKind};
pub use progress::ProgressLog;

use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use skillprobe_core::{DifferentialReport, RunSummary, Transcript};

/// Errors from result persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Filesystem error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Ledger is corrupt: {0}")]
    LedgerCorrupt(String),
}

/// A per-run artifact directory.
///
/// Created once, written to only by the run that owns it. Behavioral
/// failures never suppress writes here; the artifacts are the primary
/// debugging aid.
#[derive(Debug, Clone)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    /// Create a uniquely named run directory under `results_dir`.
    ///
    /// The name is `<scenario-id>-<YYYYMMDD-HHMMSS>`; two runs started
    /// within the same wall-clock second get `-2`, `-3`, ... suffixes.
    /// `create_dir` failing on an existing path is what makes the probe
    /// race-safe on a single host.
    pub fn create(results_dir: &Path, scenario_id: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(results_dir)?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let base = format!("{}-{}", scenario_id, stamp);

        let mut candidate = results_dir.join(&base);
        let mut tiebreak = 1u32;
        loop {
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(Self { path: candidate }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tiebreak += 1;
                    candidate = results_dir.join(format!("{}-{}", base, tiebreak));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one transcript artifact (`baseline.md`, `treatment.md`, or
    /// `plan.md`).
    pub fn write_transcript(&self, transcript: &Transcript) -> Result<PathBuf, StoreError> {
        let path = self.path.join(format!("{}.md", transcript.variant.file_stem()));
        fs::write(&path, &transcript.text)?;
        tracing::debug!(path = %path.display(), "Wrote transcript artifact");
        Ok(path)
    }

    /// Write one per-domain judgment artifact.
    pub fn write_judgment(&self, judgment: &skillprobe_core::Judgment) -> Result<PathBuf, StoreError> {
        let path = self.path.join(format!("judgment-{}.json", judgment.domain));
        fs::write(&path, serde_json::to_string_pretty(judgment)?)?;
        Ok(path)
    }

    /// Write the classification report for a differential run.
    pub fn write_report(&self, report: &DifferentialReport) -> Result<PathBuf, StoreError> {
        let path = self.path.join("report.json");
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }

    /// Write the summary for a judged run.
    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf, StoreError> {
        let path = self.path.join("summary.json");
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillprobe_core::Variant;
    use std::time::Duration;

    #[test]
    fn test_same_second_runs_get_distinct_dirs() {
        let tmp = tempfile::tempdir().unwrap();

        // Two creations inside one wall-clock second must not collide.
        let first = RunDir::create(tmp.path(), "scn").unwrap();
        let second = RunDir::create(tmp.path(), "scn").unwrap();
        let third = RunDir::create(tmp.path(), "scn").unwrap();

        assert_ne!(first.path(), second.path());
        assert_ne!(second.path(), third.path());
        assert!(first.path().is_dir());
        assert!(second.path().is_dir());
        assert!(third.path().is_dir());
    }

    #[test]
    fn test_transcript_artifact_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = RunDir::create(tmp.path(), "scn").unwrap();

        let transcript =
            Transcript::new("scn", Variant::Baseline, "use deliver_now", Duration::from_secs(1));
        let path = dir.write_transcript(&transcript).unwrap();

        assert_eq!(path.file_name().unwrap(), "baseline.md");
        assert_eq!(fs::read_to_string(path).unwrap(), "use deliver_now");
    }

    #[test]
    fn test_judgment_artifact_is_named_by_domain() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = RunDir::create(tmp.path(), "scn").unwrap();

        let judgment = skillprobe_core::Judgment {
            domain: "security".to_string(),
            score: 10,
            issues: vec![],
            suggestions: vec![],
            critical_blockers: vec!["missing foreign key constraint".to_string()],
        };
        let path = dir.write_judgment(&judgment).unwrap();
        assert_eq!(path.file_name().unwrap(), "judgment-security.json");

        let back: skillprobe_core::Judgment =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, judgment);
    }
}

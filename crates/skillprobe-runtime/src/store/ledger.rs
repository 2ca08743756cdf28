//! The cumulative ledger.
//!
//! One JSON file tracking the latest outcome per scenario across runs.
//! This is the only mutable shared structure in the harness: writes are
//! upserts keyed by scenario id (optionally qualified by branch),
//! last-write-wins, serialized through a single-writer lock. The file
//! is replaced atomically (temp file + rename) so a reader never
//! observes a half-written ledger.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use super::StoreError;

/// What kind of run produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Differential,
    Judged,
}

/// The latest recorded outcome for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Scenario identifier.
    pub scenario_id: String,

    /// Branch qualifier, when runs are tracked per branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Differential or judged.
    pub kind: RunKind,

    /// Final verdict of the run.
    pub pass: bool,

    /// Judged runs: total awarded score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<u32>,

    /// Judged runs: maximum possible score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<u32>,

    /// Differential runs: number of failing assertions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_assertions: Option<usize>,

    /// Critical blockers carried by the run, domain-prefixed.
    #[serde(default)]
    pub critical_blockers: Vec<String>,

    /// Artifact directory for manual inspection.
    pub run_dir: String,

    /// When this entry was last written.
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn key(&self) -> String {
        match &self.branch {
            Some(branch) => format!("{}@{}", self.scenario_id, branch),
            None => self.scenario_id.clone(),
        }
    }
}

/// Single-writer cumulative ledger.
pub struct Ledger {
    path: PathBuf,
    // Serializes upserts within this process; cross-process discipline
    // is one-harness-per-results-dir.
    write_lock: Mutex<()>,
}

impl Ledger {
    /// Open (or designate) a ledger file. The file is created on first
    /// upsert.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Insert or replace the entry for this scenario. Last write wins.
    pub fn upsert(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();

        let mut entries = self.load_map()?;
        let key = entry.key();
        tracing::debug!(key = %key, pass = entry.pass, "Ledger upsert");
        entries.insert(key, entry);

        // Atomic replace: a tailing reader sees old or new, never half.
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, serde_json::to_string_pretty(&entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// All entries, ordered by key.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let _guard = self.write_lock.lock();
        Ok(self.load_map()?.into_values().collect())
    }

    /// Look up the latest entry for a scenario (unqualified key).
    pub fn get(&self, scenario_id: &str) -> Result<Option<LedgerEntry>, StoreError> {
        let _guard = self.write_lock.lock();
        Ok(self.load_map()?.remove(scenario_id))
    }

    fn load_map(&self) -> Result<BTreeMap<String, LedgerEntry>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StoreError::LedgerCorrupt(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

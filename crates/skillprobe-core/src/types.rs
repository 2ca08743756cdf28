//! Shared record types for transcripts and judgments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which arm of a run produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Agent invoked without any injected knowledge module.
    Baseline,
    /// Agent invoked with the knowledge module prepended to the system prompt.
    Treatment,
    /// A full implementation plan, produced for judged evaluation.
    Plan,
}

impl Variant {
    /// Stable file stem used for on-disk artifacts.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Treatment => "treatment",
            Variant::Plan => "plan",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// A captured agent response. Write-once: nothing mutates a transcript
/// after the invocation that produced it returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Scenario this transcript belongs to.
    pub scenario_id: String,

    /// Which arm produced it.
    pub variant: Variant,

    /// Full response text from the agent. Never inspected for meaning
    /// beyond literal substring checks.
    pub text: String,

    /// When the invocation completed.
    pub captured_at: DateTime<Utc>,

    /// Wall-clock duration of the invocation.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl Transcript {
    /// Create a transcript captured now.
    pub fn new(
        scenario_id: impl Into<String>,
        variant: Variant,
        text: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            variant,
            text: text.into(),
            captured_at: Utc::now(),
            duration,
        }
    }
}

/// One domain's verdict on a transcript. Immutable once returned by a judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Rubric domain this judgment covers (e.g. "backend").
    pub domain: String,

    /// Awarded score, bounded by the domain's maximum.
    pub score: u32,

    /// Problems the judge identified.
    #[serde(default)]
    pub issues: Vec<String>,

    /// Non-blocking improvement suggestions.
    #[serde(default)]
    pub suggestions: Vec<String>,

    /// Issues severe enough to force failure regardless of score.
    #[serde(default)]
    pub critical_blockers: Vec<String>,
}

impl Judgment {
    /// Whether this judgment carries any critical blocker.
    pub fn has_blocker(&self) -> bool {
        !self.critical_blockers.is_empty()
    }
}

/// Serialize a `Duration` as fractional seconds, matching how run
/// timings are reported in summaries.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_file_stems_are_distinct() {
        assert_eq!(Variant::Baseline.file_stem(), "baseline");
        assert_eq!(Variant::Treatment.file_stem(), "treatment");
        assert_eq!(Variant::Plan.file_stem(), "plan");
    }

    #[test]
    fn test_transcript_roundtrip() {
        let t = Transcript::new("scn-1", Variant::Baseline, "hello", Duration::from_millis(1500));
        let json = serde_json::to_string(&t).unwrap();
        let back: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scenario_id, "scn-1");
        assert_eq!(back.variant, Variant::Baseline);
        assert_eq!(back.text, "hello");
        assert!((back.duration.as_secs_f64() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_judgment_blocker_detection() {
        let clean = Judgment {
            domain: "backend".to_string(),
            score: 40,
            issues: vec![],
            suggestions: vec![],
            critical_blockers: vec![],
        };
        assert!(!clean.has_blocker());

        let blocked = Judgment {
            critical_blockers: vec!["missing foreign key constraint".to_string()],
            ..clean
        };
        assert!(blocked.has_blocker());
    }
}

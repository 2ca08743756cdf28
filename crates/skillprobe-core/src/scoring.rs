//! Scoring aggregation for judged runs.
//!
//! This is a pure fan-in: all nondeterminism lives upstream in the
//! invoker and judge coordinator. Given fixed judgments the summary is
//! fully determined, which is what makes it unit-testable.
//!
//! Aggregation rules are strict and non-configurable:
//! 1. A score outside `[0, domain_max]` is fatal — never clamped.
//! 2. Any critical blocker on any domain forces `pass = false`,
//!    regardless of the total score.
//! 3. Otherwise `pass = total_score >= threshold * max_score`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::rubric::Rubric;
use crate::types::Judgment;

/// Errors from score aggregation.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Score {score} for domain '{domain}' is out of bounds [0, {max}]")]
    InvalidScore { domain: String, score: u32, max: u32 },

    #[error("Judgment for unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Duplicate judgment for domain: {0}")]
    DuplicateDomain(String),

    #[error("No judgment returned for domain: {0}")]
    MissingDomain(String),
}

/// Wall-clock timings carried into the summary for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTimings {
    /// Seconds spent invoking the agent.
    pub invocation_secs: f64,

    /// Seconds spent judging the transcript.
    pub judging_secs: f64,
}

/// The aggregate verdict for one judged run. Computed once, then
/// appended to the ledger; never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario this run executed.
    pub scenario_id: String,

    /// Every per-domain judgment, in rubric order.
    pub judgments: Vec<Judgment>,

    /// Sum of all judgment scores.
    pub total_score: u32,

    /// Sum of all rubric domain maxima.
    pub max_score: u32,

    /// Pass threshold the summary was computed against.
    pub threshold: f64,

    /// Final verdict.
    pub pass: bool,

    /// Every critical blocker, prefixed with its domain.
    pub critical_blockers: Vec<String>,

    /// Wall-clock timings for reporting.
    pub timings: RunTimings,

    /// When the summary was computed.
    pub computed_at: DateTime<Utc>,
}

impl RunSummary {
    /// Total score as a percentage of the maximum.
    pub fn percentage(&self) -> f64 {
        if self.max_score == 0 {
            0.0
        } else {
            100.0 * f64::from(self.total_score) / f64::from(self.max_score)
        }
    }
}

/// Aggregate per-domain judgments into a run summary.
///
/// Every rubric domain must be judged exactly once; a judgment for a
/// domain the rubric does not name is an error, as is a score above
/// the domain maximum.
pub fn summarize(
    scenario_id: &str,
    judgments: &[Judgment],
    rubric: &Rubric,
    timings: RunTimings,
) -> Result<RunSummary, ScoreError> {
    let mut seen = HashSet::new();
    for judgment in judgments {
        let domain = rubric
            .domain(&judgment.domain)
            .ok_or_else(|| ScoreError::UnknownDomain(judgment.domain.clone()))?;
        if judgment.score > domain.max_score {
            return Err(ScoreError::InvalidScore {
                domain: judgment.domain.clone(),
                score: judgment.score,
                max: domain.max_score,
            });
        }
        if !seen.insert(judgment.domain.clone()) {
            return Err(ScoreError::DuplicateDomain(judgment.domain.clone()));
        }
    }
    for domain in &rubric.domains {
        if !seen.contains(&domain.name) {
            return Err(ScoreError::MissingDomain(domain.name.clone()));
        }
    }

    // Reorder into rubric order so reports are stable regardless of
    // which judge call returned first.
    let mut ordered: Vec<Judgment> = Vec::with_capacity(rubric.domains.len());
    for domain in &rubric.domains {
        if let Some(j) = judgments.iter().find(|j| j.domain == domain.name) {
            ordered.push(j.clone());
        }
    }

    let total_score: u32 = ordered.iter().map(|j| j.score).sum();
    let max_score = rubric.max_score();

    let critical_blockers: Vec<String> = ordered
        .iter()
        .flat_map(|j| j.critical_blockers.iter().map(move |b| format!("{}: {}", j.domain, b)))
        .collect();

    let above_threshold = f64::from(total_score) >= rubric.threshold * f64::from(max_score);
    let pass = above_threshold && critical_blockers.is_empty();

    Ok(RunSummary {
        scenario_id: scenario_id.to_string(),
        judgments: ordered,
        total_score,
        max_score,
        threshold: rubric.threshold,
        pass,
        critical_blockers,
        timings,
        computed_at: Utc::now(),
    })
}

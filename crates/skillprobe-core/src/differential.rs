//! RED/GREEN assertion classification.
//!
//! Given a baseline transcript (no knowledge module) and a treatment
//! transcript (module injected), every assertion must be absent from
//! the baseline and present in the treatment. Matching is plain literal
//! substring matching, applied identically to both arms. A substring
//! that happens to match inside an unrelated word is an accepted
//! limitation; so is a phrasing-variance false negative. The check is
//! deterministic, and that matters more than recall.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Transcript;

/// Why an assertion failed the differential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// The baseline already contains the pattern: the model exhibits
    /// the desired behavior unprompted, so the test proves nothing.
    BaselineContaminated,
    /// The treatment lacks the pattern: the module failed to induce it.
    MissingPattern,
}

/// Outcome of checking one assertion against both transcripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// The literal substring being checked.
    pub assertion: String,

    /// Whether the baseline transcript contains it.
    pub found_in_baseline: bool,

    /// Whether the treatment transcript contains it.
    pub found_in_treatment: bool,

    /// Failure classification, if any. `None` means this assertion
    /// behaved exactly as a working skill should make it behave.
    pub classification: Option<Classification>,
}

impl AssertionResult {
    /// Whether this assertion passed both arms.
    pub fn passed(&self) -> bool {
        self.classification.is_none()
    }
}

/// Full report for one differential run. Persisted whether or not the
/// run passed; a failing report is itself valid data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialReport {
    /// Scenario the report belongs to.
    pub scenario_id: String,

    /// Per-assertion outcomes, in scenario order.
    pub results: Vec<AssertionResult>,

    /// True iff no classification fired on any assertion.
    pub pass: bool,

    /// When the classification ran.
    pub classified_at: DateTime<Utc>,
}

impl DifferentialReport {
    /// The subset of results that failed, in scenario order.
    pub fn failures(&self) -> impl Iterator<Item = &AssertionResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

/// Classify every assertion against the two transcripts.
///
/// Pure: transcript text in, report out. Both invocations must already
/// have completed; sequencing them is the runner's job, not this one's.
pub fn classify(
    assertions: &[String],
    baseline: &Transcript,
    treatment: &Transcript,
) -> DifferentialReport {
    let results: Vec<AssertionResult> = assertions
        .iter()
        .map(|assertion| {
            let found_in_baseline = baseline.text.contains(assertion.as_str());
            let found_in_treatment = treatment.text.contains(assertion.as_str());

            // Baseline contamination is checked first: a pattern the
            // model already produces unprompted weakens the test even
            // if the treatment also produces it.
            let classification = if found_in_baseline {
                Some(Classification::BaselineContaminated)
            } else if !found_in_treatment {
                Some(Classification::MissingPattern)
            } else {
                None
            };

            AssertionResult {
                assertion: assertion.clone(),
                found_in_baseline,
                found_in_treatment,
                classification,
            }
        })
        .collect();

    let pass = results.iter().all(AssertionResult::passed);

    DifferentialReport {
        scenario_id: baseline.scenario_id.clone(),
        results,
        pass,
        classified_at: Utc::now(),
    }
}

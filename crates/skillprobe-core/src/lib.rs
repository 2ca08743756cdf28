//! # skillprobe-core
//!
//! Deterministic engine for differential skill testing.
//!
//! This crate holds everything in the harness that does not touch a
//! network or a process boundary:
//! - scenario file parsing
//! - RED/GREEN assertion classification
//! - rubric parsing and validation
//! - scoring aggregation for judged runs
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same inputs always produce the same outputs
//! 2. **No LLM calls**: nondeterminism lives in `skillprobe-runtime`
//! 3. **Strict**: out-of-bounds scores and malformed inputs are typed
//!    errors, never silently repaired
//! 4. **Immutable records**: scenarios, transcripts, and judgments are
//!    never mutated after construction
//!
//! ## Example
//!
//! ```rust,ignore
//! use skillprobe_core::{classify, Scenario};
//!
//! let scenario = Scenario::from_file("scenarios/solid-queue-emails.md")?;
//! let report = classify(&scenario.assertions, &baseline, &treatment);
//!
//! if report.pass {
//!     println!("GREEN: skill changed the agent's behavior");
//! }
//! ```

pub mod differential;
pub mod rubric;
pub mod scenario;
pub mod scoring;
pub mod types;

// Re-export main types at crate root
pub use differential::{classify, AssertionResult, Classification, DifferentialReport};
pub use rubric::{Domain, Rubric, RubricError, DEFAULT_THRESHOLD};
pub use scenario::{Scenario, ScenarioError};
pub use scoring::{summarize, RunSummary, RunTimings, ScoreError};
pub use types::{Judgment, Transcript, Variant};

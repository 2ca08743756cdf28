//! End-to-end run orchestration.
//!
//! The harness wires loader → invoker → {differential verifier |
//! judge coordinator → scoring aggregator} → result store.
//!
//! Two rules hold everywhere:
//! 1. A behavioral failure (assertion classification, under-threshold
//!    score, critical blocker) completes the run and persists every
//!    artifact. The artifacts are the point.
//! 2. An infrastructure failure (timeout, process error, unparseable
//!    judge output, store error) aborts the run, but artifacts captured
//!    before the failure are already on disk and stay there.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use skillprobe_core::{
    classify, summarize, DifferentialReport, Rubric, RunSummary, RunTimings, Scenario,
    ScenarioError, ScoreError, Variant,
};

use crate::config::RuntimeConfig;
use crate::invoker::{AgentInvoker, InvokeError};
use crate::judge::{JudgeCoordinator, JudgeError};
use crate::store::{Ledger, LedgerEntry, ProgressLog, RunDir, RunKind, StoreError};

/// Errors from the harness. Every variant is an infrastructure
/// failure; behavioral failures are carried inside `Ok` results.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No judge coordinator configured")]
    JudgeNotConfigured,

    #[error("No agent invoker configured")]
    InvokerNotConfigured,
}

/// Final classification of a run, mapped to the CLI exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Behavioral pass.
    Pass,
    /// The run completed; the behavior under test failed.
    BehavioralFail,
    /// The run could not complete. Excluded from behavioral pass-rate
    /// statistics.
    Infrastructure,
}

impl RunOutcome {
    /// Process exit code: 0 pass, 1 behavioral fail, 2 infrastructure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Pass => 0,
            RunOutcome::BehavioralFail => 1,
            RunOutcome::Infrastructure => 2,
        }
    }
}

/// Result of a completed differential run.
#[derive(Debug)]
pub struct DifferentialRun {
    /// Full classification report, also persisted as `report.json`.
    pub report: DifferentialReport,
    /// Artifact directory for this run.
    pub run_dir: PathBuf,
}

impl DifferentialRun {
    /// Behavioral outcome of the run.
    pub fn outcome(&self) -> RunOutcome {
        if self.report.pass { RunOutcome::Pass } else { RunOutcome::BehavioralFail }
    }
}

/// Result of a completed judged run.
#[derive(Debug)]
pub struct JudgedRun {
    /// Aggregate summary, also persisted as `summary.json`.
    pub summary: RunSummary,
    /// Artifact directory for this run.
    pub run_dir: PathBuf,
}

impl JudgedRun {
    /// Behavioral outcome of the run.
    pub fn outcome(&self) -> RunOutcome {
        if self.summary.pass { RunOutcome::Pass } else { RunOutcome::BehavioralFail }
    }
}

/// The harness owns the wiring for one or more runs.
pub struct Harness {
    invoker: Arc<dyn AgentInvoker>,
    judge: Option<Arc<dyn JudgeCoordinator>>,
    config: RuntimeConfig,
    ledger: Ledger,
    progress: ProgressLog,
}

impl Harness {
    /// Start building a harness.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    /// The cumulative ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run a RED/GREEN differential test: baseline without the skill,
    /// then treatment with it, then literal assertion classification.
    ///
    /// The baseline phase completes fully (success or failure) before
    /// the treatment phase starts; the two are never interleaved, so no
    /// shared external state can contaminate the comparison.
    pub async fn run_differential(
        &self,
        scenario: &Scenario,
        skill: &str,
    ) -> Result<DifferentialRun, HarnessError> {
        let run_dir = RunDir::create(&self.config.results_dir, &scenario.id)?;
        self.progress.event(&scenario.id, "differential run started")?;

        // Phase 1: baseline.
        self.progress.event(&scenario.id, "baseline invocation started")?;
        let baseline = self
            .invoke_logged(scenario, Variant::Baseline, None)
            .await?;
        run_dir.write_transcript(&baseline)?;
        self.progress.event(&scenario.id, "baseline captured")?;

        // Phase 2: treatment. If this phase fails, the baseline
        // artifact written above is retained.
        self.progress.event(&scenario.id, "treatment invocation started")?;
        let treatment = match self.invoke_logged(scenario, Variant::Treatment, Some(skill)).await {
            Ok(t) => t,
            Err(e) => {
                self.progress
                    .event(&scenario.id, "treatment failed; baseline artifact retained")?;
                return Err(e.into());
            }
        };
        run_dir.write_transcript(&treatment)?;
        self.progress.event(&scenario.id, "treatment captured")?;

        // Classification and persistence happen regardless of outcome;
        // a failing differential run is itself valid data.
        let report = classify(&scenario.assertions, &baseline, &treatment);
        run_dir.write_report(&report)?;

        self.ledger.upsert(LedgerEntry {
            scenario_id: scenario.id.clone(),
            branch: self.config.branch.clone(),
            kind: RunKind::Differential,
            pass: report.pass,
            total_score: None,
            max_score: None,
            failed_assertions: Some(report.failures().count()),
            critical_blockers: vec![],
            run_dir: run_dir.path().display().to_string(),
            updated_at: chrono::Utc::now(),
        })?;

        self.progress.event(
            &scenario.id,
            if report.pass { "differential run passed" } else { "differential run failed" },
        )?;

        Ok(DifferentialRun { report, run_dir: run_dir.path().to_path_buf() })
    }

    /// Run a judged evaluation: invoke the agent for a full plan, score
    /// it across every rubric domain, aggregate, persist.
    pub async fn run_judged(
        &self,
        scenario: &Scenario,
        rubric: &Rubric,
    ) -> Result<JudgedRun, HarnessError> {
        let judge = self.judge.as_ref().ok_or(HarnessError::JudgeNotConfigured)?;

        let run_dir = RunDir::create(&self.config.results_dir, &scenario.id)?;
        self.progress.event(&scenario.id, "judged run started")?;

        let plan = self.invoke_logged(scenario, Variant::Plan, None).await?;
        run_dir.write_transcript(&plan)?;
        self.progress.event(&scenario.id, "plan captured")?;

        let judging_started = std::time::Instant::now();
        let judgments = judge.evaluate(&plan, rubric).await?;
        let judging_secs = judging_started.elapsed().as_secs_f64();
        self.progress.event(&scenario.id, "judging complete")?;

        for judgment in &judgments {
            run_dir.write_judgment(judgment)?;
        }

        let timings = RunTimings {
            invocation_secs: plan.duration.as_secs_f64(),
            judging_secs,
        };
        let summary = summarize(&scenario.id, &judgments, rubric, timings)?;
        run_dir.write_summary(&summary)?;

        self.ledger.upsert(LedgerEntry {
            scenario_id: scenario.id.clone(),
            branch: self.config.branch.clone(),
            kind: RunKind::Judged,
            pass: summary.pass,
            total_score: Some(summary.total_score),
            max_score: Some(summary.max_score),
            failed_assertions: None,
            critical_blockers: summary.critical_blockers.clone(),
            run_dir: run_dir.path().display().to_string(),
            updated_at: chrono::Utc::now(),
        })?;

        self.progress.event(
            &scenario.id,
            if summary.pass { "judged run passed" } else { "judged run failed" },
        )?;

        Ok(JudgedRun { summary, run_dir: run_dir.path().to_path_buf() })
    }

    async fn invoke_logged(
        &self,
        scenario: &Scenario,
        variant: Variant,
        skill: Option<&str>,
    ) -> Result<skillprobe_core::Transcript, InvokeError> {
        self.invoker
            .invoke(&scenario.id, variant, &scenario.prompt, skill, self.config.agent_timeout)
            .await
    }
}

/// Builder for [`Harness`].
pub struct HarnessBuilder {
    invoker: Option<Arc<dyn AgentInvoker>>,
    judge: Option<Arc<dyn JudgeCoordinator>>,
    config: RuntimeConfig,
}

impl HarnessBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self { invoker: None, judge: None, config: RuntimeConfig::default() }
    }

    /// Set the agent invoker (required).
    pub fn invoker(mut self, invoker: Arc<dyn AgentInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Set the judge coordinator (required for judged runs).
    pub fn judge(mut self, judge: Arc<dyn JudgeCoordinator>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the harness.
    pub fn build(self) -> Result<Harness, HarnessError> {
        let invoker = self.invoker.ok_or(HarnessError::InvokerNotConfigured)?;
        let ledger = Ledger::new(self.config.ledger_path());
        let progress = ProgressLog::new(self.config.progress_path());
        Ok(Harness { invoker, judge: self.judge, config: self.config, ledger, progress })
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::StubInvoker;
    use crate::judge::StubJudge;
    use skillprobe_core::Judgment;

    const SCENARIO: &str = "\
id: solid-queue-emails

## Scenario
Add a mailer that sends a welcome email when a user signs up.

## Assertions
Must include:
- deliver_later
- SolidQueue
- background
";

    fn scenario() -> Scenario {
        Scenario::from_str(SCENARIO).unwrap()
    }

    fn config(results_dir: &std::path::Path) -> RuntimeConfig {
        RuntimeConfig { results_dir: results_dir.to_path_buf(), ..RuntimeConfig::default() }
    }

    fn judgment(domain: &str, score: u32, blockers: Vec<String>) -> Judgment {
        Judgment {
            domain: domain.to_string(),
            score,
            issues: vec![],
            suggestions: vec![],
            critical_blockers: blockers,
        }
    }

    #[tokio::test]
    async fn test_differential_green_path() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = StubInvoker::new()
            .with_response(Variant::Baseline, "use deliver_now for the email")
            .with_response(
                Variant::Treatment,
                "enqueue via deliver_later using SolidQueue for background processing",
            );
        let harness = Harness::builder()
            .invoker(Arc::new(invoker))
            .config(config(tmp.path()))
            .build()
            .unwrap();

        let run = harness.run_differential(&scenario(), "prefer deliver_later").await.unwrap();

        assert_eq!(run.outcome(), RunOutcome::Pass);
        assert_eq!(run.outcome().exit_code(), 0);
        assert!(run.run_dir.join("baseline.md").exists());
        assert!(run.run_dir.join("treatment.md").exists());
        assert!(run.run_dir.join("report.json").exists());

        let entry = harness.ledger().get("solid-queue-emails").unwrap().unwrap();
        assert!(entry.pass);
        assert_eq!(entry.failed_assertions, Some(0));
    }

    #[tokio::test]
    async fn test_differential_behavioral_failure_still_persists_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = StubInvoker::new()
            // Baseline already mentions SolidQueue: contaminated.
            .with_response(Variant::Baseline, "maybe try SolidQueue")
            .with_response(
                Variant::Treatment,
                "enqueue via deliver_later using SolidQueue for background processing",
            );
        let harness = Harness::builder()
            .invoker(Arc::new(invoker))
            .config(config(tmp.path()))
            .build()
            .unwrap();

        let run = harness.run_differential(&scenario(), "skill").await.unwrap();

        assert_eq!(run.outcome(), RunOutcome::BehavioralFail);
        assert_eq!(run.outcome().exit_code(), 1);
        assert_eq!(run.report.failures().count(), 1);
        assert!(run.run_dir.join("report.json").exists());
        assert!(!harness.ledger().get("solid-queue-emails").unwrap().unwrap().pass);
    }

    #[tokio::test]
    async fn test_treatment_failure_retains_baseline_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        // No treatment response: phase 2 fails as a process error.
        let invoker = StubInvoker::new().with_response(Variant::Baseline, "use deliver_now");
        let harness = Harness::builder()
            .invoker(Arc::new(invoker))
            .config(config(tmp.path()))
            .build()
            .unwrap();

        let result = harness.run_differential(&scenario(), "skill").await;
        assert!(matches!(result, Err(HarnessError::Invoke(InvokeError::Process(_)))));

        // The baseline transcript captured in phase 1 is still on disk.
        let run_dirs: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .collect();
        assert_eq!(run_dirs.len(), 1);
        assert!(run_dirs[0].path().join("baseline.md").exists());
        assert!(!run_dirs[0].path().join("treatment.md").exists());

        // Infrastructure failure: no ledger entry for this scenario.
        assert!(harness.ledger().get("solid-queue-emails").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_judged_run_with_blocker_fails_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = StubInvoker::new().with_response(Variant::Plan, "the full plan");
        let judge = StubJudge::new(vec![
            judgment("backend", 42, vec![]),
            judgment("frontend", 38, vec![]),
            judgment("tests", 45, vec![]),
            judgment("security", 10, vec!["missing foreign key constraint".to_string()]),
        ]);
        let harness = Harness::builder()
            .invoker(Arc::new(invoker))
            .judge(Arc::new(judge))
            .config(config(tmp.path()))
            .build()
            .unwrap();

        let run = harness.run_judged(&scenario(), &Rubric::default()).await.unwrap();

        assert_eq!(run.outcome(), RunOutcome::BehavioralFail);
        assert_eq!(run.summary.total_score, 135);
        assert_eq!(run.summary.max_score, 200);
        assert_eq!(
            run.summary.critical_blockers,
            vec!["security: missing foreign key constraint".to_string()]
        );
        assert!(run.run_dir.join("plan.md").exists());
        assert!(run.run_dir.join("judgment-security.json").exists());
        assert!(run.run_dir.join("summary.json").exists());

        let entry = harness.ledger().get("solid-queue-emails").unwrap().unwrap();
        assert_eq!(entry.total_score, Some(135));
        assert!(!entry.pass);
    }

    #[tokio::test]
    async fn test_judged_run_requires_a_judge() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = StubInvoker::new().with_response(Variant::Plan, "plan");
        let harness = Harness::builder()
            .invoker(Arc::new(invoker))
            .config(config(tmp.path()))
            .build()
            .unwrap();

        let result = harness.run_judged(&scenario(), &Rubric::default()).await;
        assert!(matches!(result, Err(HarnessError::JudgeNotConfigured)));
    }

    #[test]
    fn test_builder_requires_invoker() {
        let result = Harness::builder().build();
        assert!(matches!(result, Err(HarnessError::InvokerNotConfigured)));
    }

    #[tokio::test]
    async fn test_progress_log_is_tailable_during_run() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = StubInvoker::new()
            .with_response(Variant::Baseline, "a")
            .with_response(Variant::Treatment, "deliver_later SolidQueue background");
        let cfg = config(tmp.path());
        let progress_path = cfg.progress_path();
        let harness = Harness::builder().invoker(Arc::new(invoker)).config(cfg).build().unwrap();

        harness.run_differential(&scenario(), "skill").await.unwrap();

        let log = std::fs::read_to_string(progress_path).unwrap();
        assert!(log.contains("baseline captured"));
        assert!(log.contains("treatment captured"));
        assert!(log.contains("differential run passed"));
    }
}

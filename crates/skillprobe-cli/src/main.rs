//! skillprobe command-line interface.
//!
//! Exit codes: 0 behavioral pass, 1 behavioral fail, 2 infrastructure
//! error (including malformed scenarios — no run is attempted).
//!
//! There is deliberately no "run all scenarios" command: every run is a
//! paid LLM invocation, so callers must name scenarios explicitly.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use skillprobe_core::{DifferentialReport, Rubric, RunSummary, Scenario};
use skillprobe_runtime::{
    AnthropicProvider, CompletionConfig, DelegatedJudge, FanOutJudge, Harness, JudgeCoordinator,
    JudgeStrategy, Ledger, LedgerEntry, ProviderInvoker, RunKind, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "skillprobe", version, about = "Behavioral test harness for LLM coding agents")]
struct Cli {
    /// Path to a harness config file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one named scenario (differential by default, judged with --judged)
    RunScenario {
        /// Scenario name (file stem under the scenarios dir) or path
        name: String,

        /// Skill file to inject in the treatment arm (differential runs)
        #[arg(long)]
        skill: Option<PathBuf>,

        /// Run a judged evaluation instead of a differential test
        #[arg(long)]
        judged: bool,

        /// Rubric file for judged runs (defaults to the built-in rubric)
        #[arg(long)]
        rubric: Option<PathBuf>,

        /// Override the scenarios directory
        #[arg(long)]
        scenarios_dir: Option<PathBuf>,

        /// Override the results directory
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Branch qualifier for the ledger entry
        #[arg(long)]
        branch: Option<String>,
    },

    /// List scenarios in the scenarios directory
    ListScenarios {
        /// Override the scenarios directory
        #[arg(long)]
        scenarios_dir: Option<PathBuf>,
    },

    /// Report the latest ledger entry per scenario
    Report {
        /// Override the results directory
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    match cli.command {
        Command::RunScenario {
            name,
            skill,
            judged,
            rubric,
            scenarios_dir,
            results_dir,
            branch,
        } => {
            if let Some(dir) = scenarios_dir {
                config.scenarios_dir = dir;
            }
            if let Some(dir) = results_dir {
                config.results_dir = dir;
            }
            if branch.is_some() {
                config.branch = branch;
            }
            run_scenario(&config, &name, skill.as_deref(), judged, rubric.as_deref()).await
        }
        Command::ListScenarios { scenarios_dir } => {
            list_scenarios(scenarios_dir.as_deref().unwrap_or(&config.scenarios_dir))
        }
        Command::Report { results_dir } => {
            if let Some(dir) = results_dir {
                config.results_dir = dir;
            }
            report(&config)
        }
    }
}

/// Resolve a scenario name to a file: a literal path wins, otherwise
/// `<scenarios_dir>/<name>.md`.
fn scenario_path(config: &RuntimeConfig, name: &str) -> PathBuf {
    let literal = Path::new(name);
    if literal.is_file() {
        literal.to_path_buf()
    } else {
        config.scenarios_dir.join(format!("{}.md", name))
    }
}

async fn run_scenario(
    config: &RuntimeConfig,
    name: &str,
    skill: Option<&Path>,
    judged: bool,
    rubric_path: Option<&Path>,
) -> Result<i32> {
    let path = scenario_path(config, name);
    let scenario = Scenario::from_file(&path)
        .with_context(|| format!("loading scenario {}", path.display()))?;

    let provider = Arc::new(AnthropicProvider::from_env()?);
    let invoker = ProviderInvoker::new(provider.clone(), CompletionConfig::default());

    let judge: Arc<dyn JudgeCoordinator> = match config.judge_strategy {
        JudgeStrategy::FanOut => Arc::new(FanOutJudge::new(
            provider.clone(),
            CompletionConfig::default(),
            config.judge_timeout,
        )),
        JudgeStrategy::Delegated => Arc::new(DelegatedJudge::new(
            provider.clone(),
            CompletionConfig::default(),
            config.judge_timeout,
        )),
    };

    let harness = Harness::builder()
        .invoker(Arc::new(invoker))
        .judge(judge)
        .config(config.clone())
        .build()?;

    if judged {
        let rubric = match rubric_path {
            Some(path) => Rubric::from_yaml_file(path)
                .with_context(|| format!("loading rubric {}", path.display()))?,
            None => Rubric::default(),
        };
        let run = harness.run_judged(&scenario, &rubric).await?;
        print!("{}", render_judged(&run.summary, &run.run_dir));
        Ok(run.outcome().exit_code())
    } else {
        let skill_path = match skill {
            Some(path) => path,
            None => bail!("differential runs need --skill <file>; use --judged to judge a plan"),
        };
        let skill_text = std::fs::read_to_string(skill_path)
            .with_context(|| format!("reading skill {}", skill_path.display()))?;
        let run = harness.run_differential(&scenario, &skill_text).await?;
        print!("{}", render_differential(&run.report, &run.run_dir));
        Ok(run.outcome().exit_code())
    }
}

fn render_differential(report: &DifferentialReport, run_dir: &Path) -> String {
    let mut out = String::new();
    if report.pass {
        let _ = writeln!(
            out,
            "GREEN: all {} assertion(s) held (absent in baseline, present in treatment)",
            report.results.len()
        );
    } else {
        let _ = writeln!(out, "RED: {} assertion(s) failed", report.failures().count());
        for failure in report.failures() {
            let classification = failure
                .classification
                .map(|c| format!("{:?}", c))
                .unwrap_or_default();
            let _ = writeln!(out, "  {} {:?}", classification, failure.assertion);
        }
    }
    let _ = writeln!(out, "artifacts: {}", run_dir.display());
    out
}

fn render_judged(summary: &RunSummary, run_dir: &Path) -> String {
    let mut out = String::new();
    // Blockers surface before the percentage: an override, not a deduction.
    for blocker in &summary.critical_blockers {
        let _ = writeln!(out, "CRITICAL BLOCKER: {}", blocker);
    }
    let _ = writeln!(
        out,
        "{}: {}/{} ({:.1}%, threshold {:.0}%)",
        if summary.pass { "PASS" } else { "FAIL" },
        summary.total_score,
        summary.max_score,
        summary.percentage(),
        summary.threshold * 100.0,
    );
    for judgment in &summary.judgments {
        let _ = writeln!(out, "  {}: {}", judgment.domain, judgment.score);
        for issue in &judgment.issues {
            let _ = writeln!(out, "    issue: {}", issue);
        }
    }
    let _ = writeln!(out, "artifacts: {}", run_dir.display());
    out
}

fn list_scenarios(scenarios_dir: &Path) -> Result<i32> {
    let mut entries: Vec<_> = std::fs::read_dir(scenarios_dir)
        .with_context(|| format!("reading {}", scenarios_dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    entries.sort();

    for path in entries {
        match Scenario::from_file(&path) {
            Ok(scenario) => {
                println!("{}  ({} assertions)", scenario.id, scenario.assertions.len())
            }
            Err(e) => println!(
                "{}  [malformed: {}]",
                path.file_stem().and_then(|s| s.to_str()).unwrap_or("?"),
                e
            ),
        }
    }
    Ok(0)
}

fn report(config: &RuntimeConfig) -> Result<i32> {
    let ledger = Ledger::new(config.ledger_path());
    let entries = ledger.entries()?;
    if entries.is_empty() {
        println!("ledger is empty: no runs recorded under {}", config.results_dir.display());
        return Ok(0);
    }

    for entry in entries {
        let report = load_run_report(&entry);
        print!("{}", render_ledger_entry(&entry, report.as_ref()));
    }
    Ok(0)
}

/// Best-effort fetch of a differential run's persisted report. The run
/// dir may have been pruned since the ledger entry was written; the
/// ledger's failure count then stands on its own.
fn load_run_report(entry: &LedgerEntry) -> Option<DifferentialReport> {
    if entry.kind != RunKind::Differential {
        return None;
    }
    let text = std::fs::read_to_string(Path::new(&entry.run_dir).join("report.json")).ok()?;
    serde_json::from_str(&text).ok()
}

fn render_ledger_entry(entry: &LedgerEntry, report: Option<&DifferentialReport>) -> String {
    let mut out = String::new();
    let kind = match entry.kind {
        RunKind::Differential => "differential",
        RunKind::Judged => "judged",
    };
    let verdict = if entry.pass { "PASS" } else { "FAIL" };
    let branch = entry.branch.as_deref().map(|b| format!(" @{}", b)).unwrap_or_default();
    let _ = writeln!(out, "{}{} [{}] {}", entry.scenario_id, branch, kind, verdict);
    for blocker in &entry.critical_blockers {
        let _ = writeln!(out, "  CRITICAL BLOCKER: {}", blocker);
    }
    if let (Some(total), Some(max)) = (entry.total_score, entry.max_score) {
        let _ = writeln!(out, "  score: {}/{}", total, max);
    }
    if let Some(failed) = entry.failed_assertions {
        if failed > 0 {
            let _ = writeln!(out, "  failing assertions: {}", failed);
            if let Some(report) = report {
                for failure in report.failures() {
                    let classification = failure
                        .classification
                        .map(|c| format!("{:?}", c))
                        .unwrap_or_default();
                    let _ = writeln!(out, "    {} {:?}", classification, failure.assertion);
                }
            }
        }
    }
    let _ = writeln!(out, "  artifacts: {}", entry.run_dir);
    out
}

//! # skillprobe-runtime
//!
//! Orchestration runtime for the skillprobe harness.
//!
//! Everything non-deterministic lives here: invoking the external
//! coding agent, coordinating judge calls, and persisting results.
//! The deterministic machinery (parsing, classification, aggregation)
//! lives in `skillprobe-core` and is consumed, never duplicated.
//!
//! ## Scheduling model
//!
//! The harness is a sequence of blocking calls to slow external
//! processes; there is no CPU-bound work. Every agent and judge call
//! is a suspension point wrapped in an explicit timeout. Within one
//! differential run the baseline phase completes strictly before the
//! treatment phase; within one judge call, domains may run
//! concurrently.
//!
//! ## Example
//!
//! ```rust,ignore
//! use skillprobe_runtime::{Harness, ProviderInvoker, FanOutJudge};
//!
//! let provider = Arc::new(AnthropicProvider::from_env()?);
//! let harness = Harness::builder()
//!     .invoker(Arc::new(ProviderInvoker::new(provider.clone(), Default::default())))
//!     .judge(Arc::new(FanOutJudge::new(provider, Default::default(), judge_timeout)))
//!     .config(config)
//!     .build()?;
//!
//! let run = harness.run_differential(&scenario, &skill_text).await?;
//! std::process::exit(run.outcome().exit_code());
//! ```

pub mod config;
pub mod harness;
pub mod invoker;
pub mod judge;
pub mod prompts;
pub mod providers;
pub mod store;

// Re-export main types at crate root
pub use config::{ConfigError, JudgeStrategy, RuntimeConfig};
pub use harness::{
    DifferentialRun, Harness, HarnessBuilder, HarnessError, JudgedRun, RunOutcome,
};
pub use invoker::{AgentInvoker, InvokeError, ProviderInvoker, StubInvoker};
pub use judge::{DelegatedJudge, FanOutJudge, JudgeCoordinator, JudgeError, StubJudge};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
pub use store::{Ledger, LedgerEntry, ProgressLog, RunDir, RunKind, StoreError};

#[cfg(feature = "anthropic")]
pub use providers::AnthropicProvider;

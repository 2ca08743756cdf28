//! Agent invocation.
//!
//! One blocking call to the external coding agent, with or without an
//! injected skill block. There is deliberately no retry: a failed call
//! fails the run outright so flakiness stays visible instead of being
//! masked by the harness.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use skillprobe_core::{Transcript, Variant};

use crate::prompts::agent_system_prompt;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Errors from agent invocation. Timeout and process failure are
/// distinct: the caller reports them as different infrastructure
/// failure modes.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Agent invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Agent process failed: {0}")]
    Process(String),
}

impl From<ProviderError> for InvokeError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(d) => InvokeError::Timeout(d),
            other => InvokeError::Process(other.to_string()),
        }
    }
}

/// The agent process boundary. The agent is a black box: it accepts a
/// prompt plus optional context text and returns response text.
/// Internal reasoning is never inspected.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run one blocking agent call and capture the transcript.
    ///
    /// When `skill` is supplied it is prepended to the fixed baseline
    /// instruction; the two arms of a differential run must differ
    /// only in that block.
    async fn invoke(
        &self,
        scenario_id: &str,
        variant: Variant,
        prompt: &str,
        skill: Option<&str>,
        timeout: Duration,
    ) -> Result<Transcript, InvokeError>;
}

/// Invoker backed by an [`LlmProvider`].
pub struct ProviderInvoker {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
}

impl ProviderInvoker {
    /// Create a new provider-backed invoker.
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self { provider, completion }
    }
}

#[async_trait]
impl AgentInvoker for ProviderInvoker {
    async fn invoke(
        &self,
        scenario_id: &str,
        variant: Variant,
        prompt: &str,
        skill: Option<&str>,
        timeout: Duration,
    ) -> Result<Transcript, InvokeError> {
        let messages = vec![
            ChatMessage::system(agent_system_prompt(skill)),
            ChatMessage::user(prompt),
        ];

        let mut config = self.completion.clone();
        config.timeout = timeout;

        tracing::info!(
            scenario = scenario_id,
            variant = %variant,
            provider = self.provider.name(),
            with_skill = skill.is_some(),
            "Invoking agent"
        );

        let started = Instant::now();
        // The outer timeout covers the whole suspension point, not just
        // the HTTP layer's own deadline.
        let response = match tokio::time::timeout(timeout, self.provider.complete(messages, &config))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(scenario = scenario_id, variant = %variant, error = %e, "Agent call failed");
                return Err(InvokeError::from(e));
            }
            Err(_) => {
                tracing::warn!(scenario = scenario_id, variant = %variant, ?timeout, "Agent call timed out");
                return Err(InvokeError::Timeout(timeout));
            }
        };
        let duration = started.elapsed();

        tracing::info!(
            scenario = scenario_id,
            variant = %variant,
            secs = duration.as_secs_f64(),
            tokens = response.usage.total(),
            "Agent responded"
        );

        Ok(Transcript::new(scenario_id, variant, response.content, duration))
    }
}

/// Canned-response invoker for orchestration tests.
///
/// Responses are keyed by variant; missing keys fail as a process
/// error, which doubles as the infrastructure-failure fixture.
#[derive(Default)]
pub struct StubInvoker {
    responses: HashMap<Variant, String>,
}

impl StubInvoker {
    /// Create an empty stub (every call fails).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the canned response for one variant.
    pub fn with_response(mut self, variant: Variant, text: impl Into<String>) -> Self {
        self.responses.insert(variant, text.into());
        self
    }
}

#[async_trait]
impl AgentInvoker for StubInvoker {
    async fn invoke(
        &self,
        scenario_id: &str,
        variant: Variant,
        _prompt: &str,
        _skill: Option<&str>,
        _timeout: Duration,
    ) -> Result<Transcript, InvokeError> {
        match self.responses.get(&variant) {
            Some(text) => Ok(Transcript::new(
                scenario_id,
                variant,
                text.clone(),
                Duration::from_millis(1),
            )),
            None => Err(InvokeError::Process(format!("no canned response for {}", variant))),
        }
    }
}

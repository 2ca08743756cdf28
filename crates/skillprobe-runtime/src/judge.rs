//! Judge coordination.
//!
//! Each rubric domain is evaluated independently against a transcript.
//! Two interchangeable strategies implement the same interface:
//!
//! - [`FanOutJudge`]: one provider call per domain, issued concurrently
//!   and joined before returning. No ordering among domains is assumed.
//! - [`DelegatedJudge`]: a single provider call whose response carries
//!   every domain; the fan-out happens inside the model.
//!
//! Downstream scoring never depends on which strategy produced the
//! judgments.
//!
//! Judge output is strict JSON. Unparseable output is a typed error,
//! never defaulted to a score; an out-of-bounds score is fatal and
//! never clamped, since a clamped value would corrupt the ledger.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use skillprobe_core::{Domain, Judgment, Rubric, Transcript};

use crate::prompts::{delegated_judge_prompt, domain_judge_prompt, judge_user_message};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Errors from judge coordination.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Judge call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Judge call failed: {0}")]
    Provider(String),

    #[error("Judge output unparseable: {0}")]
    OutputFormat(String),

    #[error("Judge returned score {score} for domain '{domain}', outside [0, {max}]")]
    InvalidScore { domain: String, score: i64, max: u32 },

    #[error("Judge returned judgment for unknown domain: {0}")]
    UnknownDomain(String),
}

impl From<ProviderError> for JudgeError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(d) => JudgeError::Timeout(d),
            other => JudgeError::Provider(other.to_string()),
        }
    }
}

/// The judge process boundary: a black box taking `(transcript, rubric)`
/// and returning one judgment per rubric domain.
#[async_trait]
pub trait JudgeCoordinator: Send + Sync {
    /// Evaluate a transcript against every domain of the rubric.
    ///
    /// Implementations may fan out concurrently; results are only
    /// consumed once all domains have returned.
    async fn evaluate(
        &self,
        transcript: &Transcript,
        rubric: &Rubric,
    ) -> Result<Vec<Judgment>, JudgeError>;
}

/// Raw judge output before validation. Scores come in as `i64` so a
/// negative value is caught by the bounds check instead of failing
/// deserialization with an unhelpful message.
#[derive(Debug, Deserialize)]
struct RawJudgment {
    #[serde(default)]
    domain: Option<String>,
    score: i64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    critical_blockers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDelegated {
    judgments: Vec<RawJudgment>,
}

/// Pull the JSON object out of a judge response, tolerating a markdown
/// code fence but nothing else.
fn extract_json(text: &str) -> Result<&str, JudgeError> {
    let trimmed = text.trim();
    let start = trimmed
        .find('{')
        .ok_or_else(|| JudgeError::OutputFormat("no JSON object in response".to_string()))?;
    let end = trimmed
        .rfind('}')
        .ok_or_else(|| JudgeError::OutputFormat("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(JudgeError::OutputFormat("unterminated JSON object".to_string()));
    }
    Ok(&trimmed[start..=end])
}

/// Validate a raw judgment against its rubric domain.
fn validate(raw: RawJudgment, domain: &Domain) -> Result<Judgment, JudgeError> {
    if let Some(name) = &raw.domain {
        if name != &domain.name {
            return Err(JudgeError::OutputFormat(format!(
                "judgment for '{}' returned under domain '{}'",
                domain.name, name
            )));
        }
    }
    if raw.score < 0 || raw.score > i64::from(domain.max_score) {
        return Err(JudgeError::InvalidScore {
            domain: domain.name.clone(),
            score: raw.score,
            max: domain.max_score,
        });
    }
    Ok(Judgment {
        domain: domain.name.clone(),
        score: raw.score as u32,
        issues: raw.issues,
        suggestions: raw.suggestions,
        critical_blockers: raw.critical_blockers,
    })
}

/// One concurrent provider call per rubric domain.
pub struct FanOutJudge {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    timeout: Duration,
}

impl FanOutJudge {
    /// Create a new fan-out judge.
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig, timeout: Duration) -> Self {
        Self { provider, completion, timeout }
    }

    async fn judge_domain(
        &self,
        transcript: &Transcript,
        domain: &Domain,
    ) -> Result<Judgment, JudgeError> {
        let messages = vec![
            ChatMessage::system(domain_judge_prompt(domain)),
            ChatMessage::user(judge_user_message(transcript)),
        ];
        let mut config = self.completion.clone();
        config.timeout = self.timeout;

        tracing::debug!(domain = %domain.name, scenario = %transcript.scenario_id, "Judging domain");

        let response = tokio::time::timeout(self.timeout, self.provider.complete(messages, &config))
            .await
            .map_err(|_| JudgeError::Timeout(self.timeout))?
            .map_err(JudgeError::from)?;

        let json = extract_json(&response.content)?;
        let raw: RawJudgment = serde_json::from_str(json)
            .map_err(|e| JudgeError::OutputFormat(format!("domain '{}': {}", domain.name, e)))?;
        validate(raw, domain)
    }
}

#[async_trait]
impl JudgeCoordinator for FanOutJudge {
    async fn evaluate(
        &self,
        transcript: &Transcript,
        rubric: &Rubric,
    ) -> Result<Vec<Judgment>, JudgeError> {
        // Fan-out: all domains at once, fan-in: consume only after every
        // call has returned.
        let futures = rubric.domains.iter().map(|d| self.judge_domain(transcript, d));
        let judgments = try_join_all(futures).await?;

        tracing::info!(
            scenario = %transcript.scenario_id,
            domains = judgments.len(),
            "Judging complete"
        );
        Ok(judgments)
    }
}

/// A single provider call that scores every domain in one response.
pub struct DelegatedJudge {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    timeout: Duration,
}

impl DelegatedJudge {
    /// Create a new delegated judge.
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig, timeout: Duration) -> Self {
        Self { provider, completion, timeout }
    }
}

#[async_trait]
impl JudgeCoordinator for DelegatedJudge {
    async fn evaluate(
        &self,
        transcript: &Transcript,
        rubric: &Rubric,
    ) -> Result<Vec<Judgment>, JudgeError> {
        let messages = vec![
            ChatMessage::system(delegated_judge_prompt(rubric)),
            ChatMessage::user(judge_user_message(transcript)),
        ];
        let mut config = self.completion.clone();
        config.timeout = self.timeout;

        let response = tokio::time::timeout(self.timeout, self.provider.complete(messages, &config))
            .await
            .map_err(|_| JudgeError::Timeout(self.timeout))?
            .map_err(JudgeError::from)?;

        let json = extract_json(&response.content)?;
        let raw: RawDelegated = serde_json::from_str(json)
            .map_err(|e| JudgeError::OutputFormat(e.to_string()))?;

        let mut judgments = Vec::with_capacity(raw.judgments.len());
        for item in raw.judgments {
            let name = item
                .domain
                .clone()
                .ok_or_else(|| JudgeError::OutputFormat("judgment missing domain".to_string()))?;
            let domain = rubric
                .domain(&name)
                .ok_or_else(|| JudgeError::UnknownDomain(name.clone()))?;
            judgments.push(validate(item, domain)?);
        }
        Ok(judgments)
    }
}

/// Canned judge for orchestration tests.
pub struct StubJudge {
    judgments: Vec<Judgment>,
}

impl StubJudge {
    /// Create a stub returning fixed judgments.
    pub fn new(judgments: Vec<Judgment>) -> Self {
        Self { judgments }
    }
}

#[async_trait]
impl JudgeCoordinator for StubJudge {
    async fn evaluate(
        &self,
        _transcript: &Transcript,
        _rubric: &Rubric,
    ) -> Result<Vec<Judgment>, JudgeError> {
        Ok(self.judgments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionResponse, TokenUsage};
    use skillprobe_core::Variant;

    /// Provider that answers every call with the same canned text.
    struct CannedProvider(String);

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: self.0.clone(),
                usage: TokenUsage::default(),
                model: "canned".to_string(),
                stop_reason: Some("end_turn".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    /// Provider that answers per-domain by inspecting the system prompt.
    struct PerDomainProvider;

    #[async_trait]
    impl LlmProvider for PerDomainProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let system = &messages[0].content;
            let domain = ["backend", "frontend", "tests", "security"]
                .iter()
                .find(|d| system.contains(&format!("Scoring Domain: {}", d)))
                .expect("unknown domain in prompt");
            Ok(CompletionResponse {
                content: format!(
                    "```json\n{{\"domain\": \"{}\", \"score\": 42, \"issues\": [], \
                     \"suggestions\": [], \"critical_blockers\": []}}\n```",
                    domain
                ),
                usage: TokenUsage::default(),
                model: "per-domain".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "per-domain"
        }
    }

    fn transcript() -> Transcript {
        Transcript::new("scn", Variant::Plan, "the plan", Duration::from_secs(1))
    }

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn test_extract_json_tolerates_code_fence() {
        let fenced = "```json\n{\"score\": 1}\n```";
        assert_eq!(extract_json(fenced).unwrap(), "{\"score\": 1}");

        let bare = "{\"score\": 1}";
        assert_eq!(extract_json(bare).unwrap(), bare);
    }

    #[test]
    fn test_extract_json_rejects_prose() {
        assert!(matches!(
            extract_json("the plan looks great, 9/10"),
            Err(JudgeError::OutputFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_fan_out_scores_every_domain() {
        let judge = FanOutJudge::new(
            Arc::new(PerDomainProvider),
            CompletionConfig::default(),
            timeout(),
        );
        let judgments = judge.evaluate(&transcript(), &Rubric::default()).await.unwrap();
        assert_eq!(judgments.len(), 4);
        assert!(judgments.iter().all(|j| j.score == 42));
    }

    #[tokio::test]
    async fn test_out_of_bounds_score_is_fatal() {
        let canned = CannedProvider(
            "{\"domain\": \"backend\", \"score\": 75, \"issues\": []}".to_string(),
        );
        let judge = FanOutJudge::new(Arc::new(canned), CompletionConfig::default(), timeout());
        let result = judge.evaluate(&transcript(), &Rubric::default()).await;
        assert!(matches!(
            result,
            Err(JudgeError::InvalidScore { score: 75, max: 50, .. })
        ));
    }

    #[tokio::test]
    async fn test_negative_score_is_invalid_not_parse_error() {
        let canned = CannedProvider("{\"domain\": \"backend\", \"score\": -3}".to_string());
        let judge = FanOutJudge::new(Arc::new(canned), CompletionConfig::default(), timeout());
        let result = judge.evaluate(&transcript(), &Rubric::default()).await;
        assert!(matches!(result, Err(JudgeError::InvalidScore { score: -3, .. })));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_format_error_not_default_score() {
        let canned = CannedProvider("I'd give this a solid B+".to_string());
        let judge = FanOutJudge::new(Arc::new(canned), CompletionConfig::default(), timeout());
        let result = judge.evaluate(&transcript(), &Rubric::default()).await;
        assert!(matches!(result, Err(JudgeError::OutputFormat(_))));
    }

    #[tokio::test]
    async fn test_delegated_parses_all_domains_from_one_call() {
        let response = r#"{"judgments": [
            {"domain": "backend", "score": 42, "critical_blockers": []},
            {"domain": "frontend", "score": 38},
            {"domain": "tests", "score": 45},
            {"domain": "security", "score": 10,
             "critical_blockers": ["missing foreign key constraint"]}
        ]}"#;
        let judge = DelegatedJudge::new(
            Arc::new(CannedProvider(response.to_string())),
            CompletionConfig::default(),
            timeout(),
        );
        let judgments = judge.evaluate(&transcript(), &Rubric::default()).await.unwrap();
        assert_eq!(judgments.len(), 4);
        let security = judgments.iter().find(|j| j.domain == "security").unwrap();
        assert!(security.has_blocker());
    }

    #[tokio::test]
    async fn test_delegated_rejects_unknown_domain() {
        let response = r#"{"judgments": [{"domain": "devops", "score": 10}]}"#;
        let judge = DelegatedJudge::new(
            Arc::new(CannedProvider(response.to_string())),
            CompletionConfig::default(),
            timeout(),
        );
        let result = judge.evaluate(&transcript(), &Rubric::default()).await;
        assert!(matches!(result, Err(JudgeError::UnknownDomain(d)) if d == "devops"));
    }
}

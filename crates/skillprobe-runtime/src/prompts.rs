//! Prompt construction for the agent and judge process boundaries.
//!
//! Layout follows a layered scheme:
//! 1. Fixed base prompt (shared across calls)
//! 2. Domain- or rubric-specific section
//! 3. Dynamic content (transcript text)
//!
//! The agent's baseline instruction is a constant on purpose: the
//! baseline and treatment arms must differ only in the injected skill
//! block, so everything else has to be byte-identical.

use skillprobe_core::{Domain, Rubric, Transcript};

/// Fixed instruction for agent invocations. Both arms of a
/// differential run use this verbatim.
pub const BASELINE_INSTRUCTION: &str = "\
You are a coding agent. Implement the requested feature.
Be concise. Make reasonable assumptions instead of asking questions.";

/// Base system prompt shared by every judge call.
///
/// The framing keeps the judge on the rubric: it scores against given
/// criteria, it does not invent its own.
pub const BASE_JUDGE_PROMPT: &str = r#"
You are evaluating an implementation plan produced by a coding agent.

You score ONLY against the rubric criteria you are given.
You do not invent criteria.
You do not award points for work the rubric does not ask about.

A critical blocker is an issue severe enough that the plan must fail
regardless of its score: data loss, missing integrity constraints,
broken authorization, or anything that would ship a defect to users.
List a blocker ONLY when the severity genuinely warrants it.

## Output Format (strict JSON, no surrounding prose)
{
  "domain": "string",
  "score": <integer, 0 to the stated maximum>,
  "issues": ["observed problem", ...],
  "suggestions": ["non-blocking improvement", ...],
  "critical_blockers": ["severe issue forcing failure", ...]
}

Return nothing but the JSON object. A markdown code fence around it is
acceptable; any other text is not.
"#;

/// Build the system prompt for the agent, with an optional injected
/// skill block. The block is prepended so the fixed instruction stays
/// identical across arms.
pub fn agent_system_prompt(skill: Option<&str>) -> String {
    match skill {
        Some(text) => format!("{}\n\n{}", text.trim_end(), BASELINE_INSTRUCTION),
        None => BASELINE_INSTRUCTION.to_string(),
    }
}

/// Build the system prompt for a single-domain judge call.
pub fn domain_judge_prompt(domain: &Domain) -> String {
    format!(
        "{base}\n## Scoring Domain: {name}\nMaximum score: {max}\n\nCriteria:\n{criteria}\n\n\
         Set \"domain\" to \"{name}\" in your output.\n",
        base = BASE_JUDGE_PROMPT,
        name = domain.name,
        max = domain.max_score,
        criteria = if domain.criteria.is_empty() { "(use the domain name)" } else { &domain.criteria },
    )
}

/// Build the system prompt for a delegated judge call that scores every
/// rubric domain in one response.
pub fn delegated_judge_prompt(rubric: &Rubric) -> String {
    let mut prompt = format!(
        "{base}\n## Scoring Domains\nScore EVERY domain below. \
         Return a single JSON object of the form\n\
         {{\"judgments\": [<one object per domain, format above>]}}\n\n",
        base = BASE_JUDGE_PROMPT,
    );
    for domain in &rubric.domains {
        prompt.push_str(&format!(
            "### {name} (maximum {max})\n{criteria}\n\n",
            name = domain.name,
            max = domain.max_score,
            criteria = if domain.criteria.is_empty() { "(use the domain name)" } else { &domain.criteria },
        ));
    }
    prompt
}

/// Build the user message carrying the transcript to judge.
pub fn judge_user_message(transcript: &Transcript) -> String {
    format!(
        "## Implementation Plan (scenario: {id})\n\n{text}",
        id = transcript.scenario_id,
        text = transcript.text,
    )
}

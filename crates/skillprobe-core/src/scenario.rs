//! Scenario file parsing.
//!
//! A scenario file is a small markdown-flavored document:
//!
//! ```text
//! id: solid-queue-emails
//! skill: background-jobs
//!
//! ## Scenario
//! Add a mailer that sends a welcome email when a user signs up.
//!
//! ## Expected Baseline Behavior
//! Sends the email inline with deliver_now.
//!
//! ## Expected Treatment Behavior
//! Enqueues the email via deliver_later on SolidQueue.
//!
//! ## Assertions
//! Must include:
//! - deliver_later
//! - SolidQueue
//! ```
//!
//! The metadata header is `key: value` lines before the first section.
//! The `Scenario` section is the literal prompt sent to the agent. The
//! expected-behavior sections are documentation only and never checked.
//! Assertion bullets are literal substrings, kept in order with
//! duplicates collapsed.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

lazy_static! {
    static ref SECTION_RE: Regex = Regex::new(r"^##\s+(.+?)\s*$").expect("invalid section regex");
    static ref HEADER_RE: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z0-9_-]*)\s*:\s*(.*)$").expect("invalid header regex");
    static ref BULLET_RE: Regex = Regex::new(r"^[-*]\s+(.*\S)\s*$").expect("invalid bullet regex");
}

const SECTION_SCENARIO: &str = "Scenario";
const SECTION_BASELINE: &str = "Expected Baseline Behavior";
const SECTION_TREATMENT: &str = "Expected Treatment Behavior";
const SECTION_ASSERTIONS: &str = "Assertions";
const ASSERTIONS_MARKER: &str = "Must include:";

/// Errors from scenario parsing.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Failed to read scenario file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed metadata header at line {line}: {text:?}")]
    MalformedHeader { line: usize, text: String },

    #[error("Missing required metadata field: {0}")]
    MissingField(&'static str),

    #[error("Missing required section: {0}")]
    MissingSection(&'static str),

    #[error("Scenario prompt is empty")]
    EmptyPrompt,

    #[error("Malformed assertions section: {0}")]
    MalformedAssertions(String),
}

/// A parsed scenario. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique scenario identifier, from the `id` header field.
    pub id: String,

    /// Remaining metadata header fields (e.g. `skill`), order-stable.
    pub metadata: BTreeMap<String, String>,

    /// Literal prompt text sent to the agent.
    pub prompt: String,

    /// Documentation-only notes on expected behavior without the skill.
    pub expected_baseline: Option<String>,

    /// Documentation-only notes on expected behavior with the skill.
    pub expected_treatment: Option<String>,

    /// Ordered literal substrings the treatment transcript must contain.
    /// Duplicates collapse to one logical assertion.
    pub assertions: Vec<String>,
}

impl Scenario {
    /// Parse a scenario from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let scenario = Self::from_str(&contents)?;
        tracing::debug!(
            id = %scenario.id,
            assertions = scenario.assertions.len(),
            path = %path.as_ref().display(),
            "Loaded scenario"
        );
        Ok(scenario)
    }

    /// Parse a scenario from its document text. Pure: no side effects.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &str) -> Result<Self, ScenarioError> {
        let (header_lines, sections) = split_document(input);

        let mut id = None;
        let mut metadata = BTreeMap::new();
        for (line_no, line) in header_lines {
            if line.trim().is_empty() {
                continue;
            }
            let caps = HEADER_RE
                .captures(line)
                .ok_or_else(|| ScenarioError::MalformedHeader {
                    line: line_no,
                    text: line.to_string(),
                })?;
            let key = caps[1].to_string();
            let value = caps[2].trim().to_string();
            if key == "id" {
                id = Some(value);
            } else {
                metadata.insert(key, value);
            }
        }
        let id = id.filter(|v| !v.is_empty()).ok_or(ScenarioError::MissingField("id"))?;

        let prompt = sections
            .get(SECTION_SCENARIO)
            .ok_or(ScenarioError::MissingSection(SECTION_SCENARIO))?
            .trim()
            .to_string();
        if prompt.is_empty() {
            return Err(ScenarioError::EmptyPrompt);
        }

        let assertions = match sections.get(SECTION_ASSERTIONS) {
            Some(body) => parse_assertions(body)?,
            None => Vec::new(),
        };

        Ok(Scenario {
            id,
            metadata,
            prompt,
            expected_baseline: sections
                .get(SECTION_BASELINE)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            expected_treatment: sections
                .get(SECTION_TREATMENT)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            assertions,
        })
    }

    /// Render the scenario back into document form.
    ///
    /// Parsing the rendered document yields an equal `Scenario`; the
    /// prompt and assertion texts round-trip byte-identical.
    pub fn to_document(&self) -> String {
        let mut doc = format!("id: {}\n", self.id);
        for (key, value) in &self.metadata {
            doc.push_str(&format!("{}: {}\n", key, value));
        }
        doc.push_str(&format!("\n## {}\n{}\n", SECTION_SCENARIO, self.prompt));
        if let Some(notes) = &self.expected_baseline {
            doc.push_str(&format!("\n## {}\n{}\n", SECTION_BASELINE, notes));
        }
        if let Some(notes) = &self.expected_treatment {
            doc.push_str(&format!("\n## {}\n{}\n", SECTION_TREATMENT, notes));
        }
        if !self.assertions.is_empty() {
            doc.push_str(&format!("\n## {}\n{}\n", SECTION_ASSERTIONS, ASSERTIONS_MARKER));
            for assertion in &self.assertions {
                doc.push_str(&format!("- {}\n", assertion));
            }
        }
        doc
    }
}

/// Split a document into header lines (1-indexed) and named sections.
fn split_document(input: &str) -> (Vec<(usize, &str)>, BTreeMap<String, String>) {
    let mut header = Vec::new();
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (idx, line) in input.lines().enumerate() {
        if let Some(caps) = SECTION_RE.captures(line) {
            current = Some(caps[1].to_string());
            sections.entry(caps[1].to_string()).or_default();
            continue;
        }
        match &current {
            Some(name) => {
                let body = sections.entry(name.clone()).or_default();
                body.push_str(line);
                body.push('\n');
            }
            None => header.push((idx + 1, line)),
        }
    }

    (header, sections)
}

/// Parse the assertions section body into ordered, deduplicated literals.
fn parse_assertions(body: &str) -> Result<Vec<String>, ScenarioError> {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(line) if line == ASSERTIONS_MARKER => {}
        Some(line) => {
            return Err(ScenarioError::MalformedAssertions(format!(
                "expected {:?}, found {:?}",
                ASSERTIONS_MARKER, line
            )))
        }
        None => {
            return Err(ScenarioError::MalformedAssertions(format!(
                "section is empty, expected {:?}",
                ASSERTIONS_MARKER
            )))
        }
    }

    let mut assertions = Vec::new();
    for line in lines {
        let caps = BULLET_RE.captures(line).ok_or_else(|| {
            ScenarioError::MalformedAssertions(format!("expected a bullet, found {:?}", line))
        })?;
        let text = caps[1].to_string();
        if !assertions.contains(&text) {
            assertions.push(text);
        }
    }

    if assertions.is_empty() {
        return Err(ScenarioError::MalformedAssertions(
            "no assertion bullets listed".to_string(),
        ));
    }

    Ok(assertions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_SCENARIO: &str = "\
id: solid-queue-emails
skill: background-jobs

## Scenario
Add a mailer that sends a welcome email when a user signs up.

## Expected Baseline Behavior
Sends the email inline with deliver_now.

## Expected Treatment Behavior
Enqueues the email via deliver_later on SolidQueue.

## Assertions
Must include:
- deliver_later
- SolidQueue
- background
";

    #[test]
    fn test_parse_valid_scenario() {
        let scenario = Scenario::from_str(VALID_SCENARIO).unwrap();
        assert_eq!(scenario.id, "solid-queue-emails");
        assert_eq!(scenario.metadata.get("skill").unwrap(), "background-jobs");
        assert_eq!(
            scenario.prompt,
            "Add a mailer that sends a welcome email when a user signs up."
        );
        assert_eq!(scenario.assertions, vec!["deliver_later", "SolidQueue", "background"]);
        assert!(scenario.expected_baseline.is_some());
        assert!(scenario.expected_treatment.is_some());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let scenario = Scenario::from_str(VALID_SCENARIO).unwrap();
        let reparsed = Scenario::from_str(&scenario.to_document()).unwrap();
        assert_eq!(scenario, reparsed);
        assert_eq!(scenario.prompt, reparsed.prompt);
        assert_eq!(scenario.assertions, reparsed.assertions);
    }

    #[test]
    fn test_duplicate_assertions_collapse() {
        let input = "\
id: dup

## Scenario
Do the thing.

## Assertions
Must include:
- SolidQueue
- deliver_later
- SolidQueue
";
        let scenario = Scenario::from_str(input).unwrap();
        assert_eq!(scenario.assertions, vec!["SolidQueue", "deliver_later"]);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let input = "\
skill: background-jobs

## Scenario
Do the thing.
";
        let result = Scenario::from_str(input);
        assert!(matches!(result, Err(ScenarioError::MissingField("id"))));
    }

    #[test]
    fn test_missing_scenario_section_is_rejected() {
        let input = "id: no-prompt\n\n## Assertions\nMust include:\n- x\n";
        let result = Scenario::from_str(input);
        assert!(matches!(result, Err(ScenarioError::MissingSection("Scenario"))));
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        let input = "id: empty\n\n## Scenario\n\n";
        let result = Scenario::from_str(input);
        assert!(matches!(result, Err(ScenarioError::EmptyPrompt)));
    }

    #[test]
    fn test_garbage_header_line_is_rejected() {
        let input = "id: ok\nthis is not a header\n\n## Scenario\nDo it.\n";
        let result = Scenario::from_str(input);
        assert!(matches!(result, Err(ScenarioError::MalformedHeader { line: 2, .. })));
    }

    #[test]
    fn test_assertions_without_marker_are_rejected() {
        let input = "id: ok\n\n## Scenario\nDo it.\n\n## Assertions\n- orphan bullet\n";
        let result = Scenario::from_str(input);
        assert!(matches!(result, Err(ScenarioError::MalformedAssertions(_))));
    }

    #[test]
    fn test_assertions_with_no_bullets_are_rejected() {
        let input = "id: ok\n\n## Scenario\nDo it.\n\n## Assertions\nMust include:\n";
        let result = Scenario::from_str(input);
        assert!(matches!(result, Err(ScenarioError::MalformedAssertions(_))));
    }

    #[test]
    fn test_scenario_without_assertions_parses() {
        let input = "id: judged-only\n\n## Scenario\nPlan the feature.\n";
        let scenario = Scenario::from_str(input).unwrap();
        assert!(scenario.assertions.is_empty());
    }

    #[test]
    fn test_multiline_prompt_preserved() {
        let input = "id: multi\n\n## Scenario\nFirst line.\n\nSecond paragraph.\n";
        let scenario = Scenario::from_str(input).unwrap();
        assert_eq!(scenario.prompt, "First line.\n\nSecond paragraph.");
    }
}

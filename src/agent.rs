//! Agent protocol: prompt assembly, structured response parsing, personas.

use crate::config::{Config, ReviewStrictness};
use crate::error::ProtocolError;
use crate::events::{AgentRole, CycleEvent, EventSink};
use crate::providers::{CompletionRequest, LlmProvider};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

/// Ephemeral context rebuilt every turn and handed to whichever agent is
/// being invoked. Never persisted across cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SharedState {
    pub goal: String,
    pub constraints: Vec<String>,
    pub recent_diff: Option<String>,
    pub last_test_output: Option<String>,
    pub open_issues: Vec<String>,
}

impl SharedState {
    pub fn to_prompt(&self) -> String {
        let mut out = format!("## Goal\n\n{}\n", self.goal);
        if !self.constraints.is_empty() {
            out.push_str("\n## Constraints\n\n");
            for c in &self.constraints {
                out.push_str(&format!("- {c}\n"));
            }
        }
        if let Some(diff) = &self.recent_diff {
            out.push_str(&format!("\n## Most Recent Patch\n\n```diff\n{diff}\n```\n"));
        }
        if let Some(output) = &self.last_test_output {
            out.push_str(&format!("\n## Last Test Output\n\n{output}\n"));
        }
        if !self.open_issues.is_empty() {
            out.push_str("\n## Open Issues To Address\n\n");
            for issue in &self.open_issues {
                out.push_str(&format!("- {issue}\n"));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BuilderMessage {
    pub files_needed: Vec<String>,
    pub plan: Option<String>,
    pub patch: Option<String>,
    pub tests: Option<String>,
    pub run: Vec<String>,
    pub risks: Option<String>,
}

impl Default for BuilderMessage {
    fn default() -> Self {
        Self {
            files_needed: Vec::new(),
            plan: None,
            patch: None,
            tests: None,
            run: Vec::new(),
            risks: None,
        }
    }
}

impl BuilderMessage {
    pub fn is_file_request(&self) -> bool {
        !self.files_needed.is_empty() && self.patch.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Issue {
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub how_to_verify: Option<String>,
    #[serde(default)]
    pub issue_id: Option<String>,
    #[serde(default)]
    pub uncertainty: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    RequestChanges,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Uncertainty,
    DefiniteBug,
    NeedsHuman,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Review {
    pub verdict: Verdict,
    pub issues: Vec<Issue>,
    pub suggested_patch: Option<String>,
    pub extra_tests: Option<String>,
    pub stopping: Option<String>,
    pub block_reason: Option<BlockReason>,
    pub diagnostics_needed: Vec<String>,
}

impl Default for Review {
    fn default() -> Self {
        Self {
            verdict: Verdict::Approve,
            issues: Vec::new(),
            suggested_patch: None,
            extra_tests: None,
            stopping: None,
            block_reason: None,
            diagnostics_needed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorVerdict {
    AcceptBuilder,
    AcceptReviewer,
    RejectBoth,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModeratorDecision {
    pub decision: ModeratorVerdict,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterOutcome {
    BugConfirmed,
    BugRefuted,
    TestInvalid,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ArbiterTestResult {
    pub test_added: bool,
    pub test_patch: Option<String>,
    pub test_passed: Option<bool>,
    pub outcome: ArbiterOutcome,
    pub explanation: String,
}

impl Default for ArbiterTestResult {
    fn default() -> Self {
        Self {
            test_added: false,
            test_patch: None,
            test_passed: None,
            outcome: ArbiterOutcome::TestInvalid,
            explanation: String::new(),
        }
    }
}

/// Strips an optional ```json fence, then parses and schema-validates `T`.
///
/// Schema validation here means: does it deserialize against the shape
/// `#[derive(JsonSchema)]` describes. The crate does not additionally run a
/// JSON-schema validator over raw `serde_json::Value` — `serde`'s own
/// deserialization already rejects the wrong shapes, and `#[serde(default)]`
/// throughout tolerates the "ignore unknown fields" contract in the prompt.
fn parse_fenced<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, ProtocolError> {
    let trimmed = strip_json_fence(text);
    serde_json::from_str(trimmed).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

/// Appends the JSON Schema for `T` to a system prompt so the agent knows the
/// exact response shape expected, rather than relying on prose alone.
fn with_schema<T: JsonSchema>(persona: &str) -> String {
    let schema = schema_for!(T);
    format!(
        "{persona}\n\nRespond with JSON matching this schema:\n```json\n{}\n```",
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    )
}

fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

const BUILDER_PERSONA: &str = "You are the Builder in a two-agent code-modification loop. \
You make minimal, diff-focused changes. You write tests alongside any implementation change. \
You are conservative about introducing new dependencies. \
Respond with a single JSON object and nothing else — no prose, no markdown fence unless the \
object itself is fenced in ```json. If you need to see files before proceeding, respond with \
only a `files_needed` array; otherwise populate `plan`, `patch`, `tests`, `run`, and `risks`.";

const REVIEWER_PERSONA: &str = "You are the Reviewer in a two-agent code-modification loop. \
You are paranoid about edge cases, strict about invariants, and sensitive to security issues. \
You demand reproduction steps for anything you flag. \
Respond with a single JSON object: `verdict` (approve | request_changes | block), `issues`, \
`stopping`, and when verdict is block, `block_reason` (uncertainty | definite_bug | needs_human) \
plus `diagnostics_needed` when block_reason is uncertainty.";

fn strictness_clause(strictness: ReviewStrictness) -> &'static str {
    match strictness {
        ReviewStrictness::Lenient => "Flag critical issues only; let minor and major issues pass.",
        ReviewStrictness::Balanced => "Flag critical and major issues; use judgment on minor ones.",
        ReviewStrictness::Strict => {
            "Flag critical, major, and minor issues, including performance and architectural concerns."
        }
    }
}

const MODERATOR_PERSONA: &str = "You are the Moderator resolving a deadlock between a Builder \
and a Reviewer who cannot converge. Respond with a single JSON object: `decision` \
(accept_builder | accept_reviewer | reject_both) and `reasoning`.";

/// Drives one request/response exchange with an agent, including the
/// event-stream side effect the ordering contract depends on: the raw
/// response text is published as a `stream_chunk` before the parsed,
/// structured value is returned to the caller.
pub struct AgentProtocol<'a> {
    pub sink: &'a dyn EventSink,
}

impl<'a> AgentProtocol<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }

    async fn invoke(
        &self,
        provider: &dyn LlmProvider,
        role: AgentRole,
        system_prompt: String,
        user_prompt: String,
    ) -> Result<String, ProtocolError> {
        let response = provider
            .complete(CompletionRequest {
                system_prompt,
                user_prompt,
            })
            .await?;
        self.sink.emit(CycleEvent::StreamChunk {
            role,
            chunk: response.clone(),
        });
        Ok(response)
    }

    pub async fn invoke_builder(
        &self,
        provider: &dyn LlmProvider,
        state: &SharedState,
    ) -> Result<BuilderMessage, ProtocolError> {
        let text = self
            .invoke(
                provider,
                AgentRole::Builder,
                with_schema::<BuilderMessage>(BUILDER_PERSONA),
                state.to_prompt(),
            )
            .await?;
        parse_fenced(&text)
    }

    pub async fn invoke_reviewer(
        &self,
        provider: &dyn LlmProvider,
        state: &SharedState,
        builder: &BuilderMessage,
        config: &Config,
    ) -> Result<Review, ProtocolError> {
        let system_prompt = with_schema::<Review>(&format!(
            "{REVIEWER_PERSONA}\n\n{}",
            strictness_clause(config.review_strictness)
        ));
        let mut user_prompt = state.to_prompt();
        user_prompt.push_str("\n## Builder's Submission\n\n");
        if let Some(plan) = &builder.plan {
            user_prompt.push_str(&format!("### Plan\n\n{plan}\n"));
        }
        if let Some(patch) = &builder.patch {
            user_prompt.push_str(&format!("### Patch\n\n```diff\n{patch}\n```\n"));
        }
        if let Some(tests) = &builder.tests {
            user_prompt.push_str(&format!("### Tests\n\n{tests}\n"));
        }
        if let Some(risks) = &builder.risks {
            user_prompt.push_str(&format!("### Risks\n\n{risks}\n"));
        }
        let text = self
            .invoke(provider, AgentRole::Reviewer, system_prompt, user_prompt)
            .await?;
        parse_fenced(&text)
    }

    pub async fn invoke_moderator(
        &self,
        provider: &dyn LlmProvider,
        user_prompt: String,
    ) -> Result<ModeratorDecision, ProtocolError> {
        let text = self
            .invoke(
                provider,
                AgentRole::Moderator,
                with_schema::<ModeratorDecision>(MODERATOR_PERSONA),
                user_prompt,
            )
            .await?;
        parse_fenced(&text)
    }

    pub async fn invoke_arbiter(
        &self,
        provider: &dyn LlmProvider,
        state: &SharedState,
    ) -> Result<BuilderMessage, ProtocolError> {
        // Arbiter turns reuse the builder persona plus an added preamble
        // already folded into `state.open_issues` by the caller.
        self.invoke_builder(provider, state).await
    }

    pub async fn summarize(
        &self,
        provider: &dyn LlmProvider,
        feedback: &str,
    ) -> Result<String, ProtocolError> {
        let system_prompt =
            "Summarize the following build/review feedback in 200 words or fewer, \
             preserving every actionable issue."
                .to_string();
        self.invoke(provider, AgentRole::Builder, system_prompt, feedback.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_builder_file_request() {
        let text = r#"{"files_needed": ["src/lib.rs"]}"#;
        let msg: BuilderMessage = parse_fenced(text).unwrap();
        assert!(msg.is_file_request());
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"verdict\": \"approve\", \"issues\": [], \"stopping\": null}\n```";
        let review: Review = parse_fenced(text).unwrap();
        assert_eq!(review.verdict, Verdict::Approve);
    }

    #[test]
    fn review_block_requires_reason_in_practice() {
        let text = r#"{"verdict": "block", "block_reason": "needs_human", "stopping": "halt"}"#;
        let review: Review = parse_fenced(text).unwrap();
        assert_eq!(review.block_reason, Some(BlockReason::NeedsHuman));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let text = r#"{"verdict": "approve", "issues": [], "some_future_field": 42}"#;
        let review: Review = parse_fenced(text).unwrap();
        assert_eq!(review.verdict, Verdict::Approve);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let result: Result<Review, _> = parse_fenced("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn shared_state_prompt_includes_open_issues() {
        let state = SharedState {
            goal: "add multiply".to_string(),
            open_issues: vec!["fix overflow".to_string()],
            ..Default::default()
        };
        let prompt = state.to_prompt();
        assert!(prompt.contains("add multiply"));
        assert!(prompt.contains("fix overflow"));
    }
}

//! Moderator sub-protocol: resolves a deadlock between Builder and Reviewer.
//!
//! Consulted at oscillation detection (when review history exists) and at
//! max-iteration exhaustion (when the last review carries critical or major
//! issues). The prompt format is grounded on the teacher's arbitration
//! prompt assembly: request, disputed artifact, and severity-grouped issues.

use crate::agent::{AgentProtocol, Issue, ModeratorDecision, Review, Severity};
use crate::error::ProtocolError;
use crate::providers::LlmProvider;

pub fn build_prompt(request: &str, last_patch: &str, last_review: &Review, tests_pass: bool) -> String {
    let mut critical = Vec::new();
    let mut major = Vec::new();
    let mut minor = Vec::new();
    for issue in &last_review.issues {
        match issue.severity {
            Severity::Critical => critical.push(issue),
            Severity::Major => major.push(issue),
            Severity::Minor => minor.push(issue),
        }
    }

    let render = |label: &str, issues: &[&Issue]| -> String {
        if issues.is_empty() {
            return String::new();
        }
        let mut out = format!("### {label}\n\n");
        for issue in issues {
            out.push_str(&format!("- {}\n", issue.description));
        }
        out
    };

    format!(
        "## Original Request\n\n{request}\n\n## Disputed Patch\n\n```diff\n{last_patch}\n```\n\n\
         ## Tests\n\n{}\n\n## Reviewer's Issues\n\n{}{}{}",
        if tests_pass { "passing" } else { "failing" },
        render("Critical", &critical),
        render("Major", &major),
        render("Minor", &minor),
    )
}

pub async fn consult(
    protocol: &AgentProtocol<'_>,
    provider: &dyn LlmProvider,
    request: &str,
    last_patch: &str,
    last_review: &Review,
    tests_pass: bool,
) -> Result<ModeratorDecision, ProtocolError> {
    let prompt = build_prompt(request, last_patch, last_review, tests_pass);
    protocol.invoke_moderator(provider, prompt).await
}

//! Arbiter sub-protocol: forces the builder to demonstrate a stuck issue
//! with a test rather than argue about it with the reviewer.

use crate::agent::{AgentProtocol, ArbiterOutcome, ArbiterTestResult, Issue, SharedState};
use crate::error::SubProtocolError;
use crate::guard;
use crate::providers::LlmProvider;
use crate::runner;
use std::path::Path;

/// Build the arbiter preamble appended to `open_issues` for this turn: the
/// stuck issue's identity plus the two hard requirements on the response.
pub fn build_preamble(issue: &Issue) -> String {
    format!(
        "ARBITER MODE: the issue below has appeared in two consecutive reviews and is stuck. \
         Your patch for this turn must ONLY add a test that reproduces the scenario below — no \
         other changes. Your `run` list must include the command that executes that test.\n\n\
         issue_id: {}\nseverity: {:?}\ndescription: {}\nhow_to_verify: {}",
        issue.issue_id.as_deref().unwrap_or("<unknown>"),
        issue.severity,
        issue.description,
        issue.how_to_verify.as_deref().unwrap_or("not specified"),
    )
}

/// Run one arbiter round: prompt the builder under the arbiter preamble,
/// apply the resulting test-only patch, and execute the test to settle the
/// dispute.
pub async fn run(
    protocol: &AgentProtocol<'_>,
    provider: &dyn LlmProvider,
    state: &SharedState,
    workspace_root: &Path,
    allow_paths: &[String],
) -> Result<ArbiterTestResult, SubProtocolError> {
    let response = protocol.invoke_arbiter(provider, state).await?;

    let (Some(patch), Some(run_cmd)) = (&response.patch, response.run.first()) else {
        return Ok(ArbiterTestResult {
            test_added: false,
            test_patch: None,
            test_passed: None,
            outcome: ArbiterOutcome::TestInvalid,
            explanation: "arbiter response did not include both a patch and a run command"
                .to_string(),
        });
    };

    if let Err(e) = guard::apply_patch(patch, workspace_root, allow_paths) {
        return Ok(ArbiterTestResult {
            test_added: false,
            test_patch: Some(patch.clone()),
            test_passed: None,
            outcome: ArbiterOutcome::TestInvalid,
            explanation: format!("arbiter patch could not be applied: {e}"),
        });
    }

    let output = runner::run_command(run_cmd, workspace_root);

    let outcome = if output.passed() {
        ArbiterOutcome::BugRefuted
    } else {
        ArbiterOutcome::BugConfirmed
    };

    Ok(ArbiterTestResult {
        test_added: true,
        test_patch: Some(patch.clone()),
        test_passed: Some(output.passed()),
        outcome,
        explanation: format!(
            "ran `{run_cmd}`: exit code {} — {}",
            output.exit_code,
            if output.stderr.is_empty() { output.stdout } else { output.stderr }
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Severity;

    #[test]
    fn preamble_names_the_stuck_issue() {
        let issue = Issue {
            severity: Severity::Critical,
            description: "off-by-one in range check".to_string(),
            how_to_verify: Some("call with n=0".to_string()),
            issue_id: Some("range-check".to_string()),
            uncertainty: None,
        };
        let preamble = build_preamble(&issue);
        assert!(preamble.contains("range-check"));
        assert!(preamble.contains("off-by-one in range check"));
        assert!(preamble.contains("call with n=0"));
    }
}

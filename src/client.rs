//! Inbound client channel (§6): the transport-level tagged union a caller
//! sends the core. `ApplyPatch` and `RunTests` bypass the agents entirely
//! and invoke the workspace guard / runner directly; `RunCycle` just carries
//! the natural-language request a caller passes to [`crate::cycle::Cycle::run`]
//! — building the `Cycle` itself needs provider handles this module has no
//! business owning, so dispatching that variant is left to the caller.

use crate::config::Config;
use crate::error::ApplyError;
use crate::events::{CycleEvent, EventSink};
use crate::guard;
use crate::runner;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    RunCycle { request: String },
    ApplyPatch { patch: String },
    RunTests,
}

/// Handles `ApplyPatch` and `RunTests` directly against the workspace,
/// emitting the same events a full cycle would for the equivalent step.
/// Returns `None` for `RunCycle`, which the caller must dispatch itself
/// through a [`crate::cycle::Cycle`] (it needs live `LlmProvider`s this
/// function has no way to obtain).
pub fn handle_direct(
    message: &ClientCommand,
    workspace_root: &Path,
    config: &Config,
    sink: &dyn EventSink,
) -> Option<Result<(), ApplyError>> {
    match message {
        ClientCommand::RunCycle { .. } => None,
        ClientCommand::ApplyPatch { patch } => {
            sink.emit(CycleEvent::PatchReady { patch: patch.clone() });
            let result = guard::apply_patch(patch, workspace_root, &config.allow_paths);
            if let Err(e) = &result {
                sink.emit(CycleEvent::Error { error: e.to_string() });
            }
            Some(result)
        }
        ClientCommand::RunTests => {
            let commands = if config.test_command.is_empty() {
                Vec::new()
            } else {
                vec![config.test_command.clone()]
            };
            for output in runner::run_sequence(&commands, workspace_root) {
                sink.emit(CycleEvent::TestsOutput {
                    stdout: output.stdout,
                    stderr: output.stderr,
                    exit_code: output.exit_code,
                });
            }
            Some(Ok(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHistory;
    use std::process::Command;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn a() {}\n").unwrap();
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
            vec!["add", "."],
            vec!["commit", "-m", "init"],
        ] {
            Command::new("git").args(&args).current_dir(dir.path()).output().unwrap();
        }
        dir
    }

    #[test]
    fn apply_patch_message_bypasses_agents_and_applies() {
        let dir = init_repo();
        let config = Config {
            allow_paths: vec!["src/**/*".to_string()],
            ..Config::default()
        };
        let sink = EventHistory::new();
        let patch =
            "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1 +1,2 @@\n fn a() {}\n+fn b() {}\n".to_string();

        let result = handle_direct(
            &ClientCommand::ApplyPatch { patch },
            dir.path(),
            &config,
            &sink,
        );
        assert!(matches!(result, Some(Ok(()))));
        let contents = std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();
        assert!(contents.contains("fn b()"));
    }

    #[test]
    fn run_tests_message_emits_tests_output() {
        let dir = init_repo();
        let config = Config {
            test_command: "true".to_string(),
            ..Config::default()
        };
        let sink = EventHistory::new();

        let result = handle_direct(&ClientCommand::RunTests, dir.path(), &config, &sink);
        assert!(matches!(result, Some(Ok(()))));
        let events = sink.snapshot();
        assert!(events.iter().any(|e| matches!(e, CycleEvent::TestsOutput { .. })));
    }

    #[test]
    fn run_cycle_message_is_not_handled_directly() {
        let dir = init_repo();
        let config = Config::default();
        let sink = EventHistory::new();
        let result = handle_direct(
            &ClientCommand::RunCycle { request: "add multiply".to_string() },
            dir.path(),
            &config,
            &sink,
        );
        assert!(result.is_none());
    }
}

//! Sub-process command execution for test/build/diagnostic commands.
//!
//! Commands are split on ASCII whitespace — a known limitation that cannot
//! represent quoted arguments, accepted because the only callers are test
//! runners and lint tools with simple argv shapes. `Command::new` is used
//! directly (never a shell), and each resulting token is additionally
//! passed through [`shell_safety::validate_arg`] as defense-in-depth even
//! though no shell is invoked here.

use crate::error::RunError;
use crate::shell_safety;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Split a command line on ASCII whitespace and validate each token.
pub fn split_command(line: &str) -> Result<Vec<String>, RunError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(RunError::EmptyCommand);
    }
    for token in &tokens {
        shell_safety::validate_arg(token)
            .map_err(|e| RunError::UnsafeArgument(e.to_string()))?;
    }
    Ok(tokens.into_iter().map(String::from).collect())
}

/// Run a single command line against the workspace root.
///
/// Never propagates an error: an empty command line, an unsafe token, or a
/// spawn failure (command not found, permission denied) all come back as a
/// failed [`CommandOutput`] instead. From the state machine's perspective
/// this is indistinguishable from a test that failed, which is exactly how
/// the teacher's compiler wrapper treats a failed `cargo` invocation.
pub fn run_command(line: &str, workspace_root: &Path) -> CommandOutput {
    let tokens = match split_command(line) {
        Ok(tokens) => tokens,
        Err(e) => {
            return CommandOutput {
                stdout: String::new(),
                stderr: e.to_string(),
                exit_code: 1,
            }
        }
    };
    let (program, args) = tokens.split_first().expect("non-empty, checked above");

    match Command::new(program).args(args).current_dir(workspace_root).output() {
        Ok(output) => CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(1),
        },
        Err(e) => CommandOutput {
            stdout: String::new(),
            stderr: format!("failed to spawn {program:?}: {e}"),
            exit_code: 1,
        },
    }
}

/// Run a sequence of commands, stopping at the first non-zero exit.
/// Returns the output of every command attempted; the last entry is the one
/// that stopped the sequence (or the final success).
pub fn run_sequence(lines: &[String], workspace_root: &Path) -> Vec<CommandOutput> {
    let mut outputs = Vec::with_capacity(lines.len());
    for line in lines {
        let output = run_command(line, workspace_root);
        let failed = !output.passed();
        outputs.push(output);
        if failed {
            break;
        }
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn split_command_rejects_injection_characters() {
        let err = split_command("cargo test; rm -rf /").unwrap_err();
        assert!(matches!(err, RunError::UnsafeArgument(_)));
    }

    #[test]
    fn split_command_rejects_empty() {
        assert!(matches!(split_command("   "), Err(RunError::EmptyCommand)));
    }

    #[test]
    fn run_command_captures_exit_code() {
        let dir = tempdir().unwrap();
        let output = run_command("true", dir.path());
        assert!(output.passed());

        let output = run_command("false", dir.path());
        assert!(!output.passed());
    }

    #[test]
    fn run_command_spawn_failure_is_reported_not_propagated() {
        let dir = tempdir().unwrap();
        let output = run_command("definitely-not-a-real-binary-xyz", dir.path());
        assert!(!output.passed());
        assert!(output.stderr.contains("failed to spawn"));
    }

    #[test]
    fn run_command_empty_line_is_reported_not_propagated() {
        let dir = tempdir().unwrap();
        let output = run_command("   ", dir.path());
        assert!(!output.passed());
    }

    #[test]
    fn run_sequence_stops_at_first_failure() {
        let dir = tempdir().unwrap();
        let commands = vec!["true".to_string(), "false".to_string(), "true".to_string()];
        let outputs = run_sequence(&commands, dir.path());
        assert_eq!(outputs.len(), 2);
        assert!(!outputs[1].passed());
    }
}

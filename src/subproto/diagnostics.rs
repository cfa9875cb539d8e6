//! Diagnostics sub-protocol: run reviewer-requested commands and fold their
//! output into a single evidence block for the next builder turn.

use crate::runner::{self, CommandOutput};
use std::path::Path;

pub struct DiagnosticRun {
    pub commands: Vec<String>,
    pub outputs: Vec<CommandOutput>,
}

impl DiagnosticRun {
    /// Render as the single `open_issues` entry the cycle appends, prefixed
    /// as specified so the builder can distinguish it from ordinary review
    /// feedback.
    pub fn to_open_issue(&self) -> String {
        let mut out = String::from("DIAGNOSTICS RUN:\n");
        for (cmd, output) in self.commands.iter().zip(&self.outputs) {
            out.push_str(&format!(
                "=== {cmd} ===\nExit code: {}\nStdout: {}\nStderr: {}\n",
                output.exit_code, output.stdout, output.stderr
            ));
        }
        out
    }
}

pub fn run_diagnostics(commands: &[String], workspace_root: &Path) -> DiagnosticRun {
    let outputs = commands
        .iter()
        .map(|cmd| runner::run_command(cmd, workspace_root))
        .collect();
    DiagnosticRun {
        commands: commands.to_vec(),
        outputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn composite_includes_every_command() {
        let dir = tempdir().unwrap();
        let commands = vec!["true".to_string(), "false".to_string()];
        let run = run_diagnostics(&commands, dir.path());
        let issue = run.to_open_issue();
        assert!(issue.starts_with("DIAGNOSTICS RUN:"));
        assert!(issue.contains("=== true ==="));
        assert!(issue.contains("=== false ==="));
        assert!(issue.contains("Exit code: 1"));
    }
}

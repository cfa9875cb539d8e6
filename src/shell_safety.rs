//! Shell Safety — Command Injection Prevention
//!
//! Defense-in-depth validation for the tokens the command runner splits out
//! of an agent-emitted `run`/`diagnostics_needed` line. `Command::new(arg0)
//! .args(rest)` never invokes a shell, so these metacharacters are harmless
//! in practice — but rejecting them anyway catches an agent trying to smuggle
//! shell syntax into what is supposed to be a plain argv, without reopening
//! the injection risk that switching to actual shell parsing would.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dualagent::shell_safety::validate_arg;
//!
//! validate_arg(user_input)?;
//! Command::new("cargo").arg(user_input).output()?;
//! ```

/// Metacharacters that indicate shell chaining/injection intent.
const INJECTION_CHARACTERS: &[char] = &[';', '|', '&', '`', '$', '(', ')', '\n', '\r'];

/// Validation error for argument checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgValidationError {
    /// The problematic character found.
    pub character: char,
    /// Position in the input string.
    pub position: usize,
    /// The original input (truncated to 100 chars).
    pub input_preview: String,
}

impl std::fmt::Display for ArgValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dangerous character '{}' at position {} in: {}",
            self.character.escape_default(),
            self.position,
            self.input_preview
        )
    }
}

impl std::error::Error for ArgValidationError {}

/// Validate that an argument contains no injection-class metacharacters.
///
/// Returns `Ok(())` if clean, `Err` with details if a dangerous character is
/// found. Globbing characters (`*`, `?`) are intentionally allowed through —
/// only characters that have no legitimate place in a test-runner argv are
/// rejected.
pub fn validate_arg(arg: &str) -> Result<(), ArgValidationError> {
    for (pos, ch) in arg.chars().enumerate() {
        if INJECTION_CHARACTERS.contains(&ch) {
            return Err(ArgValidationError {
                character: ch,
                position: pos,
                input_preview: if arg.len() > 100 {
                    format!("{}...", &arg[..100])
                } else {
                    arg.to_string()
                },
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_args_pass() {
        assert!(validate_arg("hello").is_ok());
        assert!(validate_arg("--flag=value").is_ok());
        assert!(validate_arg("/path/to/file").is_ok());
        assert!(validate_arg("file.rs").is_ok());
        assert!(validate_arg("").is_ok());
        // Globbing chars are OK — only injection chars are blocked.
        assert!(validate_arg("*.rs").is_ok());
        assert!(validate_arg("src/**/*.rs").is_ok());
    }

    #[test]
    fn rejects_each_injection_character() {
        let err = validate_arg("; rm -rf /").unwrap_err();
        assert_eq!(err.character, ';');
        assert_eq!(err.position, 0);

        assert_eq!(validate_arg("foo | bar").unwrap_err().character, '|');
        assert_eq!(validate_arg("foo & bar").unwrap_err().character, '&');
        assert_eq!(validate_arg("$(evil)").unwrap_err().character, '$');
        assert_eq!(validate_arg("`evil`").unwrap_err().character, '`');
        assert_eq!(validate_arg("foo\nbar").unwrap_err().character, '\n');
    }

    #[test]
    fn error_display_includes_character_and_preview() {
        let err = validate_arg("; injection").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("dangerous character"));
        assert!(msg.contains("; injection"));
    }

    #[test]
    fn long_input_is_truncated_in_preview() {
        let long = "a".repeat(200) + ";";
        let err = validate_arg(&long).unwrap_err();
        assert!(err.input_preview.ends_with("..."));
        assert!(err.input_preview.len() < 110);
    }
}

//! Workspace guard: allow-list enforcement and patch application.
//!
//! Every patch a builder produces passes through [`validate_patch`] before
//! [`apply_patch`] is allowed to touch the filesystem. The allow-list is a
//! set of glob patterns; `**` matches any number of path segments (including
//! zero), `*` matches within a segment, `?` matches one non-`/` character.

use crate::error::{ApplyError, GuardError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

static DIFF_HEADER: once_lock::Lazy<Regex> =
    once_lock::Lazy::new(|| Regex::new(r"^[+-]{3} [ab]/(.+)$").expect("valid regex"));

/// Minimal `once_cell`-style lazy static without pulling in another crate —
/// this crate already depends on `regex`; a single compiled pattern doesn't
/// need a new dependency to be lazily built once.
mod once_lock {
    use std::sync::OnceLock;

    pub struct Lazy<T> {
        cell: OnceLock<T>,
        init: fn() -> T,
    }

    impl<T> Lazy<T> {
        pub const fn new(init: fn() -> T) -> Self {
            Self {
                cell: OnceLock::new(),
                init,
            }
        }
    }

    impl<T> std::ops::Deref for Lazy<T> {
        type Target = T;
        fn deref(&self) -> &T {
            self.cell.get_or_init(self.init)
        }
    }
}

/// Extract the distinct file paths touched by a unified diff, in order of
/// first appearance, skipping `/dev/null` (file creation/deletion markers).
pub fn touched_paths(patch: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for line in patch.lines() {
        if !(line.starts_with("+++ ") || line.starts_with("--- ")) {
            continue;
        }
        if let Some(caps) = DIFF_HEADER.captures(line) {
            let path = caps[1].to_string();
            if path == "/dev/null" {
                continue;
            }
            if !seen.contains(&path) {
                seen.push(path);
            }
        }
    }
    seen
}

/// Translate a single allow-list glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, GuardError> {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    // `**/` collapses to "zero or more path segments"
                    if i + 2 < chars.len() && chars[i + 2] == '/' {
                        out.push_str("(?:.*/)?");
                        i += 3;
                        continue;
                    }
                    out.push_str(".*");
                    i += 2;
                    continue;
                }
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c if "\\.+^$()[]{}|".contains(c) => {
                out.push('\\');
                out.push(c);
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|_| GuardError::InvalidPattern(pattern.to_string()))
}

/// A path is allowed if any pattern matches it exactly, or the path lies
/// under the pattern treated as a directory prefix (so `src` allows
/// `src/lib.rs` even without a trailing `/**`).
pub fn is_allowed(path: &str, allow_paths: &[String]) -> Result<bool, GuardError> {
    for pattern in allow_paths {
        if glob_to_regex(pattern)?.is_match(path) {
            return Ok(true);
        }
        let prefix = format!("{}/", pattern.trim_end_matches('/'));
        if path.starts_with(&prefix) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Validate every path a patch touches against the allow-list.
pub fn validate_patch(patch: &str, allow_paths: &[String]) -> Result<(), GuardError> {
    let paths = touched_paths(patch);
    if paths.is_empty() {
        return Err(GuardError::NoTargetPaths);
    }
    for path in &paths {
        if !is_allowed(path, allow_paths)? {
            return Err(GuardError::DisallowedPath(path.clone()));
        }
    }
    Ok(())
}

const TEMP_PATCH_FILENAME: &str = ".dualagent-patch.tmp";

/// RAII guard that removes the temp patch file on drop, success or failure.
struct TempPatchFile {
    path: PathBuf,
}

impl TempPatchFile {
    fn write(workspace_root: &Path, contents: &str) -> Result<Self, ApplyError> {
        let path = workspace_root.join(TEMP_PATCH_FILENAME);
        std::fs::write(&path, contents).map_err(|e| ApplyError::TempFileWrite(e.to_string()))?;
        Ok(Self { path })
    }
}

impl Drop for TempPatchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Validate, stage, and apply a patch via `git apply --whitespace=nowarn`.
pub fn apply_patch(
    patch: &str,
    workspace_root: &Path,
    allow_paths: &[String],
) -> Result<(), ApplyError> {
    validate_patch(patch, allow_paths)?;

    let temp = TempPatchFile::write(workspace_root, patch)?;

    let output = Command::new("git")
        .args(["apply", "--whitespace=nowarn", TEMP_PATCH_FILENAME])
        .current_dir(workspace_root)
        .output()
        .map_err(|e| ApplyError::GitSpawnFailed(e.to_string()))?;

    drop(temp);

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(ApplyError::GitApplyFailed(stderr));
    }

    Ok(())
}

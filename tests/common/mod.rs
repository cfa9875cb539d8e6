//! Shared fixtures for cycle integration tests: a real temp-dir git
//! workspace plus scripted `FakeProvider`s standing in for the Builder,
//! Reviewer, and (where needed) Moderator.

use dualagent::providers::testing::FakeProvider;
use dualagent::{Config, ReviewMode};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Initializes a git repo with `src/lib.rs` containing a single `add`
/// function, committed so `git apply` has a baseline to patch against.
pub fn init_workspace() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(
        root.join("src/lib.rs"),
        "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n",
    )
    .unwrap();

    for args in [
        vec!["init"],
        vec!["config", "user.email", "test@test.com"],
        vec!["config", "user.name", "Test"],
        vec!["add", "."],
        vec!["commit", "-m", "init"],
    ] {
        let status = Command::new("git").args(&args).current_dir(root).output().unwrap();
        assert!(status.status.success(), "git {:?} failed: {:?}", args, status);
    }
    dir
}

/// A `Config` with a workspace-appropriate allow-list and a no-op test
/// command. `root` isn't embedded in `Config` (it's workspace-scoped at the
/// `Cycle` level, not the config level) but is taken here so call sites read
/// naturally alongside `init_workspace`.
pub fn base_config(root: &Path) -> Config {
    let _ = root;
    Config {
        allow_paths: vec!["src/**/*".to_string()],
        test_command: "true".to_string(),
        max_iterations: 3,
        review_mode: ReviewMode::Always,
        review_on_test_pass: true,
        enable_moderator: false,
        ..Config::default()
    }
}

pub fn fake(responses: Vec<serde_json::Value>) -> FakeProvider {
    FakeProvider::new(responses.into_iter().map(|v| v.to_string()).collect())
}

pub fn workspace_path(dir: &TempDir) -> PathBuf {
    dir.path().to_path_buf()
}

/// The unified diff this fixture's builder responses apply: adds a
/// `multiply` function alongside the `add` function `init_workspace` seeds.
pub const MULTIPLY_PATCH: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,3 +1,7 @@\n pub fn add(a: i32, b: i32) -> i32 {\n     a + b\n }\n+\n+pub fn multiply(a: i32, b: i32) -> i32 {\n+    a * b\n+}\n";

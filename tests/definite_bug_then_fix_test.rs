//! Scenario 2 (spec §8): iteration 1 applies and passes tests but the
//! reviewer blocks on a definite bug; iteration 2's patch addresses it and
//! is approved.

mod common;

use common::{base_config, fake, init_workspace, workspace_path};
use dualagent::{Cycle, EventHistory};
use serde_json::json;

const PATCH_1: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,3 +1,3 @@\n pub fn add(a: i32, b: i32) -> i32 {\n-    a + b\n+    a - b\n }\n";
const PATCH_2: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,3 +1,3 @@\n pub fn add(a: i32, b: i32) -> i32 {\n-    a - b\n+    a + b\n }\n";

#[tokio::test]
async fn definite_bug_is_fixed_on_second_iteration() {
    let dir = init_workspace();
    let config = base_config(dir.path());

    let builder = fake(vec![
        json!({"plan": "add", "patch": PATCH_1, "run": []}),
        json!({"plan": "fix sign error", "patch": PATCH_2, "run": []}),
    ]);
    let reviewer = fake(vec![
        json!({
            "verdict": "block",
            "block_reason": "definite_bug",
            "issues": [{
                "severity": "critical",
                "description": "add() subtracts instead of adding",
                "issue_id": "sign-error",
            }],
            "stopping": null,
        }),
        json!({"verdict": "approve", "issues": [], "stopping": null}),
    ]);

    let sink = EventHistory::new();
    let cycle = Cycle::new(config, workspace_path(&dir), &sink, &builder, &reviewer, None);
    let outcome = cycle.run("add multiply").await;

    assert!(outcome.success);
    assert_eq!(outcome.iterations, 2);

    let contents = std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();
    assert!(contents.contains("a + b"));
    assert!(!contents.contains("a - b"));
}

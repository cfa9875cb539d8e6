//! §3/§4.5: accumulated `open_issues` feedback above
//! `context_summary_threshold` (approximated as `ceil(len/4)` tokens) is
//! summarized by the builder provider before the next BUILD turn, and the
//! summary — not the raw feedback — is what reaches the next builder prompt.

mod common;

use common::{base_config, fake, init_workspace, workspace_path};
use dualagent::{Cycle, EventHistory};
use serde_json::json;

const PATCH_1: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,3 +1,4 @@\n+// v1\n pub fn add(a: i32, b: i32) -> i32 {\n     a + b\n }\n";
const PATCH_2: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,4 +1,5 @@\n // v1\n+// v2 after fix\n pub fn add(a: i32, b: i32) -> i32 {\n     a + b\n }\n";

#[tokio::test]
async fn oversized_feedback_is_summarized_before_next_build() {
    let dir = init_workspace();
    let mut config = base_config(dir.path());
    config.context_summary_threshold = 10; // force summarization on tiny feedback

    let long_issue = "x".repeat(200);
    let builder = fake(vec![
        json!({"plan": "first try", "patch": PATCH_1, "run": []}),
        json!("SUMMARY: shortened feedback"),
        json!({"plan": "second try", "patch": PATCH_2, "run": []}),
    ]);
    let reviewer = fake(vec![
        json!({
            "verdict": "block",
            "block_reason": "definite_bug",
            "issues": [{"severity": "critical", "description": long_issue}],
            "stopping": null,
        }),
        json!({"verdict": "approve", "issues": [], "stopping": null}),
    ]);

    let sink = EventHistory::new();
    let cycle = Cycle::new(config, workspace_path(&dir), &sink, &builder, &reviewer, None);
    let outcome = cycle.run("add multiply").await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.iterations, 2);

    // Three builder calls: iteration-1 BUILD, the summarization call
    // triggered by the oversized open_issues feedback, and iteration-2
    // BUILD — confirming summarization ran between iterations rather than
    // the raw, oversized feedback being forwarded verbatim.
    let requests = builder.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert!(!requests[1].user_prompt.is_empty());
    assert!(requests[2].user_prompt.contains("SUMMARY: shortened feedback"));
}

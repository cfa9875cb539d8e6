//! Scenario 5 (spec §8): the builder emits an identical patch twice; with
//! the moderator enabled and a review already on record, the moderator is
//! consulted and accepting the builder yields a terminal success rather
//! than a third `git apply`.

mod common;

use common::{base_config, fake, init_workspace, workspace_path};
use dualagent::{Config, Cycle, CycleEvent, EventHistory};
use serde_json::json;

const REPEATED_PATCH: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,3 +1,4 @@\n+// same patch both times\n pub fn add(a: i32, b: i32) -> i32 {\n     a + b\n }\n";

#[tokio::test]
async fn moderator_accepts_builder_after_oscillation() {
    let dir = init_workspace();
    let config = Config {
        enable_moderator: true,
        ..base_config(dir.path())
    };

    let builder = fake(vec![
        json!({"plan": "v1", "patch": REPEATED_PATCH, "run": []}),
        json!({"plan": "v1 again", "patch": REPEATED_PATCH, "run": []}),
    ]);
    let reviewer = fake(vec![json!({
        "verdict": "request_changes",
        "issues": [{"severity": "minor", "description": "nit", "issue_id": "nit-1"}],
        "stopping": null,
    })]);
    let moderator = fake(vec![json!({
        "decision": "accept_builder",
        "reasoning": "builder's patch is correct; reviewer nit is not blocking",
    })]);

    let sink = EventHistory::new();
    let cycle = Cycle::new(
        config,
        workspace_path(&dir),
        &sink,
        &builder,
        &reviewer,
        Some(&moderator),
    );
    let outcome = cycle.run("add multiply").await;

    assert!(outcome.success, "{}", outcome.message);

    let events = sink.snapshot();
    assert!(events
        .iter()
        .any(|e| matches!(e, CycleEvent::ModeratorDecisionEvent { .. })));
    assert!(matches!(
        events.last(),
        Some(CycleEvent::CycleComplete { success: true, .. })
    ));
}

//! The outbound event stream.
//!
//! A cycle publishes a linear sequence of [`CycleEvent`]s describing its
//! progress — status updates, streamed agent text, applied patches, test
//! output, reviews, and sub-protocol activity — ending in exactly one
//! terminal event. Transport (websocket, SSE, whatever an embedder wants) is
//! not this crate's concern; it only needs a [`broadcast::Receiver`] or an
//! [`EventSink`] impl.

use crate::agent::{ArbiterTestResult, BuilderMessage, ModeratorDecision, Review};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Builder,
    Reviewer,
    Moderator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleEvent {
    Status {
        message: String,
    },
    StreamChunk {
        role: AgentRole,
        chunk: String,
    },
    PatchReady {
        patch: String,
    },
    TestsOutput {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    ReviewReady {
        review: Review,
    },
    ModeratorDecisionEvent {
        decision: ModeratorDecision,
    },
    ArbiterMode {
        issue: String,
    },
    ArbiterResult {
        result: ArbiterTestResult,
    },
    DiagnosticRun {
        commands: Vec<String>,
    },
    CycleComplete {
        success: bool,
        message: String,
        iterations: u32,
    },
    Error {
        error: String,
    },
}

impl CycleEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleEvent::CycleComplete { .. } | CycleEvent::Error { .. })
    }
}

/// A place a cycle's events are delivered. Implemented for [`EventBus`] and
/// trivially mockable for tests that only want to assert on emitted events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CycleEvent);
}

/// Broadcast-backed event bus. One instance per cycle — histories never
/// leak between cycles because nothing outlives the `Cycle` that owns it.
pub struct EventBus {
    sender: broadcast::Sender<CycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: CycleEvent) {
        let kind = event_kind(&event);
        match self.sender.send(event) {
            Ok(count) => debug!(kind, receivers = count, "event published"),
            Err(_) => debug!(kind, "event published (no receivers)"),
        }
    }
}

fn event_kind(event: &CycleEvent) -> &'static str {
    match event {
        CycleEvent::Status { .. } => "status",
        CycleEvent::StreamChunk { .. } => "stream_chunk",
        CycleEvent::PatchReady { .. } => "patch_ready",
        CycleEvent::TestsOutput { .. } => "tests_output",
        CycleEvent::ReviewReady { .. } => "review_ready",
        CycleEvent::ModeratorDecisionEvent { .. } => "moderator_decision",
        CycleEvent::ArbiterMode { .. } => "arbiter_mode",
        CycleEvent::ArbiterResult { .. } => "arbiter_result",
        CycleEvent::DiagnosticRun { .. } => "diagnostic_run",
        CycleEvent::CycleComplete { .. } => "cycle_complete",
        CycleEvent::Error { .. } => "error",
    }
}

/// In-memory record of every event a cycle emitted, for tests and replay.
/// Not persisted to disk — this crate keeps no state across cycles.
#[derive(Default)]
pub struct EventHistory {
    events: std::sync::Mutex<Vec<CycleEvent>>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<CycleEvent> {
        self.events.lock().expect("event history poisoned").clone()
    }
}

impl EventSink for EventHistory {
    fn emit(&self, event: CycleEvent) {
        self.events.lock().expect("event history poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(CycleEvent::Status {
            message: "Iteration 1/3".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, CycleEvent::Status { .. }));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(CycleEvent::CycleComplete {
            success: true,
            message: "done".to_string(),
            iterations: 1,
        });

        assert!(rx1.recv().await.unwrap().is_terminal());
        assert!(rx2.recv().await.unwrap().is_terminal());
    }

    #[test]
    fn history_records_in_order() {
        let history = EventHistory::new();
        history.emit(CycleEvent::Status {
            message: "a".to_string(),
        });
        history.emit(CycleEvent::Error {
            error: "b".to_string(),
        });
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[1].is_terminal());
    }

    #[test]
    fn serializes_with_tagged_type_field() {
        let event = CycleEvent::TestsOutput {
            stdout: "ok".to_string(),
            stderr: String::new(),
            exit_code: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tests_output");
        assert_eq!(json["exit_code"], 0);
    }
}

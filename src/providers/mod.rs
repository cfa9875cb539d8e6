//! LLM provider adapters.
//!
//! [`LlmProvider`] is the only seam between the orchestration core and a
//! vendor API. Adapters are plain non-streaming request/response calls —
//! the agent protocol layer is responsible for forwarding the returned text
//! to the event sink as a single chunk, which is sufficient to satisfy the
//! ordering contract without modeling each vendor's SSE framing.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use crate::error::ProtocolError;
use async_trait::async_trait;

/// A single request to an agent: a fixed system prompt plus the assembled
/// user-facing prompt for this turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable name for logging (e.g. "anthropic:claude-sonnet-4-20250514").
    fn name(&self) -> String;

    /// Send one request and return the raw response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProtocolError>;
}

/// Test-support provider doubles.
///
/// Public (not `#[cfg(test)]`-gated) so that `tests/` integration tests —
/// compiled as a separate crate linked against the ordinary library build —
/// can exercise whole cycles without a network call. Never constructed
/// outside test code.
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// A scripted provider for tests: returns queued responses in order,
    /// recording every request it was asked to serve.
    pub struct FakeProvider {
        responses: Mutex<Vec<String>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeProvider {
        pub fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> String {
            "fake".to_string()
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, ProtocolError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProtocolError::ProviderCall("fake provider exhausted".to_string()))
        }
    }
}

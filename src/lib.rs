//! dualagent — the event-driven orchestration core for a Builder/Reviewer
//! (optionally Moderator) LLM pair driving an iterative code-modification
//! loop against a user workspace.
//!
//! A [`cycle::Cycle`] turns one natural-language change request into a
//! sequence of validated patches, test executions, and structured reviews,
//! terminating in an approval, a human-required halt, or a bounded failure.
//! The surrounding modules are the seams that cycle depends on:
//!
//! - [`client`] — the inbound `run_cycle`/`apply_patch`/`run_tests` tagged
//!   union a transport layer dispatches into the core.
//! - [`config`] — `.dualagent.json`/`.checkmate.json` loading and defaults.
//! - [`agent`] — prompt assembly, persona text, and schema-validated parsing
//!   of the Builder/Reviewer/Moderator/Arbiter JSON payloads.
//! - [`providers`] — the `LlmProvider` seam plus OpenAI/Anthropic adapters.
//! - [`guard`] — allow-list enforcement, unified-diff parsing, `git apply`.
//! - [`runner`] — sub-process execution for `run`/`diagnostics_needed`.
//! - [`subproto`] — arbiter, diagnostics, moderator, oscillation detector.
//! - [`events`] — the outbound tagged-union event stream.
//! - [`error`] — the `thiserror` taxonomy shared across the above.
//! - [`shell_safety`] — defense-in-depth token validation for the runner.

#![allow(clippy::uninlined_format_args)]

pub mod agent;
pub mod client;
pub mod config;
pub mod cycle;
pub mod error;
pub mod events;
pub mod guard;
pub mod providers;
pub mod runner;
pub mod shell_safety;
pub mod subproto;

pub use client::ClientCommand;

pub use agent::{
    AgentProtocol, ArbiterOutcome, ArbiterTestResult, BlockReason, BuilderMessage, Issue,
    ModeratorDecision, ModeratorVerdict, Review, Severity, SharedState, Verdict,
};
pub use config::{Config, ProviderKind, ReviewMode, ReviewStrictness};
pub use cycle::{Cycle, CycleOutcome};
pub use error::{
    ApplyError, ConfigError, CycleError, GuardError, ProtocolError, RunError, SubProtocolError,
};
pub use events::{AgentRole, CycleEvent, EventBus, EventHistory, EventSink};
pub use providers::{AnthropicProvider, CompletionRequest, LlmProvider, OpenAiProvider};
pub use runner::CommandOutput;

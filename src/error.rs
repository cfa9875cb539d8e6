//! Error taxonomy for the orchestration core.
//!
//! Each component owns a narrow `thiserror` enum rather than one crate-wide
//! error type. [`CycleError`] aggregates them for the state machine, which is
//! the only place that needs to match across component boundaries.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating `.dualagent.json` configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadFailed { path: PathBuf, message: String },

    #[error("invalid config JSON: {0}")]
    InvalidJson(String),

    #[error("missing required environment variable {0} for configured provider")]
    MissingEnvVar(String),

    #[error("unknown provider {0:?}; expected \"openai\" or \"anthropic\"")]
    UnknownProvider(String),
}

/// Errors raised validating a patch against the workspace allow-list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("patch touches disallowed path: {0}")]
    DisallowedPath(String),

    #[error("patch has no recognizable diff headers")]
    NoTargetPaths,

    #[error("invalid allow-list glob pattern: {0}")]
    InvalidPattern(String),
}

/// Errors raised applying a validated patch to the workspace.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("failed to write temporary patch file: {0}")]
    TempFileWrite(String),

    #[error("git apply failed: {0}")]
    GitApplyFailed(String),

    #[error("failed to invoke git: {0}")]
    GitSpawnFailed(String),
}

/// Errors raised spawning or awaiting a workspace command.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("command argument rejected by shell-safety check: {0}")]
    UnsafeArgument(String),

    #[error("empty command line")]
    EmptyCommand,
}

/// Errors raised talking to an agent (LLM) and interpreting its response.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("provider call failed: {0}")]
    ProviderCall(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("agent response was not valid JSON: {0}")]
    InvalidJson(String),

    #[error("agent response failed schema validation: {0}")]
    SchemaInvalid(String),
}

/// Errors raised by a sub-protocol (arbiter, diagnostics, moderator).
#[derive(Error, Debug)]
pub enum SubProtocolError {
    #[error("arbiter response did not include a usable patch and run command")]
    ArbiterInvalid,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Top-level error surfaced by the cycle state machine.
///
/// Every variant here terminates the cycle with an `error` event rather than
/// a `cycle_complete`; failures the state machine can recover from (failing
/// tests, `request_changes` reviews) are not represented as `CycleError` at
/// all — they flow back into the next iteration's `open_issues` instead.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    SubProtocol(#[from] SubProtocolError),

    #[error("Oscillation detected — human intervention needed.")]
    Oscillation,

    #[error("max iterations reached with failing tests")]
    MaxIterationsFailingTests,

    #[error("max iterations reached: {0}")]
    MaxIterationsExhausted(String),

    #[error("arbiter could not validate the disputed behavior")]
    ArbiterInvalid,

    #[error("{0}")]
    HumanRequired(String),
}

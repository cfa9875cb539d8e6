//! `dualagent` CLI — wires a real workspace, a provider chosen from
//! `OPENAI_API_KEY`/`ANTHROPIC_API_KEY`, and a `tracing`-backed event sink
//! together to run one cycle end-to-end against a directory.
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-... dualagent --workspace ./my-repo "add a multiply function"
//! ```

use clap::Parser;
use dualagent::{
    AnthropicProvider, Config, ConfigError, Cycle, CycleEvent, EventBus, EventSink, LlmProvider,
    OpenAiProvider, ProviderKind,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Drive one Builder/Reviewer cycle against a workspace.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Natural-language change request for the Builder.
    request: String,

    /// Workspace root containing the target git checkout.
    /// Falls back to `WORKSPACE_ROOT`, then the current directory.
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn workspace_root(args: &Args) -> PathBuf {
    if let Some(dir) = &args.workspace {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var("WORKSPACE_ROOT") {
        return PathBuf::from(dir);
    }
    std::env::current_dir().expect("failed to read current directory")
}

/// Build an `LlmProvider` for the configured kind, reading the matching
/// API key from the environment. Missing the required key is a fatal
/// startup error (`ConfigError::MissingEnvVar`), per the external-interfaces
/// contract: env vars are read once, at startup, not lazily per call.
fn build_provider(kind: ProviderKind, model: &str) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    match kind {
        ProviderKind::Openai => {
            let key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;
            Ok(Arc::new(OpenAiProvider::new(key, model)))
        }
        ProviderKind::Anthropic => {
            let key = std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;
            Ok(Arc::new(AnthropicProvider::new(key, model)))
        }
    }
}

/// Logs every event at `info` as it streams past, matching the teacher's
/// `tracing`-first observability style rather than printing to stdout
/// directly. Embedders wanting a UI subscribe to `EventBus` directly.
struct TracingSink {
    bus: EventBus,
}

impl EventSink for TracingSink {
    fn emit(&self, event: CycleEvent) {
        match &event {
            CycleEvent::Status { message } => info!(message, "status"),
            CycleEvent::StreamChunk { role, chunk } => {
                info!(?role, chars = chunk.len(), "stream_chunk")
            }
            CycleEvent::PatchReady { patch } => info!(bytes = patch.len(), "patch_ready"),
            CycleEvent::TestsOutput { exit_code, .. } => info!(exit_code, "tests_output"),
            CycleEvent::ReviewReady { review } => info!(verdict = ?review.verdict, "review_ready"),
            CycleEvent::ModeratorDecisionEvent { decision } => {
                info!(decision = ?decision.decision, "moderator_decision")
            }
            CycleEvent::ArbiterMode { issue } => info!(issue, "arbiter_mode"),
            CycleEvent::ArbiterResult { result } => info!(outcome = ?result.outcome, "arbiter_result"),
            CycleEvent::DiagnosticRun { commands } => {
                info!(count = commands.len(), "diagnostic_run")
            }
            CycleEvent::CycleComplete { success, iterations, .. } => {
                info!(success, iterations, "cycle_complete")
            }
            CycleEvent::Error { error: message } => error!(message, "error"),
        }
        self.bus.emit(event);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Ok(port) = std::env::var("PORT") {
        info!(port, "PORT is set but this crate does not bind a socket; ignoring");
    }

    let args = Args::parse();
    let workspace_root = workspace_root(&args);
    let config = Config::load(&workspace_root)?;

    let builder = build_provider(config.builder_provider_kind()?, &config.builder_model)?;
    let reviewer = build_provider(config.reviewer_provider_kind()?, &config.reviewer_model)?;
    let moderator = if config.enable_moderator {
        Some(build_provider(config.moderator_provider_kind()?, &config.moderator_model)?)
    } else {
        None
    };

    let sink = TracingSink { bus: EventBus::new() };
    let cycle = Cycle::new(
        config,
        workspace_root,
        &sink,
        builder.as_ref(),
        reviewer.as_ref(),
        moderator.as_deref(),
    );

    let outcome = cycle.run(&args.request).await;
    info!(
        success = outcome.success,
        iterations = outcome.iterations,
        message = %outcome.message,
        "cycle finished"
    );

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

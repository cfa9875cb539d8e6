//! The cycle state machine: BUILD → OSCILLATION-CHECK → VALIDATE & APPLY →
//! RUN → DECIDE-REVIEW → REVIEW → INTERPRET-REVIEW → STUCK-CHECK, looping
//! until a terminal event is emitted.

use crate::agent::{
    AgentProtocol, ArbiterOutcome, BlockReason, BuilderMessage, Issue, ModeratorVerdict, Review,
    Severity, SharedState, Verdict,
};
use crate::config::{Config, ReviewMode};
use crate::error::CycleError;
use crate::events::{CycleEvent, EventSink};
use crate::guard;
use crate::providers::LlmProvider;
use crate::runner;
use crate::subproto::{arbiter, diagnostics, moderator, oscillation};
use std::path::PathBuf;

/// A stuck issue is one whose `issue_id` recurs across the two most recent
/// reviews at severity major or higher.
fn find_stuck_issue(review_history: &[Review]) -> Option<Issue> {
    let len = review_history.len();
    if len < 2 {
        return None;
    }
    let latest = &review_history[len - 1];
    let previous = &review_history[len - 2];
    latest
        .issues
        .iter()
        .filter(|i| i.severity >= Severity::Major)
        .find(|i| {
            i.issue_id.is_some()
                && previous
                    .issues
                    .iter()
                    .any(|p| p.issue_id == i.issue_id && p.severity >= Severity::Major)
        })
        .cloned()
}

fn issues_to_open_issues(review: &Review) -> Vec<String> {
    review
        .issues
        .iter()
        .map(|issue| {
            format!(
                "[{:?}] {}{}",
                issue.severity,
                issue.description,
                issue
                    .how_to_verify
                    .as_ref()
                    .map(|v| format!(" (verify: {v})"))
                    .unwrap_or_default()
            )
        })
        .collect()
}

/// Internal mutable state threaded through one cycle. Never persisted.
struct State {
    iteration: u32,
    patch_history: Vec<String>,
    review_history: Vec<Review>,
    open_issues: Vec<String>,
    last_test_output: Option<String>,
    last_tests_passed: bool,
    recent_diff: Option<String>,
}

impl State {
    fn new() -> Self {
        Self {
            iteration: 0,
            patch_history: Vec::new(),
            review_history: Vec::new(),
            open_issues: Vec::new(),
            last_test_output: None,
            last_tests_passed: false,
            recent_diff: None,
        }
    }

    fn shared_state(&self, goal: &str) -> SharedState {
        SharedState {
            goal: goal.to_string(),
            constraints: Vec::new(),
            recent_diff: self.recent_diff.clone(),
            last_test_output: self.last_test_output.clone(),
            open_issues: self.open_issues.clone(),
        }
    }
}

pub struct CycleOutcome {
    pub success: bool,
    pub message: String,
    pub iterations: u32,
}

/// The top-level orchestrator. Owns no state across calls to [`Cycle::run`]
/// — a fresh `State` is created per invocation, matching the "Cycle" data
/// model's lifecycle (created per request, destroyed at the terminal event).
pub struct Cycle<'a> {
    pub config: Config,
    pub workspace_root: PathBuf,
    pub sink: &'a dyn EventSink,
    pub builder: &'a dyn LlmProvider,
    pub reviewer: &'a dyn LlmProvider,
    pub moderator: Option<&'a dyn LlmProvider>,
}

impl<'a> Cycle<'a> {
    pub fn new(
        config: Config,
        workspace_root: PathBuf,
        sink: &'a dyn EventSink,
        builder: &'a dyn LlmProvider,
        reviewer: &'a dyn LlmProvider,
        moderator: Option<&'a dyn LlmProvider>,
    ) -> Self {
        Self {
            config,
            workspace_root,
            sink,
            builder,
            reviewer,
            moderator,
        }
    }

    /// Run one cycle to completion, emitting exactly one terminal event
    /// before returning.
    pub async fn run(&self, request: &str) -> CycleOutcome {
        let mut state = State::new();
        match self.run_inner(request, &mut state).await {
            Ok(outcome) => {
                self.sink.emit(CycleEvent::CycleComplete {
                    success: outcome.success,
                    message: outcome.message.clone(),
                    iterations: outcome.iterations,
                });
                outcome
            }
            Err(e) => {
                self.sink.emit(CycleEvent::Error { error: e.to_string() });
                CycleOutcome {
                    success: false,
                    message: e.to_string(),
                    iterations: state.iteration,
                }
            }
        }
    }

    async fn run_inner(&self, request: &str, state: &mut State) -> Result<CycleOutcome, CycleError> {
        let protocol = AgentProtocol::new(self.sink);

        loop {
            // --- BUILD ---
            let builder_msg = self.build_step(request, state, &protocol).await?;
            let patch = builder_msg.patch.clone().expect("not a file request");

            // --- OSCILLATION-CHECK ---
            if oscillation::is_oscillating(&patch, &state.patch_history) {
                if self.config.enable_moderator && !state.review_history.is_empty() {
                    if let Some(decision) = self
                        .consult_moderator(request, &patch, state, &protocol)
                        .await?
                    {
                        if decision == ModeratorVerdict::AcceptBuilder {
                            return Ok(CycleOutcome {
                                success: true,
                                message: "Moderator accepted builder's patch after oscillation."
                                    .to_string(),
                                iterations: state.iteration,
                            });
                        }
                    }
                }
                return Err(CycleError::Oscillation);
            }
            state.patch_history.push(patch.clone());

            // --- VALIDATE & APPLY ---
            self.sink.emit(CycleEvent::PatchReady { patch: patch.clone() });
            guard::apply_patch(&patch, &self.workspace_root, &self.config.allow_paths)?;
            state.recent_diff = Some(patch.clone());

            // --- RUN ---
            let run_cmds = if builder_msg.run.is_empty() {
                vec![self.config.test_command.clone()]
            } else {
                builder_msg.run.clone()
            };
            let outputs = runner::run_sequence(&run_cmds, &self.workspace_root);
            for output in &outputs {
                self.sink.emit(CycleEvent::TestsOutput {
                    stdout: output.stdout.clone(),
                    stderr: output.stderr.clone(),
                    exit_code: output.exit_code,
                });
            }
            let last_output = outputs.last().expect("run_cmds is non-empty");
            state.last_tests_passed = last_output.passed();
            state.last_test_output = Some(format!(
                "exit_code: {}\nstdout:\n{}\nstderr:\n{}",
                last_output.exit_code, last_output.stdout, last_output.stderr
            ));

            // --- DECIDE-REVIEW ---
            if !state.last_tests_passed {
                state.open_issues = vec![format!(
                    "CRITICAL: tests failed.\n{}",
                    state.last_test_output.as_deref().unwrap_or_default()
                )];
                if state.iteration >= self.config.max_iterations {
                    return Err(CycleError::MaxIterationsFailingTests);
                }
                continue;
            }

            let should_review = self.should_review(state.iteration);
            let review = if should_review {
                let shared = state.shared_state(request);
                let review = protocol
                    .invoke_reviewer(self.reviewer, &shared, &builder_msg, &self.config)
                    .await?;
                self.sink.emit(CycleEvent::ReviewReady { review: review.clone() });
                review
            } else {
                Review {
                    verdict: Verdict::Approve,
                    ..Default::default()
                }
            };
            state.review_history.push(review.clone());

            // --- INTERPRET-REVIEW ---
            match review.verdict {
                Verdict::Approve => {
                    return Ok(CycleOutcome {
                        success: true,
                        message: "Reviewer approved.".to_string(),
                        iterations: state.iteration,
                    });
                }
                Verdict::Block => match review.block_reason {
                    Some(BlockReason::Uncertainty) => {
                        self.sink.emit(CycleEvent::DiagnosticRun {
                            commands: review.diagnostics_needed.clone(),
                        });
                        let diag =
                            diagnostics::run_diagnostics(&review.diagnostics_needed, &self.workspace_root);
                        for output in &diag.outputs {
                            self.sink.emit(CycleEvent::TestsOutput {
                                stdout: output.stdout.clone(),
                                stderr: output.stderr.clone(),
                                exit_code: output.exit_code,
                            });
                        }
                        state.open_issues = vec![diag.to_open_issue()];
                        state.iteration = state.iteration.saturating_sub(1);
                        continue;
                    }
                    Some(BlockReason::DefiniteBug) => {
                        let mut issues = issues_to_open_issues(&review);
                        if let Some(suggested) = &review.suggested_patch {
                            issues.push(format!("Suggested patch:\n{suggested}"));
                        }
                        state.open_issues = issues;
                        if state.iteration >= self.config.max_iterations {
                            return Err(CycleError::MaxIterationsExhausted(
                                review.stopping.clone().unwrap_or_default(),
                            ));
                        }
                        continue;
                    }
                    Some(BlockReason::NeedsHuman) | None => {
                        return Err(CycleError::HumanRequired(
                            review.stopping.clone().unwrap_or_else(|| {
                                "reviewer requires human intervention".to_string()
                            }),
                        ));
                    }
                },
                Verdict::RequestChanges => {
                    // --- STUCK-CHECK ---
                    if let Some(issue) = find_stuck_issue(&state.review_history) {
                        self.sink.emit(CycleEvent::ArbiterMode {
                            issue: issue.description.clone(),
                        });
                        let shared = {
                            let mut s = state.shared_state(request);
                            s.open_issues.push(arbiter::build_preamble(&issue));
                            s
                        };
                        let result = arbiter::run(
                            &protocol,
                            self.builder,
                            &shared,
                            &self.workspace_root,
                            &self.config.allow_paths,
                        )
                        .await?;
                        self.sink.emit(CycleEvent::ArbiterResult { result: result.clone() });

                        match result.outcome {
                            ArbiterOutcome::BugConfirmed => {
                                state.open_issues = vec![format!(
                                    "Arbiter-confirmed bug: {}",
                                    issue.description
                                )];
                            }
                            ArbiterOutcome::BugRefuted => {
                                let remaining: Vec<&Issue> = review
                                    .issues
                                    .iter()
                                    .filter(|i| i.issue_id != issue.issue_id)
                                    .collect();
                                state.open_issues = remaining
                                    .iter()
                                    .map(|i| format!("[{:?}] {}", i.severity, i.description))
                                    .collect();
                            }
                            ArbiterOutcome::TestInvalid => {
                                return Err(CycleError::ArbiterInvalid);
                            }
                        }
                        continue;
                    }

                    let has_blocking_issue =
                        review.issues.iter().any(|i| i.severity >= Severity::Major);
                    if state.iteration >= self.config.max_iterations && has_blocking_issue {
                        if self.config.enable_moderator {
                            if let Some(decision) = self
                                .consult_moderator(request, &patch, state, &protocol)
                                .await?
                            {
                                if decision == ModeratorVerdict::AcceptBuilder {
                                    return Ok(CycleOutcome {
                                        success: true,
                                        message: "Moderator accepted builder's patch.".to_string(),
                                        iterations: state.iteration,
                                    });
                                }
                            }
                        }
                        return Err(CycleError::MaxIterationsExhausted(
                            review.stopping.clone().unwrap_or_default(),
                        ));
                    }

                    state.open_issues = issues_to_open_issues(&review);
                    continue;
                }
            }
        }
    }

    async fn build_step(
        &self,
        request: &str,
        state: &mut State,
        protocol: &AgentProtocol<'_>,
    ) -> Result<BuilderMessage, CycleError> {
        loop {
            state.iteration += 1;
            self.sink.emit(CycleEvent::Status {
                message: format!("Iteration {}/{}", state.iteration, self.config.max_iterations),
            });

            self.summarize_open_issues_if_needed(state, protocol).await;

            let shared = state.shared_state(request);
            let response = protocol.invoke_builder(self.builder, &shared).await?;

            if response.is_file_request() {
                let note = self.read_requested_files(&response.files_needed);
                state.open_issues.push(note);
                state.iteration = state.iteration.saturating_sub(1);
                continue;
            }

            if response.patch.is_none() {
                return Err(CycleError::Protocol(crate::error::ProtocolError::InvalidJson(
                    "builder response carried neither files_needed nor patch".to_string(),
                )));
            }

            return Ok(response);
        }
    }

    /// Approximates accumulated `open_issues` feedback as `ceil(len/4)`
    /// tokens (§3); above `context_summary_threshold`, asks the builder
    /// provider for a 200-word summary and substitutes it for the raw
    /// feedback. A failed summarization call falls back to truncating the
    /// joined feedback at 2000 characters rather than propagating an error.
    async fn summarize_open_issues_if_needed(&self, state: &mut State, protocol: &AgentProtocol<'_>) {
        if state.open_issues.is_empty() {
            return;
        }
        let joined = state.open_issues.join("\n\n");
        let approx_tokens = joined.len().div_ceil(4);
        if approx_tokens <= self.config.context_summary_threshold {
            return;
        }
        match protocol.summarize(self.builder, &joined).await {
            Ok(summary) => state.open_issues = vec![summary],
            Err(_) => {
                let truncated: String = joined.chars().take(2000).collect();
                state.open_issues = vec![truncated];
            }
        }
    }

    fn read_requested_files(&self, files: &[String]) -> String {
        let mut note = String::from("Files provided:\n");
        for file in files {
            if guard::is_allowed(file, &self.config.allow_paths).unwrap_or(false) {
                match std::fs::read_to_string(self.workspace_root.join(file)) {
                    Ok(contents) => {
                        note.push_str(&format!("\n### {file}\n```\n{contents}\n```\n"));
                    }
                    Err(e) => note.push_str(&format!("\n### {file}\n(unreadable: {e})\n")),
                }
            } else {
                note.push_str(&format!("\n### {file}\n(outside allow-list, not provided)\n"));
            }
        }
        note
    }

    fn should_review(&self, iteration: u32) -> bool {
        match self.config.review_mode {
            ReviewMode::Always => true,
            ReviewMode::FinalOnly => iteration >= self.config.max_iterations,
            ReviewMode::Selective => {
                if iteration == 1 && !self.config.review_on_test_pass {
                    false
                } else {
                    iteration >= self.config.max_iterations || iteration % 2 == 0
                }
            }
        }
    }

    /// Returns `Ok(None)` if the moderator is disabled/unavailable; in that
    /// case the caller falls through to its own terminal-failure path.
    async fn consult_moderator(
        &self,
        request: &str,
        last_patch: &str,
        state: &State,
        protocol: &AgentProtocol<'_>,
    ) -> Result<Option<ModeratorVerdict>, CycleError> {
        let Some(moderator_provider) = self.moderator else {
            return Ok(None);
        };
        let Some(last_review) = state.review_history.last() else {
            return Ok(None);
        };
        let decision = moderator::consult(
            protocol,
            moderator_provider,
            request,
            last_patch,
            last_review,
            state.last_tests_passed,
        )
        .await?;
        self.sink.emit(CycleEvent::ModeratorDecisionEvent { decision: decision.clone() });
        Ok(Some(decision.decision))
    }
}

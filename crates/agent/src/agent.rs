//! The agent state machine.
//!
//! An [`Agent`] owns its transcript and tool registry and drives the
//! think → act loop:
//!
//! 1. **Reason**: ask the [`StepStrategy`] for the next assistant message
//! 2. **Act**: dispatch each requested tool call, recording one result per call
//! 3. **Check**: finish on a special tool, nudge or stop on repetition,
//!    stop on cancellation, stop on the step budget
//!
//! Every path out of [`Agent::run_streaming`] returns a [`RunSummary`].

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use taskloom_core::error::ToolError;
use taskloom_core::event::{DomainEvent, EventBus};
use taskloom_core::provider::{Decision, Provider, ToolChoice};
use taskloom_core::tool::{ToolCallRequest, ToolResult};
use taskloom_core::{AgentConfig, AgentState, Memory, Message, Role, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::strategy::{StepContext, StepStrategy, ToolCallStrategy};
use crate::stream::{NullSink, StreamSink};
use crate::stream_event::AgentStreamEvent;
use crate::stuck::{NUDGE_PROMPT, StuckDetector};
use crate::summary::{RunSummary, Termination};

/// How one step ended.
enum StepOutcome {
    Continue(String),
    Finished { output: String, final_output: String },
    Cancelled,
    Failed(String),
}

pub struct Agent {
    config: AgentConfig,
    strategy: Box<dyn StepStrategy>,
    tools: ToolRegistry,
    memory: Memory,
    state: AgentState,
    current_step: u32,
    cancel: CancellationToken,
    event_bus: Option<Arc<EventBus>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("strategy", &self.strategy.name())
            .field("tools", &self.tools)
            .field("messages", &self.memory.len())
            .field("current_step", &self.current_step)
            .finish()
    }
}

impl Agent {
    /// An agent using the [`ToolCallStrategy`].
    pub fn new(config: AgentConfig, provider: Arc<dyn Provider>, tools: ToolRegistry) -> Self {
        Self::with_strategy(config, Box::new(ToolCallStrategy::new(provider)), tools)
    }

    pub fn with_strategy(
        config: AgentConfig,
        strategy: Box<dyn StepStrategy>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            config,
            strategy,
            tools,
            memory: Memory::new(),
            state: AgentState::Idle,
            current_step: 0,
            cancel: CancellationToken::new(),
            event_bus: None,
        }
    }

    /// Publish lifecycle events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Use `token` for cancellation (a flow hands each member a child token).
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.set_cancel_token(token);
        self
    }

    pub fn set_cancel_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// A handle that cancels the current (or next) run.
    ///
    /// After a run ends Stopped the agent switches to a fresh token, so
    /// fetch a new handle before the next run.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Leave the Error state (or any other) and return to Idle.
    /// The transcript is kept.
    pub fn reset(&mut self) {
        self.transition(AgentState::Idle);
        self.current_step = 0;
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    /// Run until a terminal condition, discarding streamed output.
    pub async fn run(&mut self, request: Option<&str>) -> RunSummary {
        self.run_streaming(request, &NullSink).await
    }

    /// Run until a terminal condition, pushing progress to `sink`.
    pub async fn run_streaming(
        &mut self,
        request: Option<&str>,
        sink: &dyn StreamSink,
    ) -> RunSummary {
        match self.state {
            AgentState::Error => {
                let reason = format!(
                    "rejected: agent '{}' is in ERROR state; call reset() first",
                    self.config.name
                );
                warn!(agent = %self.config.name, "Run rejected in ERROR state");
                sink.push(AgentStreamEvent::Error {
                    agent: self.config.name.clone(),
                    message: reason.clone(),
                });
                return self.finish_run(sink, Termination::Rejected, vec![], None, reason);
            }
            AgentState::Running | AgentState::Stepping => {
                warn!(
                    agent = %self.config.name,
                    state = %self.state,
                    "Run started while a previous run was active, resetting to IDLE"
                );
                self.transition(AgentState::Idle);
            }
            AgentState::Finished | AgentState::Stopped => self.transition(AgentState::Idle),
            AgentState::Idle => {}
        }

        if let Some(request) = request
            && let Err(e) = self.memory.push(Message::user(request))
        {
            return self.fail(sink, vec![], e.to_string());
        }

        self.current_step = 0;
        self.transition(AgentState::Running);
        info!(
            agent = %self.config.name,
            max_steps = self.config.max_steps,
            strategy = self.strategy.name(),
            "Run starting"
        );

        let detector = StuckDetector::from_config(&self.config);
        let mut since_nudge = self.memory.len();
        let mut nudges = 0u32;
        let mut outputs: Vec<String> = Vec::new();

        loop {
            if self.current_step >= self.config.max_steps {
                let reason = format!(
                    "terminated: step budget reached ({} steps)",
                    self.config.max_steps
                );
                info!(agent = %self.config.name, "Step budget exhausted");
                self.current_step = 0;
                self.transition(AgentState::Idle);
                return self.finish_run(sink, Termination::BudgetExhausted, outputs, None, reason);
            }

            if self.cancel.is_cancelled() {
                return self.stop(sink, outputs);
            }

            self.current_step += 1;
            self.transition(AgentState::Stepping);
            debug!(agent = %self.config.name, step = self.current_step, "Step starting");

            match self.step(sink).await {
                StepOutcome::Continue(output) => {
                    self.complete_step(sink, &mut outputs, output);
                    self.transition(AgentState::Running);

                    let recent = &self.memory.messages()[since_nudge..];
                    if detector.is_stuck(recent) {
                        if nudges >= self.config.max_nudges {
                            warn!(agent = %self.config.name, nudges, "Stuck loop persisted");
                            self.current_step = 0;
                            self.transition(AgentState::Idle);
                            return self.finish_run(
                                sink,
                                Termination::StuckLoop,
                                outputs,
                                None,
                                "terminated: stuck loop detected",
                            );
                        }
                        if let Err(e) = self.memory.push(Message::system(NUDGE_PROMPT)) {
                            return self.fail(sink, outputs, e.to_string());
                        }
                        nudges += 1;
                        since_nudge = self.memory.len();
                        warn!(
                            agent = %self.config.name,
                            step = self.current_step,
                            nudges,
                            "Duplicate responses detected, nudging"
                        );
                        sink.push(AgentStreamEvent::Nudge {
                            agent: self.config.name.clone(),
                            step: self.current_step,
                        });
                        self.publish(DomainEvent::NudgeInjected {
                            agent: self.config.name.clone(),
                            step: self.current_step,
                            timestamp: Utc::now(),
                        });
                    }
                }
                StepOutcome::Finished {
                    output,
                    final_output,
                } => {
                    self.complete_step(sink, &mut outputs, output);
                    self.transition(AgentState::Finished);
                    let reason = format!("finished after {} steps", outputs.len());
                    return self.finish_run(
                        sink,
                        Termination::Finished,
                        outputs,
                        Some(final_output),
                        reason,
                    );
                }
                StepOutcome::Cancelled => {
                    self.current_step -= 1;
                    return self.stop(sink, outputs);
                }
                StepOutcome::Failed(reason) => return self.fail(sink, outputs, reason),
            }
        }
    }

    /// One reasoning call followed by sequential dispatch.
    async fn step(&mut self, sink: &dyn StreamSink) -> StepOutcome {
        let ctx = StepContext {
            config: &self.config,
            memory: &self.memory,
            tools: &self.tools,
            step: self.current_step,
        };
        let response = match self.strategy.reason(ctx).await {
            Ok(response) => response,
            Err(e) => return StepOutcome::Failed(format!("reasoning failed: {e}")),
        };

        if self.cancel.is_cancelled() {
            debug!(agent = %self.config.name, "Cancelled after reasoning, discarding response");
            return StepOutcome::Cancelled;
        }

        let calls = match response.decision() {
            Decision::Answer(_) => Vec::new(),
            Decision::Act(calls) => calls.to_vec(),
        };
        let message = response.message;
        let content = message.content.clone();
        if let Err(e) = self.memory.push(message) {
            return StepOutcome::Failed(e.to_string());
        }

        if calls.is_empty() {
            if self.config.finish_on_answer
                && self.config.tool_choice != ToolChoice::Required
                && !content.trim().is_empty()
            {
                return StepOutcome::Finished {
                    output: content.clone(),
                    final_output: content,
                };
            }
            if self.config.tool_choice == ToolChoice::Required {
                warn!(agent = %self.config.name, "Tool call required but none returned");
            }
            let output = if content.trim().is_empty() {
                "Thinking complete - no action needed".to_string()
            } else {
                content
            };
            return StepOutcome::Continue(output);
        }

        let mut observations = Vec::with_capacity(calls.len());
        let mut terminal: Option<String> = None;
        let mut cancelled = false;

        for call in &calls {
            let result = if cancelled || self.cancel.is_cancelled() {
                cancelled = true;
                ToolResult::from_error(
                    &call.call_id,
                    &ToolError::Cancelled(format!("{} (run cancelled)", call.tool_name)),
                )
            } else {
                self.dispatch(sink, call).await
            };

            let observation = self.observe(call, &result);
            if let Err(e) = self
                .memory
                .push(Message::tool_result(&call.call_id, observation.clone()))
            {
                return StepOutcome::Failed(e.to_string());
            }

            if !cancelled && !result.is_error && self.config.is_special_tool(&call.tool_name) {
                info!(
                    agent = %self.config.name,
                    tool = %call.tool_name,
                    "Special tool finished the run"
                );
                terminal = Some(result.output.clone());
            }
            observations.push(observation);
        }

        // A stop that lands during the last dispatch still discards the step.
        if cancelled || self.cancel.is_cancelled() {
            debug!(agent = %self.config.name, "Cancelled during dispatch, discarding step");
            return StepOutcome::Cancelled;
        }

        let output = observations.join("\n\n");
        match terminal {
            Some(tool_output) => {
                let final_output = if content.trim().is_empty() {
                    tool_output
                } else {
                    format!("{}\n{}", content.trim(), tool_output)
                };
                StepOutcome::Finished {
                    output,
                    final_output,
                }
            }
            None => StepOutcome::Continue(output),
        }
    }

    async fn dispatch(&self, sink: &dyn StreamSink, call: &ToolCallRequest) -> ToolResult {
        sink.push(AgentStreamEvent::ToolCall {
            agent: self.config.name.clone(),
            id: call.call_id.clone(),
            name: call.tool_name.clone(),
            input: call.arguments.clone(),
        });

        let started = Instant::now();
        let result = self.tools.dispatch(call).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            agent = %self.config.name,
            tool = %call.tool_name,
            is_error = result.is_error,
            duration_ms,
            "Tool dispatched"
        );

        self.publish(DomainEvent::ToolExecuted {
            agent: self.config.name.clone(),
            tool_name: call.tool_name.clone(),
            is_error: result.is_error,
            duration_ms,
            timestamp: Utc::now(),
        });
        sink.push(AgentStreamEvent::ToolResult {
            agent: self.config.name.clone(),
            id: call.call_id.clone(),
            name: call.tool_name.clone(),
            output: result.output.clone(),
            is_error: result.is_error,
        });

        result
    }

    /// How a tool result is recorded in the transcript.
    fn observe(&self, call: &ToolCallRequest, result: &ToolResult) -> String {
        let observation = if result.is_error {
            if result.output.starts_with("Error:") {
                result.output.clone()
            } else {
                format!("Error: {}", result.output)
            }
        } else if result.output.is_empty() {
            format!("Cmd `{}` completed with no output", call.tool_name)
        } else {
            format!(
                "Observed output of cmd `{}` executed:\n{}",
                call.tool_name, result.output
            )
        };

        match self.config.max_observe {
            Some(limit) if observation.chars().count() > limit => {
                observation.chars().take(limit).collect()
            }
            _ => observation,
        }
    }

    fn complete_step(&self, sink: &dyn StreamSink, outputs: &mut Vec<String>, output: String) {
        let step = outputs.len() as u32 + 1;
        let tool_calls = self
            .memory
            .last_index_of(Role::Assistant)
            .map(|i| self.memory.messages()[i].tool_calls.len())
            .unwrap_or(0);

        sink.push(AgentStreamEvent::Step {
            agent: self.config.name.clone(),
            step,
            output: output.clone(),
        });
        self.publish(DomainEvent::StepCompleted {
            agent: self.config.name.clone(),
            step,
            tool_calls,
            timestamp: Utc::now(),
        });
        outputs.push(output);
    }

    fn stop(&mut self, sink: &dyn StreamSink, outputs: Vec<String>) -> RunSummary {
        info!(agent = %self.config.name, steps = outputs.len(), "Run cancelled");
        self.transition(AgentState::Stopped);
        self.cancel = CancellationToken::new();
        let reason = format!("stopped: cancelled after {} completed steps", outputs.len());
        self.finish_run(sink, Termination::Cancelled, outputs, None, reason)
    }

    fn fail(&mut self, sink: &dyn StreamSink, outputs: Vec<String>, reason: String) -> RunSummary {
        warn!(agent = %self.config.name, error = %reason, "Run failed");
        self.transition(AgentState::Error);
        sink.push(AgentStreamEvent::Error {
            agent: self.config.name.clone(),
            message: reason.clone(),
        });
        self.finish_run(
            sink,
            Termination::Failed,
            outputs,
            None,
            format!("failed: {reason}"),
        )
    }

    fn finish_run(
        &self,
        sink: &dyn StreamSink,
        termination: Termination,
        outputs: Vec<String>,
        final_output: Option<String>,
        reason: impl Into<String>,
    ) -> RunSummary {
        let summary = RunSummary::new(termination, outputs, final_output, reason);
        info!(
            agent = %self.config.name,
            termination = %termination,
            steps = summary.steps,
            "Run finished"
        );
        sink.push(AgentStreamEvent::Done {
            agent: self.config.name.clone(),
            termination: termination.to_string(),
            steps: summary.steps,
        });
        self.publish(DomainEvent::RunFinished {
            agent: self.config.name.clone(),
            termination: termination.to_string(),
            steps: summary.steps,
            timestamp: Utc::now(),
        });
        summary
    }

    fn transition(&mut self, to: AgentState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(agent = %self.config.name, %from, %to, "State transition");
        self.publish(DomainEvent::StateChanged {
            agent: self.config.name.clone(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

//! Sequential multi-agent flow.
//!
//! # Architecture
//!
//! ```text
//!  task ──► planner ──► executor ──► critic ──┐
//!             ▲                               │ ACCEPT? ──► done
//!             └────────── feedback ◄──────────┘
//! ```
//!
//! Members run strictly in order. Each member after the first sees the task
//! plus everything produced earlier in the same pass; the first member of a
//! later pass sees the terminal role's feedback from the previous pass.

use serde::{Deserialize, Serialize};
use taskloom_agent::{
    Agent, AgentStreamEvent, CancellationToken, NullSink, RunSummary, StreamSink, Termination,
};
use tracing::{debug, info, warn};

use crate::accept::is_accepted;

pub const DEFAULT_ACCEPT_MARKER: &str = "ACCEPT";

/// One role-tagged participant.
#[derive(Debug)]
pub struct FlowMember {
    pub role: String,
    pub agent: Agent,
}

impl FlowMember {
    pub fn new(role: impl Into<String>, agent: Agent) -> Self {
        Self {
            role: role.into(),
            agent,
        }
    }
}

/// Everything needed to build a [`Flow`].
#[derive(Debug)]
pub struct FlowSpec {
    pub members: Vec<FlowMember>,
    pub max_iterations: u32,
    /// Role whose output decides convergence (defaults to the last member)
    pub terminal_role: Option<String>,
    pub accept_marker: String,
}

impl FlowSpec {
    pub fn new(members: Vec<FlowMember>) -> Self {
        Self {
            members,
            max_iterations: 3,
            terminal_role: None,
            accept_marker: DEFAULT_ACCEPT_MARKER.into(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_terminal_role(mut self, role: impl Into<String>) -> Self {
        self.terminal_role = Some(role.into());
        self
    }

    pub fn with_accept_marker(mut self, marker: impl Into<String>) -> Self {
        self.accept_marker = marker.into();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("a flow needs at least one member")]
    NoMembers,

    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    #[error("terminal role '{0}' is not a member of the flow")]
    UnknownTerminalRole(String),

    #[error("accept marker must not be empty")]
    EmptyAcceptMarker,
}

/// How a flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowOutcome {
    Converged,
    NotConverged,
    Cancelled,
    Failed,
}

/// One member's output in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberOutput {
    pub pass: u32,
    pub role: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub text: String,
    pub outcome: FlowOutcome,
    pub converged: bool,
    /// Passes started (the last one may be partial)
    pub passes: u32,
    pub outputs: Vec<MemberOutput>,
}

pub struct Flow {
    members: Vec<FlowMember>,
    max_iterations: u32,
    terminal_role: String,
    accept_marker: String,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("roles", &self.roles())
            .field("max_iterations", &self.max_iterations)
            .field("terminal_role", &self.terminal_role)
            .field("accept_marker", &self.accept_marker)
            .finish()
    }
}

impl Flow {
    pub fn new(spec: FlowSpec) -> Result<Self, FlowError> {
        let Some(last) = spec.members.last() else {
            return Err(FlowError::NoMembers);
        };
        if spec.max_iterations == 0 {
            return Err(FlowError::ZeroIterations);
        }
        if spec.accept_marker.trim().is_empty() {
            return Err(FlowError::EmptyAcceptMarker);
        }

        let terminal_role = spec.terminal_role.unwrap_or_else(|| last.role.clone());
        if !spec.members.iter().any(|m| m.role == terminal_role) {
            return Err(FlowError::UnknownTerminalRole(terminal_role));
        }

        Ok(Self {
            members: spec.members,
            max_iterations: spec.max_iterations,
            terminal_role,
            accept_marker: spec.accept_marker,
            cancel: CancellationToken::new(),
        })
    }

    pub fn roles(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.role.as_str()).collect()
    }

    pub fn members(&self) -> &[FlowMember] {
        &self.members
    }

    pub fn member(&self, role: &str) -> Option<&Agent> {
        self.members
            .iter()
            .find(|m| m.role == role)
            .map(|m| &m.agent)
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn terminal_role(&self) -> &str {
        &self.terminal_role
    }

    pub fn accept_marker(&self) -> &str {
        &self.accept_marker
    }

    /// Cancelling this token stops the member currently running and the flow.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn execute(&mut self, task: &str) -> FlowSummary {
        self.execute_streaming(task, &NullSink).await
    }

    pub async fn execute_streaming(&mut self, task: &str, sink: &dyn StreamSink) -> FlowSummary {
        info!(
            roles = ?self.roles(),
            max_iterations = self.max_iterations,
            terminal = %self.terminal_role,
            "Flow starting"
        );

        let mut outputs: Vec<MemberOutput> = Vec::new();
        let mut feedback: Option<String> = None;
        let mut pass_outputs: Vec<(String, String)> = Vec::new();

        for pass in 1..=self.max_iterations {
            pass_outputs.clear();
            debug!(pass, "Flow pass starting");

            for index in 0..self.members.len() {
                if self.cancel.is_cancelled() {
                    return self.cancelled(pass, outputs);
                }

                let input = if index == 0 {
                    first_member_input(task, pass, &self.terminal_role, feedback.as_deref())
                } else {
                    member_input(task, pass, &pass_outputs)
                };

                let token = self.cancel.child_token();
                let member = &mut self.members[index];
                member.agent.set_cancel_token(token);
                sink.push(AgentStreamEvent::MemberStarted {
                    pass,
                    role: member.role.clone(),
                });
                info!(pass, role = %member.role, "Flow member starting");

                let summary: RunSummary = member.agent.run_streaming(Some(&input), sink).await;
                let role = member.role.clone();

                match summary.termination {
                    Termination::Failed | Termination::Rejected => {
                        warn!(pass, role = %role, "Flow member failed, aborting flow");
                        let text = format!(
                            "{}\n\nflow aborted: member '{role}' failed on pass {pass}: {}",
                            render_pass(pass, &pass_outputs),
                            summary.text
                        );
                        return FlowSummary {
                            text,
                            outcome: FlowOutcome::Failed,
                            converged: false,
                            passes: pass,
                            outputs,
                        };
                    }
                    Termination::Cancelled => return self.cancelled(pass, outputs),
                    Termination::Finished
                    | Termination::BudgetExhausted
                    | Termination::StuckLoop => {}
                }

                let output = summary.output().to_string();
                outputs.push(MemberOutput {
                    pass,
                    role: role.clone(),
                    output: output.clone(),
                });
                pass_outputs.push((role.clone(), output.clone()));

                if role == self.terminal_role {
                    if is_accepted(&output, &self.accept_marker) {
                        info!(pass, role = %role, "Flow converged");
                        let text = format!(
                            "{}\n\nflow converged on pass {pass} of {}",
                            render_pass(pass, &pass_outputs),
                            self.max_iterations
                        );
                        return FlowSummary {
                            text,
                            outcome: FlowOutcome::Converged,
                            converged: true,
                            passes: pass,
                            outputs,
                        };
                    }
                    feedback = Some(output);
                }
            }
        }

        info!(passes = self.max_iterations, "Flow ended without convergence");
        let text = format!(
            "{}\n\nnote: convergence not reached after {} passes",
            render_pass(self.max_iterations, &pass_outputs),
            self.max_iterations
        );
        FlowSummary {
            text,
            outcome: FlowOutcome::NotConverged,
            converged: false,
            passes: self.max_iterations,
            outputs,
        }
    }

    fn cancelled(&mut self, pass: u32, outputs: Vec<MemberOutput>) -> FlowSummary {
        info!(pass, completed = outputs.len(), "Flow cancelled");
        self.cancel = CancellationToken::new();
        FlowSummary {
            text: format!(
                "flow stopped: cancelled during pass {pass} after {} member runs",
                outputs.len()
            ),
            outcome: FlowOutcome::Cancelled,
            converged: false,
            passes: pass,
            outputs,
        }
    }
}

fn first_member_input(task: &str, pass: u32, terminal: &str, feedback: Option<&str>) -> String {
    match feedback {
        Some(feedback) if pass > 1 => format!(
            "{task}\n\n## Feedback from {terminal} (pass {})\n{feedback}",
            pass - 1
        ),
        _ => task.to_string(),
    }
}

fn member_input(task: &str, pass: u32, so_far: &[(String, String)]) -> String {
    format!("{task}\n\n{}", render_pass(pass, so_far))
}

fn render_pass(pass: u32, outputs: &[(String, String)]) -> String {
    let mut text = format!("## Progress so far (pass {pass})");
    for (role, output) in outputs {
        text.push_str(&format!("\n### {role}\n{output}"));
    }
    text
}

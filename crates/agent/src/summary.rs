//! The outcome of one agent run.

use serde::{Deserialize, Serialize};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A special tool was invoked or a final answer was accepted.
    Finished,
    /// The step budget ran out; the agent is back to Idle.
    BudgetExhausted,
    /// Repeated responses survived every recovery nudge.
    StuckLoop,
    /// The run was cancelled from outside.
    Cancelled,
    /// The reasoning backend or the transcript failed; the agent is in Error.
    Failed,
    /// The run was refused because the agent is in Error.
    Rejected,
}

impl Termination {
    /// Whether the agent can be run again without `reset()`.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Termination::Failed | Termination::Rejected)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Termination::Finished => "finished",
            Termination::BudgetExhausted => "budget_exhausted",
            Termination::StuckLoop => "stuck_loop",
            Termination::Cancelled => "cancelled",
            Termination::Failed => "failed",
            Termination::Rejected => "rejected",
        })
    }
}

/// Human-readable account of a run plus the structured bits callers need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// `Step i: ...` lines followed by the line naming the end condition
    pub text: String,
    pub termination: Termination,
    /// Completed steps (a step discarded by cancellation is not counted)
    pub steps: u32,
    /// The final answer or terminate message, when one was produced
    pub final_output: Option<String>,
    /// Output of each completed step, in order
    pub step_outputs: Vec<String>,
}

impl RunSummary {
    pub(crate) fn new(
        termination: Termination,
        step_outputs: Vec<String>,
        final_output: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        let mut text = String::new();
        for (i, output) in step_outputs.iter().enumerate() {
            text.push_str(&format!("Step {}: {}\n", i + 1, output));
        }
        text.push_str(&reason.into());

        Self {
            text,
            termination,
            steps: step_outputs.len() as u32,
            final_output,
            step_outputs,
        }
    }

    /// The most useful single piece of output: the final answer, else the
    /// last step's output, else the summary text.
    pub fn output(&self) -> &str {
        self.final_output
            .as_deref()
            .or_else(|| self.step_outputs.last().map(String::as_str))
            .unwrap_or(&self.text)
    }

    pub fn is_finished(&self) -> bool {
        self.termination == Termination::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lists_steps_then_reason() {
        let summary = RunSummary::new(
            Termination::BudgetExhausted,
            vec!["looked".into(), "looked again".into()],
            None,
            "terminated: step budget reached (2 steps)",
        );
        assert_eq!(
            summary.text,
            "Step 1: looked\nStep 2: looked again\nterminated: step budget reached (2 steps)"
        );
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.output(), "looked again");
    }

    #[test]
    fn empty_run_still_has_text() {
        let summary = RunSummary::new(Termination::Rejected, vec![], None, "rejected");
        assert_eq!(summary.output(), "rejected");
        assert!(!summary.termination.is_recoverable());
    }

    #[test]
    fn final_output_wins() {
        let summary = RunSummary::new(
            Termination::Finished,
            vec!["a".into()],
            Some("42".into()),
            "finished",
        );
        assert_eq!(summary.output(), "42");
        assert!(summary.is_finished());
    }
}

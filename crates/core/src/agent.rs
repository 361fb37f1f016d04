//! Agent configuration and state types.

use serde::{Deserialize, Serialize};

use crate::provider::ToolChoice;

/// Lifecycle state of one agent instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Created or reset; ready to run
    #[default]
    Idle,
    /// A run is in progress, between steps
    Running,
    /// A step is executing
    Stepping,
    /// The run ended by explicit completion
    Finished,
    /// The run was cancelled from outside
    Stopped,
    /// Unrecoverable fault; requires `reset()`
    Error,
}

impl AgentState {
    /// Whether a run is currently in flight.
    pub fn is_active(self) -> bool {
        matches!(self, AgentState::Running | AgentState::Stepping)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Stepping => "STEPPING",
            AgentState::Finished => "FINISHED",
            AgentState::Stopped => "STOPPED",
            AgentState::Error => "ERROR",
        })
    }
}

/// Immutable behavior settings of an agent, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name (also the flow role, when part of a flow)
    #[serde(default = "default_name")]
    pub name: String,

    /// Model to request from the provider
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Step budget per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Repeats of the latest assistant response needed to call the run stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// How many recent assistant messages the stuck check looks at
    #[serde(default = "default_stuck_window")]
    pub stuck_window: usize,

    /// Nudges allowed per run before a stuck run is terminated
    #[serde(default = "default_max_nudges")]
    pub max_nudges: u32,

    /// Truncate recorded tool observations to this many characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Treat a text-only reply as the final answer
    #[serde(default)]
    pub finish_on_answer: bool,

    /// Tools whose invocation finishes the run
    #[serde(default = "default_special_tools")]
    pub special_tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Appended (not stored) after the transcript on every reasoning call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,
}

fn default_name() -> String {
    "agent".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_steps() -> u32 {
    20
}
fn default_duplicate_threshold() -> usize {
    2
}
fn default_stuck_window() -> usize {
    4
}
fn default_max_nudges() -> u32 {
    3
}
fn default_special_tools() -> Vec<String> {
    vec!["terminate".into()]
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            stuck_window: default_stuck_window(),
            max_nudges: default_max_nudges(),
            max_observe: None,
            tool_choice: ToolChoice::default(),
            finish_on_answer: false,
            special_tools: default_special_tools(),
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}

impl AgentConfig {
    /// Whether invoking `tool_name` ends the run.
    pub fn is_special_tool(&self, tool_name: &str) -> bool {
        self.special_tools
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tool_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_state_starts_idle() {
        assert_eq!(AgentState::default(), AgentState::Idle);
        assert!(!AgentState::Idle.is_active());
        assert!(AgentState::Stepping.is_active());
        assert_eq!(AgentState::Stopped.to_string(), "STOPPED");
    }

    #[test]
    fn config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.duplicate_threshold, 2);
        assert!(config.is_special_tool("terminate"));
        assert!(config.is_special_tool("Terminate"));
        assert!(!config.is_special_tool("shell"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: AgentConfig = serde_json::from_str(r#"{"max_steps": 3}"#).unwrap();
        assert_eq!(config.max_steps, 3);
        assert_eq!(config.stuck_window, 4);
        assert_eq!(config.tool_choice, ToolChoice::Auto);
    }
}

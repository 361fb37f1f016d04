//! Agent-level streaming events.
//!
//! These are what a [`StreamSink`](crate::stream::StreamSink) receives:
//! - `step`            output of one completed step
//! - `tool_call`       the agent is invoking a tool
//! - `tool_result`     tool execution completed
//! - `nudge`           the stuck detector injected a recovery prompt
//! - `member_started`  a flow handed the task to its next member
//! - `done`            a run ended
//! - `error`           a run failed or was refused

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// One completed step.
    Step {
        agent: String,
        step: u32,
        output: String,
    },

    /// The agent is calling a tool.
    ToolCall {
        agent: String,
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        agent: String,
        id: String,
        name: String,
        output: String,
        is_error: bool,
    },

    /// A recovery nudge was injected after repeated responses.
    Nudge { agent: String, step: u32 },

    /// A flow started running one of its members.
    MemberStarted { pass: u32, role: String },

    /// The run is complete.
    Done {
        agent: String,
        termination: String,
        steps: u32,
    },

    /// An error occurred.
    Error { agent: String, message: String },
}

impl AgentStreamEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Step { .. } => "step",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Nudge { .. } => "nudge",
            Self::MemberStarted { .. } => "member_started",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_step() {
        let event = AgentStreamEvent::Step {
            agent: "planner".into(),
            step: 1,
            output: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"step""#));
        assert!(json.contains(r#""output":"Hello""#));
    }

    #[test]
    fn event_serialization_tool_call() {
        let event = AgentStreamEvent::ToolCall {
            agent: "a".into(),
            id: "call_1".into(),
            name: "shell".into(),
            input: serde_json::json!({"command": "ls"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""name":"shell""#));
    }

    #[test]
    fn event_type_matches_tag() {
        let events = [
            AgentStreamEvent::Nudge {
                agent: "a".into(),
                step: 3,
            },
            AgentStreamEvent::MemberStarted {
                pass: 1,
                role: "critic".into(),
            },
            AgentStreamEvent::Done {
                agent: "a".into(),
                termination: "finished".into(),
                steps: 2,
            },
            AgentStreamEvent::Error {
                agent: "a".into(),
                message: "boom".into(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"tool_result","agent":"a","id":"c","name":"shell","output":"ok","is_error":false}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::ToolResult { output, is_error, .. } => {
                assert_eq!(output, "ok");
                assert!(!is_error);
            }
            _ => panic!("Wrong variant"),
        }
    }
}

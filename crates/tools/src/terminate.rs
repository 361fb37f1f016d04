//! Terminate tool: the agent's way of declaring a run finished.
//!
//! The agent loop treats any tool listed in `special_tools` as terminal;
//! this is the default one.

use async_trait::async_trait;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Tool, ToolOutput};

pub const TERMINATE_TOOL_NAME: &str = "terminate";

#[derive(Debug, Default, Clone, Copy)]
pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Finish the interaction when the request is met or when you cannot proceed further. \
         Call this once all work is done."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["success", "failure"],
                    "description": "The finish status of the interaction"
                },
                "message": {
                    "type": "string",
                    "description": "Optional final answer or closing remark"
                }
            },
            "required": ["status"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let status = arguments["status"].as_str().unwrap_or("success");
        let mut output = format!("The interaction has been completed with status: {status}");
        if let Some(message) = arguments["message"].as_str().filter(|m| !m.is_empty()) {
            output.push('\n');
            output.push_str(message);
        }
        Ok(ToolOutput::success(output))
    }
}

//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world. The core
//! never knows what a tool does; it only resolves names, validates
//! arguments against the declared input schema, and normalizes failures
//! into error results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool, produced by the reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique call ID (matches the model's tool_call id)
    pub call_id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Arguments as a JSON value (expected to be an object)
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What a capability hands back from a successful invocation.
///
/// `is_error` lets a tool report a failure it handled itself (non-zero
/// exit code, missing file) without raising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }
}

/// The result of dispatching one [`ToolCallRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The output content (or a categorized error message)
    pub output: String,

    /// Whether the call failed
    pub is_error: bool,
}

impl ToolResult {
    pub fn from_error(call_id: impl Into<String>, err: &ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            output: format!("Error: {err}"),
            is_error: true,
        }
    }
}

/// The core Tool trait.
///
/// Each capability (terminate, shell, file_read, ...) implements this trait.
/// Tools are registered in a [`ToolRegistry`] and offered to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "terminate").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's arguments.
    fn input_schema(&self) -> serde_json::Value;

    /// Run the tool with already-validated arguments.
    async fn invoke(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.input_schema(),
        }
    }
}

/// Check `arguments` against a tool's declared JSON Schema.
pub fn validate_arguments(
    tool_name: &str,
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: format!("tool declares an invalid input schema: {e}"),
    })?;

    let errors: Vec<String> = validator.iter_errors(arguments).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason: errors.join("; "),
        })
    }
}

/// A name-keyed collection of tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Dispatch tool calls the model requests
///
/// Names are kept ordered so definitions are offered deterministically.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    dispatch_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every dispatch by `timeout`; an overrun becomes an error result.
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = Some(timeout);
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced existing tool registration");
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call. Never fails: every problem is folded into an
    /// error [`ToolResult`].
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolResult {
        match self.try_dispatch(request).await {
            Ok(output) if output.is_error => {
                debug!(tool = %request.tool_name, "Tool reported a failure");
                let err = ToolError::ExecutionFailed {
                    tool_name: request.tool_name.clone(),
                    reason: output.output,
                };
                ToolResult::from_error(&request.call_id, &err)
            }
            Ok(output) => ToolResult {
                call_id: request.call_id.clone(),
                output: output.output,
                is_error: false,
            },
            Err(err) => {
                warn!(tool = %request.tool_name, error = %err, "Tool dispatch failed");
                ToolResult::from_error(&request.call_id, &err)
            }
        }
    }

    async fn try_dispatch(&self, request: &ToolCallRequest) -> Result<ToolOutput, ToolError> {
        let tool = self.get(&request.tool_name)?;
        validate_arguments(tool.name(), &tool.input_schema(), &request.arguments)?;

        debug!(tool = %request.tool_name, call_id = %request.call_id, "Dispatching tool call");

        match self.dispatch_timeout {
            Some(limit) => tokio::time::timeout(limit, tool.invoke(request.arguments.clone()))
                .await
                .map_err(|_| ToolError::Timeout {
                    tool_name: request.tool_name.clone(),
                    timeout: limit,
                })?,
            None => tool.invoke(request.arguments.clone()).await,
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("dispatch_timeout", &self.dispatch_timeout)
            .finish()
    }
}

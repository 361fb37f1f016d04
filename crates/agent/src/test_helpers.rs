//! Scripted providers and stub tools shared by the agent, flow, controller
//! and CLI tests. Compiled for this crate's tests and behind the
//! `test-support` feature for downstream crates.

use async_trait::async_trait;
use std::sync::Mutex;
use taskloom_core::error::{ProviderError, ToolError};
use taskloom_core::message::{Message, Role};
use taskloom_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use taskloom_core::tool::{Tool, ToolCallRequest, ToolOutput};

/// A mock provider that returns scripted responses in sequence.
///
/// Once the script is exhausted the last entry is repeated, which is what
/// budget and stuck-loop tests want.
pub struct ScriptedProvider {
    script: Vec<Result<ProviderResponse, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plain text replies in order.
    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| text(r)).collect())
    }

    /// Fails every call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::from_results(vec![Err(error)])
    }

    /// The newest user message of the most recent request.
    pub fn last_user_message(&self) -> String {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .and_then(|r| r.messages.iter().rev().find(|m| m.role == Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len().min(self.script.len().saturating_sub(1));
        requests.push(request);
        self.script
            .get(index)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::NotConfigured("empty script".into())))
    }
}

/// A plain text reply.
pub fn text(content: &str) -> ProviderResponse {
    respond(Message::assistant(content))
}

/// A reply calling one tool.
pub fn call(tool: &str, args: serde_json::Value) -> ProviderResponse {
    calls(vec![(tool, args)])
}

/// A reply calling several tools in order.
pub fn calls(requests: Vec<(&str, serde_json::Value)>) -> ProviderResponse {
    let calls = requests
        .into_iter()
        .enumerate()
        .map(|(i, (tool, args))| ToolCallRequest::new(format!("call_{tool}_{i}"), tool, args))
        .collect();
    respond(Message::assistant_with_calls("", calls))
}

/// Wrap `message` in a response with fixed usage.
pub fn respond(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Accepts any object and echoes it back.
pub struct NoopTool {
    name: String,
}

impl NoopTool {
    pub fn named(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for NoopTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Does nothing"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::success(format!("{}: {arguments}", self.name)))
    }
}

/// Fails on every invocation.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    async fn invoke(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "flaky".into(),
            reason: "disk on fire".into(),
        })
    }
}

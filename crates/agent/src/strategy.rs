//! Reasoning strategies: how an agent asks the backend what to do next.
//!
//! The agent loop is the same for every mode; only the request it sends
//! differs. A strategy turns the agent's configuration, transcript, and
//! tools into one [`ProviderRequest`] and hands back the response.

use async_trait::async_trait;
use std::sync::Arc;
use taskloom_core::error::ProviderError;
use taskloom_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice};
use taskloom_core::{AgentConfig, Memory, Message, ToolRegistry};
use tracing::{debug, warn};

/// Everything a strategy may read while reasoning.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub config: &'a AgentConfig,
    pub memory: &'a Memory,
    pub tools: &'a ToolRegistry,
    pub step: u32,
}

#[async_trait]
pub trait StepStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// One reasoning call. The returned message is an assistant message
    /// whose tool calls (if any) are what the agent will dispatch.
    async fn reason(&self, ctx: StepContext<'_>) -> Result<ProviderResponse, ProviderError>;
}

/// `[system_prompt] + transcript + [next_step_prompt]`; prompts are never stored.
fn build_messages(ctx: &StepContext<'_>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(ctx.memory.len() + 2);
    if let Some(system) = &ctx.config.system_prompt {
        messages.push(Message::system(system.clone()));
    }
    messages.extend(ctx.memory.iter().cloned());
    if let Some(next) = &ctx.config.next_step_prompt {
        messages.push(Message::user(next.clone()));
    }
    messages
}

/// Offers the registry's tools and honors the configured [`ToolChoice`].
pub struct ToolCallStrategy {
    provider: Arc<dyn Provider>,
}

impl ToolCallStrategy {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl StepStrategy for ToolCallStrategy {
    fn name(&self) -> &str {
        "tool_call"
    }

    async fn reason(&self, ctx: StepContext<'_>) -> Result<ProviderResponse, ProviderError> {
        let choice = ctx.config.tool_choice;
        let tools = if choice == ToolChoice::None {
            Vec::new()
        } else {
            ctx.tools.definitions()
        };

        let request = ProviderRequest {
            model: ctx.config.model.clone(),
            messages: build_messages(&ctx),
            temperature: ctx.config.temperature,
            max_tokens: ctx.config.max_tokens,
            tools,
            tool_choice: choice,
        };

        debug!(
            agent = %ctx.config.name,
            step = ctx.step,
            messages = request.messages.len(),
            tools = request.tools.len(),
            tool_choice = %choice,
            "Reasoning"
        );

        let mut response = self.provider.complete(request).await?;

        if choice == ToolChoice::None && !response.message.tool_calls.is_empty() {
            warn!(
                agent = %ctx.config.name,
                count = response.message.tool_calls.len(),
                "Tool calls returned with tool_choice=none, ignoring them"
            );
            response.message.tool_calls.clear();
        }

        Ok(response)
    }
}

/// Plain question/answer: no tools offered, any tool calls dropped.
pub struct DirectAnswerStrategy {
    provider: Arc<dyn Provider>,
}

impl DirectAnswerStrategy {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl StepStrategy for DirectAnswerStrategy {
    fn name(&self) -> &str {
        "direct_answer"
    }

    async fn reason(&self, ctx: StepContext<'_>) -> Result<ProviderResponse, ProviderError> {
        let request = ProviderRequest {
            model: ctx.config.model.clone(),
            messages: build_messages(&ctx),
            temperature: ctx.config.temperature,
            max_tokens: ctx.config.max_tokens,
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
        };

        let mut response = self.provider.complete(request).await?;
        response.message.tool_calls.clear();
        Ok(response)
    }
}

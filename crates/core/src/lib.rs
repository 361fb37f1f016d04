//! # Taskloom Core
//!
//! Domain types, traits, and error definitions for the Taskloom agent
//! execution core. This crate has no knowledge of concrete backends or
//! tools; it defines the model every other crate implements against.
//!
//! - [`Memory`]: append-only transcript of [`Message`]s
//! - [`Tool`] / [`ToolRegistry`]: capabilities and their dispatch
//! - [`Provider`]: the reasoning backend contract
//! - [`AgentState`] / [`AgentConfig`]: agent lifecycle and settings
//! - [`EventBus`]: observation hooks

pub mod agent;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentConfig, AgentState};
pub use error::{MemoryError, ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use memory::Memory;
pub use message::{Message, Role};
pub use provider::{
    Decision, Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition, Usage,
};
pub use tool::{Tool, ToolCallRequest, ToolOutput, ToolRegistry, ToolResult, validate_arguments};

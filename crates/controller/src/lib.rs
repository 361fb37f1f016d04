//! Taskloom controller: maps a requested mode and settings to a concrete
//! [`Agent`](taskloom_agent::Agent) or [`Flow`](taskloom_flow::Flow).
//!
//! Everything shared (provider, extra tools, event bus, role profiles) is
//! passed in a [`ControllerContext`].

pub mod context;
pub mod controller;
pub mod mode;

pub use context::{ControllerContext, RoleProfile, default_role_profiles};
pub use controller::{Controller, ControllerError, Report, Runnable, agent_config, tool_options};
pub use mode::Mode;

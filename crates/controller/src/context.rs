//! Everything the controller needs from its caller, passed explicitly.

use std::collections::BTreeMap;
use std::sync::Arc;
use taskloom_agent::CancellationToken;
use taskloom_config::Settings;
use taskloom_core::{EventBus, Provider, Tool};

use crate::mode::Mode;

/// How a flow role is built: which mode's defaults it starts from and the
/// system prompt that gives it its role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleProfile {
    pub mode: Mode,
    /// `{marker}` is replaced with the flow's accept marker.
    pub prompt: String,
}

impl RoleProfile {
    pub fn new(mode: Mode, prompt: impl Into<String>) -> Self {
        Self {
            mode,
            prompt: prompt.into(),
        }
    }
}

/// Profiles for the default planner → executor → critic flow.
pub fn default_role_profiles() -> BTreeMap<String, RoleProfile> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "planner".to_string(),
        RoleProfile::new(
            Mode::Chat,
            "You are the planner. Break the task into a short numbered plan of concrete steps. \
             If feedback from a reviewer is included, revise the plan to address it. Reply with \
             the plan only.",
        ),
    );
    profiles.insert(
        "executor".to_string(),
        RoleProfile::new(
            Mode::Standard,
            "You are the executor. Carry out the plan you are given using your tools, then call \
             `terminate` with a concise report of what you did and what you found.",
        ),
    );
    profiles.insert(
        "critic".to_string(),
        RoleProfile::new(
            Mode::Chat,
            "You are the critic. Check whether the executor's result fully solves the task. If \
             it does, reply with {marker} on its own line followed by a one-line justification. \
             Otherwise list the specific problems to fix; do not write {marker}.",
        ),
    );
    profiles
}

/// Shared dependencies for every agent the controller builds.
#[derive(Clone)]
pub struct ControllerContext {
    pub provider: Arc<dyn Provider>,
    /// Registered into every agent after the built-ins
    pub extra_tools: Vec<Arc<dyn Tool>>,
    pub event_bus: Option<Arc<EventBus>>,
    pub role_profiles: BTreeMap<String, RoleProfile>,
    /// Layered between mode defaults and per-request settings
    pub base_settings: Settings,
    /// Process-wide shutdown; interrupts retry backoff of every built agent
    pub shutdown: Option<CancellationToken>,
}

impl std::fmt::Debug for ControllerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("provider", &self.provider.name())
            .field(
                "extra_tools",
                &self.extra_tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("event_bus", &self.event_bus.is_some())
            .field("roles", &self.role_profiles.keys().collect::<Vec<_>>())
            .field("base_settings", &self.base_settings)
            .field("shutdown", &self.shutdown.is_some())
            .finish()
    }
}

impl ControllerContext {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            extra_tools: Vec::new(),
            event_bus: None,
            role_profiles: default_role_profiles(),
            base_settings: Settings::new(),
            shutdown: None,
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_role_profile(mut self, role: impl Into<String>, profile: RoleProfile) -> Self {
        self.role_profiles.insert(role.into(), profile);
        self
    }

    pub fn with_base_settings(mut self, settings: Settings) -> Self {
        self.base_settings = settings;
        self
    }

    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }
}

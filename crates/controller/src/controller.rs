//! Mode + settings → a ready-to-run [`Agent`] or [`Flow`].

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskloom_agent::{
    Agent, CancellationToken, DirectAnswerStrategy, RunSummary, StepStrategy, StreamSink,
    Termination, ToolCallStrategy,
};
use taskloom_config::{ConfigError, Settings};
use taskloom_core::{AgentConfig, Provider, ToolChoice};
use taskloom_flow::{Flow, FlowError, FlowMember, FlowSpec, FlowSummary};
use taskloom_providers::RetryProvider;
use taskloom_tools::{ToolOptions, build_registry};
use tracing::{debug, info};

use crate::context::ControllerContext;
use crate::mode::Mode;

const ROLE_PREFIX: &str = "roles.";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("no profile for flow role '{0}'")]
    UnknownRole(String),
}

/// What [`Controller::create`] hands back.
#[derive(Debug)]
pub enum Runnable {
    Agent(Agent),
    Flow(Flow),
}

/// The summary of a finished [`Runnable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Agent(RunSummary),
    Flow(FlowSummary),
}

impl Report {
    pub fn text(&self) -> &str {
        match self {
            Report::Agent(summary) => &summary.text,
            Report::Flow(summary) => &summary.text,
        }
    }

    /// Whether the run finished normally (agent) or converged (flow).
    pub fn is_success(&self) -> bool {
        match self {
            Report::Agent(summary) => summary.termination == Termination::Finished,
            Report::Flow(summary) => summary.converged,
        }
    }
}

impl Runnable {
    pub fn kind(&self) -> &'static str {
        match self {
            Runnable::Agent(_) => "agent",
            Runnable::Flow(_) => "flow",
        }
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        match self {
            Runnable::Agent(agent) => agent.cancel_handle(),
            Runnable::Flow(flow) => flow.cancel_handle(),
        }
    }

    pub async fn execute(&mut self, task: &str, sink: &dyn StreamSink) -> Report {
        match self {
            Runnable::Agent(agent) => Report::Agent(agent.run_streaming(Some(task), sink).await),
            Runnable::Flow(flow) => Report::Flow(flow.execute_streaming(task, sink).await),
        }
    }
}

/// Builds runnables from explicit context; holds no global state.
#[derive(Debug, Clone)]
pub struct Controller {
    context: ControllerContext,
}

impl Controller {
    pub fn new(context: ControllerContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ControllerContext {
        &self.context
    }

    /// `overrides` over the context's base settings over `mode`'s defaults.
    pub fn effective_settings(&self, mode: Mode, overrides: &Settings) -> Settings {
        overrides
            .merged_over(&self.context.base_settings)
            .merged_over(&mode.defaults())
    }

    /// Build the runnable for `mode` (unknown names fall back to standard).
    pub fn create(&self, mode: &str, overrides: &Settings) -> Result<Runnable, ControllerError> {
        self.create_mode(Mode::resolve(mode), overrides)
    }

    pub fn create_mode(
        &self,
        mode: Mode,
        overrides: &Settings,
    ) -> Result<Runnable, ControllerError> {
        info!(mode = %mode, overrides = overrides.len(), "Creating runnable");
        match mode {
            Mode::Flow => self.build_flow(overrides).map(Runnable::Flow),
            _ => {
                let settings = self.effective_settings(mode, overrides);
                self.build_agent(&settings).map(Runnable::Agent)
            }
        }
    }

    fn build_agent(&self, settings: &Settings) -> Result<Agent, ControllerError> {
        let config = agent_config(settings)?;
        let provider = self.provider_for(settings)?;
        let tools = build_registry(&tool_options(settings)?, &self.context.extra_tools);

        let strategy: Box<dyn StepStrategy> =
            match settings.get_str("strategy").as_deref().unwrap_or("tool_call") {
                "tool_call" => Box::new(ToolCallStrategy::new(provider)),
                "direct_answer" => Box::new(DirectAnswerStrategy::new(provider)),
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "strategy".into(),
                        value: other.into(),
                        reason: "expected tool_call or direct_answer".into(),
                    }
                    .into());
                }
            };

        debug!(
            agent = %config.name,
            strategy = strategy.name(),
            tools = ?tools.names(),
            max_steps = config.max_steps,
            "Built agent"
        );

        let mut agent = Agent::with_strategy(config, strategy, tools);
        if let Some(bus) = &self.context.event_bus {
            agent = agent.with_event_bus(Arc::clone(bus));
        }
        Ok(agent)
    }

    fn build_flow(&self, overrides: &Settings) -> Result<Flow, ControllerError> {
        let shared = overrides.merged_over(&self.context.base_settings);
        let flow_settings = shared.merged_over(&Mode::Flow.defaults());

        let roles = flow_settings.get_list("flow.roles").unwrap_or_default();
        let accept_marker = flow_settings
            .get_str("flow.accept_marker")
            .unwrap_or_else(|| taskloom_flow::DEFAULT_ACCEPT_MARKER.to_string());

        let mut members = Vec::with_capacity(roles.len());
        for role in &roles {
            let profile = self
                .context
                .role_profiles
                .get(role)
                .ok_or_else(|| ControllerError::UnknownRole(role.clone()))?;

            let prompt = profile.prompt.replace("{marker}", &accept_marker);
            let role_layer = Settings::new()
                .with("name", role.as_str())
                .with("system_prompt", prompt);
            let settings = role_overrides(&shared, role)
                .merged_over(&role_layer)
                .merged_over(&shared)
                .merged_over(&profile.mode.defaults());

            members.push(FlowMember::new(role.clone(), self.build_agent(&settings)?));
        }

        let mut spec = FlowSpec::new(members).with_accept_marker(accept_marker);
        if let Some(max_iterations) = flow_settings.get_u32("flow.max_iterations")? {
            spec = spec.with_max_iterations(max_iterations);
        }
        if let Some(terminal) = flow_settings.get_str("flow.terminal_role") {
            spec = spec.with_terminal_role(terminal);
        }
        Ok(Flow::new(spec)?)
    }

    fn provider_for(&self, settings: &Settings) -> Result<Arc<dyn Provider>, ConfigError> {
        let max_retries = settings.get_u32("max_retries")?;
        if max_retries == Some(0) {
            return Ok(Arc::clone(&self.context.provider));
        }

        let mut retry = RetryProvider::new(Arc::clone(&self.context.provider));
        if let Some(n) = max_retries {
            retry = retry.with_max_retries(n);
        }
        if let Some(ms) = settings.get_u64("retry_base_delay_ms")? {
            retry = retry.with_base_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = settings.get_u64("retry_max_delay_ms")? {
            retry = retry.with_max_delay(Duration::from_millis(ms));
        }
        if let Some(token) = &self.context.shutdown {
            retry = retry.with_cancel_token(token.clone());
        }
        Ok(Arc::new(retry))
    }
}

/// Keys under `roles.<role>.` with the prefix removed.
fn role_overrides(settings: &Settings, role: &str) -> Settings {
    let prefix = format!("{ROLE_PREFIX}{role}.");
    settings
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(&prefix)
                .map(|k| (k.to_string(), value.clone()))
        })
        .collect()
}

/// Build and validate an [`AgentConfig`] from flat settings.
///
/// Missing keys keep the [`AgentConfig::default`] values.
pub fn agent_config(settings: &Settings) -> Result<AgentConfig, ConfigError> {
    let mut config = AgentConfig::default();

    if let Some(name) = settings.get_str("name") {
        config.name = name;
    }
    if let Some(model) = settings.get_str("model") {
        config.model = model;
    }
    if let Some(temperature) = settings.get_f32("temperature")? {
        config.temperature = temperature;
    }
    if let Some(max_tokens) = settings.get_u32("max_tokens")? {
        config.max_tokens = Some(max_tokens);
    }
    if let Some(max_steps) = settings.get_u32("max_steps")? {
        config.max_steps = max_steps;
    }
    if let Some(threshold) = settings.get_usize("duplicate_threshold")? {
        config.duplicate_threshold = threshold;
    }
    if let Some(window) = settings.get_usize("stuck_window")? {
        config.stuck_window = window;
    }
    if let Some(nudges) = settings.get_u32("max_nudges")? {
        config.max_nudges = nudges;
    }
    if let Some(max_observe) = settings.get_usize("max_observe")? {
        config.max_observe = Some(max_observe);
    }
    if let Some(choice) = settings.get_parsed::<ToolChoice>("tool_choice")? {
        config.tool_choice = choice;
    }
    if let Some(finish) = settings.get_bool("finish_on_answer")? {
        config.finish_on_answer = finish;
    }
    if let Some(special) = settings.get_list("special_tools") {
        config.special_tools = special;
    }
    if let Some(prompt) = settings.get_str("system_prompt") {
        config.system_prompt = Some(prompt);
    }
    if let Some(prompt) = settings.get_str("next_step_prompt") {
        config.next_step_prompt = Some(prompt);
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AgentConfig) -> Result<(), ConfigError> {
    if config.model.trim().is_empty() {
        return Err(ConfigError::ValidationError("model must not be empty".into()));
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::InvalidValue {
            key: "temperature".into(),
            value: config.temperature.to_string(),
            reason: "must be between 0.0 and 2.0".into(),
        });
    }
    if config.max_steps == 0 {
        return Err(ConfigError::InvalidValue {
            key: "max_steps".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }
    if config.duplicate_threshold == 0 || config.duplicate_threshold >= config.stuck_window {
        return Err(ConfigError::ValidationError(format!(
            "duplicate_threshold ({}) must be at least 1 and below stuck_window ({})",
            config.duplicate_threshold, config.stuck_window
        )));
    }
    Ok(())
}

/// Which built-in tools the settings enable.
pub fn tool_options(settings: &Settings) -> Result<ToolOptions, ConfigError> {
    Ok(ToolOptions {
        shell: settings.get_bool("tools.shell")?.unwrap_or(false),
        file_read: settings.get_bool("tools.file_read")?.unwrap_or(false),
        workspace: settings.get_str("workspace").map(PathBuf::from),
        dispatch_timeout: settings
            .get_u64("tool_timeout_secs")?
            .map(Duration::from_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RoleProfile;
    use async_trait::async_trait;
    use serde_json::json;
    use taskloom_agent::CollectingSink;
    use taskloom_agent::test_helpers::{ScriptedProvider, call, text};
    use taskloom_core::error::{ProviderError, ToolError};
    use taskloom_core::provider::ProviderResponse;
    use taskloom_core::tool::{Tool, ToolOutput};
    use taskloom_core::AgentState;

    fn terminate(message: &str) -> ProviderResponse {
        call("terminate", json!({"status": "success", "message": message}))
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input"
        }

        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn invoke(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(arguments["text"].as_str().unwrap_or("")))
        }
    }

    fn controller(script: Vec<ProviderResponse>) -> Controller {
        Controller::new(ControllerContext::new(Arc::new(ScriptedProvider::new(script))))
    }

    fn agent(runnable: Runnable) -> Agent {
        match runnable {
            Runnable::Agent(agent) => agent,
            Runnable::Flow(_) => panic!("expected an agent"),
        }
    }

    fn flow(runnable: Runnable) -> Flow {
        match runnable {
            Runnable::Flow(flow) => flow,
            Runnable::Agent(_) => panic!("expected a flow"),
        }
    }

    #[test]
    fn creation_is_deterministic() {
        let controller = controller(vec![text("hi")]);
        let settings = Settings::new().with("max_steps", 7u32).with("tools.shell", true);

        let a = agent(controller.create("coder", &settings).unwrap());
        let b = agent(controller.create("coder", &settings).unwrap());

        assert_eq!(a.config(), b.config());
        assert_eq!(a.tools().names(), b.tools().names());
        assert_eq!(a.strategy_name(), b.strategy_name());
    }

    #[test]
    fn unknown_mode_falls_back_to_standard() {
        let controller = controller(vec![text("hi")]);
        let fallback = agent(controller.create("wizard", &Settings::new()).unwrap());
        let standard = agent(controller.create("standard", &Settings::new()).unwrap());
        assert_eq!(fallback.config(), standard.config());
    }

    #[test]
    fn overrides_win_over_mode_defaults() {
        let controller = controller(vec![text("hi")]);
        let settings = Settings::new()
            .with("max_steps", 3u32)
            .with("tool_choice", "required")
            .with("name", "scout");

        let agent = agent(controller.create("standard", &settings).unwrap());
        assert_eq!(agent.config().max_steps, 3);
        assert_eq!(agent.config().tool_choice, ToolChoice::Required);
        assert_eq!(agent.name(), "scout");
        assert!(agent.config().next_step_prompt.is_some());
    }

    #[test]
    fn base_settings_sit_between_defaults_and_overrides() {
        let context = ControllerContext::new(Arc::new(ScriptedProvider::new(vec![text("hi")])))
            .with_base_settings(
                Settings::new()
                    .with("model", "base-model")
                    .with("max_steps", 9u32),
            );
        let controller = Controller::new(context);

        let agent = agent(
            controller
                .create("chat", &Settings::new().with("max_steps", 2u32))
                .unwrap(),
        );
        assert_eq!(agent.config().model, "base-model");
        assert_eq!(agent.config().max_steps, 2);
    }

    #[test]
    fn mode_tool_sets() {
        let controller = controller(vec![text("hi")]);
        let chat = agent(controller.create("chat", &Settings::new()).unwrap());
        assert_eq!(chat.tools().names(), vec!["terminate"]);
        assert!(chat.config().finish_on_answer);

        let coder = agent(controller.create("coder", &Settings::new()).unwrap());
        assert_eq!(coder.tools().names(), vec!["file_read", "shell", "terminate"]);

        let no_shell = agent(
            controller
                .create("coder", &Settings::new().with("tools.shell", false))
                .unwrap(),
        );
        assert_eq!(no_shell.tools().names(), vec!["file_read", "terminate"]);
    }

    #[test]
    fn extra_tools_reach_every_agent() {
        let context = ControllerContext::new(Arc::new(ScriptedProvider::new(vec![text("hi")])))
            .with_tool(Arc::new(EchoTool));
        let controller = Controller::new(context);

        let single = agent(controller.create("standard", &Settings::new()).unwrap());
        assert!(single.tools().contains("echo"));

        let flow = flow(controller.create("flow", &Settings::new()).unwrap());
        for member in flow.members() {
            assert!(member.agent.tools().contains("echo"), "{}", member.role);
        }
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let controller = controller(vec![text("hi")]);
        let cases = [
            Settings::new().with("max_steps", "ten"),
            Settings::new().with("max_steps", 0u32),
            Settings::new().with("temperature", 3.5),
            Settings::new().with("tool_choice", "sometimes"),
            Settings::new().with("finish_on_answer", "maybe"),
            Settings::new().with("strategy", "telepathy"),
            Settings::new().with("duplicate_threshold", 4u32),
        ];
        for settings in cases {
            let err = controller.create("standard", &settings).unwrap_err();
            assert!(matches!(err, ControllerError::Config(_)), "{settings:?}: {err}");
        }
    }

    #[test]
    fn direct_answer_strategy_selectable() {
        let controller = controller(vec![text("hi")]);
        let agent = agent(
            controller
                .create("chat", &Settings::new().with("strategy", "direct_answer"))
                .unwrap(),
        );
        assert_eq!(agent.strategy_name(), "direct_answer");
    }

    #[test]
    fn flow_built_from_roles() {
        let controller = controller(vec![text("hi")]);
        let settings = Settings::new()
            .with("flow.max_iterations", 2u32)
            .with("flow.accept_marker", "LGTM")
            .with("roles.executor.max_steps", 4u32);

        let flow = flow(controller.create("flow", &settings).unwrap());
        assert_eq!(flow.roles(), vec!["planner", "executor", "critic"]);
        assert_eq!(flow.max_iterations(), 2);
        assert_eq!(flow.terminal_role(), "critic");
        assert_eq!(flow.accept_marker(), "LGTM");

        let executor = flow.member("executor").unwrap();
        assert_eq!(executor.config().max_steps, 4);
        assert_eq!(executor.name(), "executor");

        let critic = flow.member("critic").unwrap();
        let prompt = critic.config().system_prompt.as_deref().unwrap();
        assert!(prompt.contains("LGTM"));
        assert!(!prompt.contains("{marker}"));
        assert!(critic.config().finish_on_answer);
    }

    #[test]
    fn custom_roles_and_profiles() {
        let context = ControllerContext::new(Arc::new(ScriptedProvider::new(vec![text("hi")])))
            .with_role_profile("reviewer", RoleProfile::new(Mode::Chat, "Review. Say {marker}."));
        let controller = Controller::new(context);

        let flow = flow(
            controller
                .create(
                    "flow",
                    &Settings::new()
                        .with("flow.roles", "executor,reviewer")
                        .with("flow.terminal_role", "reviewer"),
                )
                .unwrap(),
        );
        assert_eq!(flow.roles(), vec!["executor", "reviewer"]);
        assert_eq!(flow.terminal_role(), "reviewer");
    }

    #[test]
    fn unknown_role_is_an_error() {
        let controller = controller(vec![text("hi")]);
        let err = controller
            .create("flow", &Settings::new().with("flow.roles", "planner,oracle"))
            .unwrap_err();
        assert!(matches!(err, ControllerError::UnknownRole(role) if role == "oracle"));
    }

    #[test]
    fn bad_flow_shape_is_a_flow_error() {
        let controller = controller(vec![text("hi")]);
        let err = controller
            .create("flow", &Settings::new().with("flow.max_iterations", 0u32))
            .unwrap_err();
        assert!(matches!(err, ControllerError::Flow(FlowError::ZeroIterations)));
    }

    #[tokio::test]
    async fn chat_runnable_executes() {
        let controller = controller(vec![text("Paris.")]);
        let mut runnable = controller.create("chat", &Settings::new()).unwrap();
        let sink = CollectingSink::new();

        let report = runnable.execute("Capital of France?", &sink).await;
        assert!(report.is_success());
        assert!(matches!(&report, Report::Agent(s) if s.final_output.as_deref() == Some("Paris.")));
        assert!(!sink.events().is_empty());

        let Runnable::Agent(agent) = runnable else {
            panic!("expected an agent");
        };
        assert_eq!(agent.state(), AgentState::Finished);
    }

    #[tokio::test]
    async fn shutdown_interrupts_retry_backoff() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Network(
            "connection reset".into(),
        )));
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let context = ControllerContext::new(provider.clone()).with_shutdown_token(shutdown);
        let mut runnable = Controller::new(context)
            .create("chat", &Settings::new().with("retry_base_delay_ms", 60_000u32))
            .unwrap();

        let report = runnable.execute("hello", &CollectingSink::new()).await;

        assert!(!report.is_success());
        assert!(report.text().contains("connection reset"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn standard_runnable_terminates() {
        let controller = controller(vec![terminate("all done")]);
        let mut runnable = controller
            .create("standard", &Settings::new().with("max_retries", 0u32))
            .unwrap();

        let report = runnable.execute("do it", &CollectingSink::new()).await;
        assert!(report.is_success());
        assert!(report.text().contains("all done"));
    }
}

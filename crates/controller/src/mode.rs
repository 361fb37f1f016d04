//! Execution modes and their default settings.

use serde::{Deserialize, Serialize};
use taskloom_config::Settings;
use tracing::warn;

const STANDARD_PROMPT: &str = "You are Taskloom, an autonomous agent that completes the user's \
task step by step using the tools available to you. Think about what is needed, act with one \
tool at a time when possible, and read each observation before deciding the next action.";

const STANDARD_NEXT_STEP: &str = "Based on the progress so far, choose the most useful next \
action. When the task is complete, or cannot be completed, call `terminate` with a short final \
answer as the message.";

const CHAT_PROMPT: &str = "You are Taskloom, a concise and accurate assistant. Answer the user \
directly.";

const CODER_PROMPT: &str = "You are Taskloom, a careful software engineer working inside a \
workspace directory. Inspect files with `file_read` and run commands with `shell` before \
drawing conclusions. Prefer small, verifiable steps.";

/// What kind of runnable a request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Tool-calling agent that ends when it calls `terminate`
    Standard,
    /// Finishes on its first answer; only `terminate` is offered
    Chat,
    /// Standard plus `shell` and `file_read`
    Coder,
    /// Planner → executor → critic
    Flow,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Standard, Mode::Chat, Mode::Coder, Mode::Flow];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Standard => "standard",
            Mode::Chat => "chat",
            Mode::Coder => "coder",
            Mode::Flow => "flow",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mode::Standard => "tool-calling agent that finishes by calling `terminate`",
            Mode::Chat => "answers directly and finishes on its first reply",
            Mode::Coder => "standard agent with `shell` and `file_read` in the workspace",
            Mode::Flow => "planner, executor and critic iterating until the critic accepts",
        }
    }

    /// Parse a mode name, falling back to [`Mode::Standard`] with a warning.
    pub fn resolve(name: &str) -> Mode {
        name.parse().unwrap_or_else(|_| {
            warn!(mode = %name, "Unknown mode, falling back to standard");
            Mode::Standard
        })
    }

    /// Defaults that supplied settings are merged over.
    pub fn defaults(self) -> Settings {
        let base = Settings::new()
            .with("max_steps", 20u32)
            .with("tool_choice", "auto")
            .with("finish_on_answer", false)
            .with("tools.shell", false)
            .with("tools.file_read", false)
            .with("strategy", "tool_call");

        match self {
            Mode::Standard => base
                .with("system_prompt", STANDARD_PROMPT)
                .with("next_step_prompt", STANDARD_NEXT_STEP),
            Mode::Chat => base
                .with("max_steps", 5u32)
                .with("finish_on_answer", true)
                .with("system_prompt", CHAT_PROMPT),
            Mode::Coder => base
                .with("max_steps", 30u32)
                .with("tools.shell", true)
                .with("tools.file_read", true)
                .with("system_prompt", CODER_PROMPT)
                .with("next_step_prompt", STANDARD_NEXT_STEP),
            Mode::Flow => base
                .with("flow.roles", "planner,executor,critic")
                .with("flow.max_iterations", 3u32)
                .with("flow.accept_marker", "ACCEPT"),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| format!("unknown mode '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_modes() {
        assert_eq!("Coder".parse::<Mode>().unwrap(), Mode::Coder);
        assert_eq!(Mode::resolve("flow"), Mode::Flow);
    }

    #[test]
    fn unknown_mode_falls_back() {
        assert_eq!(Mode::resolve("wizard"), Mode::Standard);
    }

    #[test]
    fn coder_enables_tools() {
        let defaults = Mode::Coder.defaults();
        assert_eq!(defaults.get_bool("tools.shell").unwrap(), Some(true));
        assert_eq!(defaults.get_bool("tools.file_read").unwrap(), Some(true));
    }

    #[test]
    fn chat_finishes_on_answer() {
        let defaults = Mode::Chat.defaults();
        assert_eq!(defaults.get_bool("finish_on_answer").unwrap(), Some(true));
        assert_eq!(defaults.get_u32("max_steps").unwrap(), Some(5));
    }
}

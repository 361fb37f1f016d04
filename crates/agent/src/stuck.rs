//! Detection of an agent repeating itself.
//!
//! Only assistant messages appended since the last nudge (or run start)
//! are considered, and only the most recent `window` of them.

use taskloom_core::{AgentConfig, Message, Role};

/// The system message injected when a run looks stuck.
pub const NUDGE_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid \
repeating ineffective paths already attempted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckDetector {
    duplicate_threshold: usize,
    window: usize,
}

impl StuckDetector {
    pub fn new(duplicate_threshold: usize, window: usize) -> Self {
        Self {
            duplicate_threshold,
            window,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.duplicate_threshold, config.stuck_window)
    }

    /// Whether the latest assistant message in `recent` repeats at least
    /// `duplicate_threshold` earlier ones inside the window.
    pub fn is_stuck(&self, recent: &[Message]) -> bool {
        if self.duplicate_threshold == 0 || self.window == 0 {
            return false;
        }

        let mut prints: Vec<String> = recent
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .filter_map(fingerprint)
            .take(self.window)
            .collect();

        let Some(latest) = prints.first().cloned() else {
            return false;
        };
        prints.remove(0);

        let repeats = prints.iter().filter(|p| **p == latest).count();
        repeats >= self.duplicate_threshold
    }
}

/// Normalized content plus tool calls; `None` for an empty message.
fn fingerprint(message: &Message) -> Option<String> {
    let content = message
        .content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if content.is_empty() && message.tool_calls.is_empty() {
        return None;
    }

    let mut print = content;
    for call in &message.tool_calls {
        // serde_json maps are key-sorted, so this is canonical.
        print.push_str(&format!("\u{1f}{}({})", call.tool_name, call.arguments));
    }
    Some(print)
}

//! Built-in capabilities for Taskloom agents.
//!
//! `terminate` is always available; it is how an agent ends a run.
//! `shell` and `file_read` are opt-in and scoped to a workspace directory.

pub mod file_read;
pub mod shell;
pub mod terminate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskloom_core::tool::{Tool, ToolRegistry};

pub use file_read::FileReadTool;
pub use shell::ShellTool;
pub use terminate::{TERMINATE_TOOL_NAME, TerminateTool};

/// Which built-in tools an agent gets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOptions {
    pub shell: bool,
    pub file_read: bool,
    /// Working directory for `shell` and root for `file_read` (defaults to cwd)
    pub workspace: Option<PathBuf>,
    /// Per-dispatch timeout applied by the registry
    pub dispatch_timeout: Option<Duration>,
}

/// Build a fresh registry with `terminate`, the enabled built-ins, and `extra`.
///
/// Extra tools are registered last, so a caller can replace a built-in by name.
pub fn build_registry(options: &ToolOptions, extra: &[Arc<dyn Tool>]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    if let Some(timeout) = options.dispatch_timeout {
        registry = registry.with_dispatch_timeout(timeout);
    }

    registry.register(Arc::new(TerminateTool));

    let workspace = options
        .workspace
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    if options.shell {
        registry.register(Arc::new(
            ShellTool::with_default_allowlist().with_workdir(workspace.clone()),
        ));
    }
    if options.file_read {
        registry.register(Arc::new(FileReadTool::new(workspace)));
    }

    for tool in extra {
        registry.register(Arc::clone(tool));
    }
    registry
}

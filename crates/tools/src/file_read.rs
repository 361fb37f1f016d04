//! File read tool: read file contents inside a workspace root.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Tool, ToolOutput};

#[derive(Debug, Clone)]
pub struct FileReadTool {
    /// Relative paths resolve against this directory; nothing outside it is readable.
    root: PathBuf,
    max_bytes: usize,
}

impl FileReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: 256 * 1024,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let denied = |reason: String| ToolError::PermissionDenied {
            tool_name: "file_read".into(),
            reason,
        };

        let requested = Path::new(path);
        if requested.components().any(|c| c == Component::ParentDir) {
            return Err(denied(format!("path traversal in '{path}'")));
        }

        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };

        // Symlinks could still point elsewhere.
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let resolved = joined.canonicalize().unwrap_or(joined);
        if !resolved.starts_with(&root) {
            return Err(denied(format!(
                "'{path}' is outside the workspace {}",
                root.display()
            )));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: "file_read".into(),
                reason: "Missing 'path' argument".into(),
            })?;

        let resolved = self.resolve(path)?;

        match tokio::fs::read(&resolved).await {
            Ok(bytes) => {
                let truncated = bytes.len() > self.max_bytes;
                let mut content =
                    String::from_utf8_lossy(&bytes[..bytes.len().min(self.max_bytes)]).into_owned();
                if truncated {
                    content.push_str(&format!("\n[truncated at {} bytes]", self.max_bytes));
                }
                Ok(ToolOutput::success(content))
            }
            Err(e) => Ok(ToolOutput::failure(format!("Failed to read file: {e}"))),
        }
    }
}

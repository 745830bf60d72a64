use crate::agent::tools::base::{
    ExecutionContext, Tool, ToolPermission, ToolResult, require_str_arg,
};
use crate::config::SecurityMode;
use crate::errors::NeoclawError;
use crate::utils::lexical_normalize;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Maximum bytes `read_file` returns inline; larger files are truncated.
const MAX_READ_BYTES: usize = 50 * 1024;

/// Resolve a tool-supplied path against the workspace. Relative paths land
/// under the workspace root; absolute paths pass through.
fn resolve_path(workspace: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Verify a write target stays inside the workspace after `..` normalization
/// and symlink resolution. The deepest existing ancestor is canonicalized so a
/// symlinked parent cannot smuggle the write outside.
fn check_write_confinement(workspace: &Path, target: &Path) -> Result<(), NeoclawError> {
    let workspace = workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf());
    let normalized = lexical_normalize(target);

    let mut existing = normalized.clone();
    let mut remainder = Vec::new();
    while !existing.exists() {
        let Some(name) = existing.file_name() else {
            break;
        };
        remainder.push(name.to_os_string());
        existing = existing
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
    }
    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for name in remainder.iter().rev() {
        resolved.push(name);
    }

    if resolved == workspace || resolved.starts_with(&workspace) {
        Ok(())
    } else {
        Err(NeoclawError::denied(format!(
            "path '{}' is outside the workspace",
            target.display()
        )))
    }
}

pub struct ReadFileTool {
    workspace: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Relative paths resolve inside the workspace."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let raw = require_str_arg(&params, "path")?;
        let path = resolve_path(&self.workspace, raw);

        let bytes = std::fs::read(&path).map_err(|e| NeoclawError::io(path.display(), e))?;

        // Binary sniff on the first inline-limit + 1 bytes: NUL bytes or
        // invalid UTF-8 mean there is no useful text to hand the model.
        let probe = &bytes[..bytes.len().min(MAX_READ_BYTES + 1)];
        if probe.contains(&0) {
            anyhow::bail!("file '{}' appears to be binary", raw);
        }
        if let Err(e) = std::str::from_utf8(probe) {
            // An incomplete trailing character at the probe edge is fine;
            // anything else is not text.
            let cut_mid_char = e.error_len().is_none() && probe.len() == MAX_READ_BYTES + 1;
            if !cut_mid_char {
                anyhow::bail!("file '{}' appears to be binary", raw);
            }
        }

        if bytes.len() > MAX_READ_BYTES {
            let head = &bytes[..MAX_READ_BYTES];
            let text = match std::str::from_utf8(head) {
                Ok(s) => s,
                // Back off to the last character boundary inside the limit.
                Err(e) => std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default(),
            };
            return Ok(ToolResult::truncated(text, None));
        }

        let text = String::from_utf8(bytes)
            .map_err(|_| anyhow::anyhow!("file '{}' appears to be binary", raw))?;
        Ok(ToolResult::new(text))
    }
}

pub struct ListDirTool {
    workspace: PathBuf,
}

impl ListDirTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, one name per line."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory path to list"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let raw = require_str_arg(&params, "path")?;
        let path = resolve_path(&self.workspace, raw);

        let mut entries: Vec<String> = std::fs::read_dir(&path)
            .map_err(|e| NeoclawError::io(path.display(), e))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        entries.sort();
        Ok(ToolResult::new(entries.join("\n")))
    }
}

pub struct WriteFileTool {
    workspace: PathBuf,
    mode: SecurityMode,
}

impl WriteFileTool {
    pub fn new(workspace: PathBuf, mode: SecurityMode) -> Self {
        Self { workspace, mode }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file under the workspace. Creates parent directories if needed."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn permission(&self) -> ToolPermission {
        ToolPermission::RequiresApproval
    }

    fn summarize_args(&self, params: &Value) -> Option<String> {
        let path = params.get("path").and_then(Value::as_str)?;
        let bytes = params
            .get("content")
            .and_then(Value::as_str)
            .map_or(0, str::len);
        Some(format!("write_file: path=\"{}\" ({} bytes)", path, bytes))
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let raw = require_str_arg(&params, "path")?;
        let content = params
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NeoclawError::InvalidArgs("missing string argument 'content'".to_string())
            })?;

        let path = resolve_path(&self.workspace, raw);
        if !self.mode.is_danger() {
            check_write_confinement(&self.workspace, &path)?;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| NeoclawError::io(parent.display(), e))?;
        }
        std::fs::write(&path, content).map_err(|e| NeoclawError::io(path.display(), e))?;
        Ok(ToolResult::new(format!(
            "wrote {} bytes to {}",
            content.len(),
            raw
        )))
    }
}

#[cfg(test)]
mod tests;

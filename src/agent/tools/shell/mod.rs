use crate::agent::tools::base::{
    ExecutionContext, Tool, ToolPermission, ToolResult, optional_str_arg, require_str_arg,
};
use crate::errors::NeoclawError;
use crate::utils::{lexical_normalize, truncate_chars};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

/// Exit code reported when the subprocess hits its timeout (mirrors the
/// `timeout(1)` convention).
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Shell command execution, confined to the workspace and subject to the
/// approval engine's command-policy flow.
pub struct RunCommandTool {
    workspace: PathBuf,
    timeout_secs: u64,
    inline_output_limit: usize,
    /// `host:port` of the local domain proxy, exported to the child via
    /// `HTTP_PROXY`/`HTTPS_PROXY` so subprocess traffic passes the same gate
    /// as in-process HTTP.
    proxy_addr: Option<String>,
}

impl RunCommandTool {
    pub fn new(
        workspace: PathBuf,
        timeout_secs: u64,
        inline_output_limit: usize,
        proxy_addr: Option<String>,
    ) -> Self {
        Self {
            workspace,
            timeout_secs,
            inline_output_limit,
            proxy_addr,
        }
    }

    /// Resolve the optional `workdir` argument to the workspace itself or one
    /// of its sub-paths.
    fn resolve_workdir(&self, workdir: Option<&str>) -> Result<PathBuf, NeoclawError> {
        let Some(raw) = workdir else {
            return Ok(self.workspace.clone());
        };
        let candidate = if Path::new(raw).is_absolute() {
            PathBuf::from(raw)
        } else {
            self.workspace.join(raw)
        };
        let workspace = self
            .workspace
            .canonicalize()
            .unwrap_or_else(|_| self.workspace.clone());
        let resolved = candidate
            .canonicalize()
            .unwrap_or_else(|_| lexical_normalize(&candidate));
        if resolved != workspace && !resolved.starts_with(&workspace) {
            return Err(NeoclawError::denied(format!(
                "workdir '{}' is outside the workspace",
                raw
            )));
        }
        if !resolved.is_dir() {
            return Err(NeoclawError::InvalidArgs(format!(
                "workdir '{}' is not a directory",
                raw
            )));
        }
        Ok(resolved)
    }

    fn render_output(&self, combined: String, exit_code: i32) -> ToolResult {
        let mut output = combined;
        if exit_code != 0 {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&format!("[exit code: {}]", exit_code));
        }
        if output.is_empty() {
            output = "(no output)".to_string();
        }

        if output.chars().count() <= self.inline_output_limit {
            return ToolResult::new(output);
        }

        // Spill the full output to a temp file the model can read back in
        // slices via read_file/run_command.
        let full_output_path = tempfile::Builder::new()
            .prefix("neoclaw-run-")
            .suffix(".txt")
            .tempfile()
            .and_then(|f| f.keep().map_err(|e| e.error))
            .and_then(|(mut file, path)| {
                use std::io::Write;
                file.write_all(output.as_bytes()).map(|()| path)
            })
            .map_err(|e| warn!("failed to spill full command output: {}", e))
            .ok();

        let mut inline = truncate_chars(&output, self.inline_output_limit, "");
        match &full_output_path {
            Some(path) => inline.push_str(&format!(
                "\n[output truncated; full output: {}]",
                path.display()
            )),
            None => inline.push_str("\n[output truncated]"),
        }
        ToolResult::truncated(inline, full_output_path)
    }
}

/// Kill an entire process group. The child is spawned with its own group so
/// this takes descendants down with it.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: plain syscall; a stale pid at worst signals a finished group.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return its combined output."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "workdir": {
                    "type": "string",
                    "description": "Optional working directory, relative to the workspace"
                }
            },
            "required": ["command"]
        })
    }

    fn permission(&self) -> ToolPermission {
        ToolPermission::RequiresApproval
    }

    fn summarize_args(&self, params: &Value) -> Option<String> {
        params
            .get("command")
            .and_then(Value::as_str)
            .map(|c| format!("run_command: {}", c))
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let command = require_str_arg(&params, "command")?;
        let workdir = self.resolve_workdir(optional_str_arg(&params, "workdir")?)?;

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-lc")
            .arg(command)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(proxy) = &self.proxy_addr {
            let url = format!("http://{}", proxy);
            cmd.env("HTTP_PROXY", &url).env("HTTPS_PROXY", &url);
        }

        debug!("running command in {}: {}", workdir.display(), command);
        let child = cmd
            .spawn()
            .map_err(|e| NeoclawError::io(format!("sh -lc {}", command), e))?;
        let pid = child.id();

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let output = tokio::select! {
            () = ctx.cancel.cancelled() => {
                kill_process_group(pid);
                return Err(NeoclawError::Canceled.into());
            }
            result = tokio::time::timeout(Duration::from_secs(self.timeout_secs), &mut wait) => {
                match result {
                    Ok(output) => output.map_err(|e| NeoclawError::io(command, e))?,
                    Err(_) => {
                        kill_process_group(pid);
                        warn!("command timed out after {}s: {}", self.timeout_secs, command);
                        return Ok(self.render_output(
                            format!("command timed out after {} seconds", self.timeout_secs),
                            TIMEOUT_EXIT_CODE,
                        ));
                    }
                }
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        let exit_code = output.status.code().unwrap_or(-1);
        Ok(self.render_output(combined, exit_code))
    }
}

#[cfg(test)]
mod tests;

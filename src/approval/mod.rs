use crate::agent::tools::base::{ExecutionContext, Tool, ToolPermission, ToolResult};
use crate::config::SecurityMode;
use crate::errors::NeoclawError;
use crate::policy::pattern::{self, CommandVerdict};
use crate::policy::store::PolicyStore;
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pseudo tool id used for outbound-domain prompts. Never registered in the
/// tool registry and never echoed by the terminal approver.
pub const DOMAIN_TOOL_ID: &str = "network_domain";

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tool_name: String,
    pub description: String,
    pub args: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Denied,
}

/// Interactive source of allow/deny decisions. Prompt errors (e.g. EOF on
/// stdin) propagate to the caller rather than counting as a denial.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn request_approval(&self, req: ApprovalRequest) -> anyhow::Result<ApprovalDecision>;
}

/// Reads one line from stdin per decision. A trimmed, case-insensitive `y`
/// approves; anything else denies.
pub struct TerminalApprover;

#[async_trait]
impl Approver for TerminalApprover {
    async fn request_approval(&self, req: ApprovalRequest) -> anyhow::Result<ApprovalDecision> {
        let prompt = if req.tool_name == DOMAIN_TOOL_ID {
            format!("{} [y/N]: ", req.description)
        } else {
            format!("approve tool {}? [y/N]: ", req.tool_name)
        };
        // Stdin reads are blocking; keep them off the reactor.
        let line = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let mut stdout = std::io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line)?;
            if read == 0 {
                anyhow::bail!("stdin closed while waiting for approval");
            }
            Ok(line)
        })
        .await??;

        if line.trim().eq_ignore_ascii_case("y") {
            Ok(ApprovalDecision::Approved)
        } else {
            Ok(ApprovalDecision::Denied)
        }
    }
}

fn from_tool_error(e: anyhow::Error) -> NeoclawError {
    match e.downcast::<NeoclawError>() {
        Ok(ne) => ne,
        Err(e) => NeoclawError::Internal(e),
    }
}

/// The single interposition point between a tool call and its execution.
///
/// Every tool invocation flows through [`ApprovalEngine::execute_tool`], which
/// classifies it as auto / conditional / required, consults the command
/// policy, drives the approver, and persists decisions. After a `run_command`
/// finishes it re-flushes the policy files so on-disk state always equals the
/// pre-execution cache.
pub struct ApprovalEngine {
    store: Arc<PolicyStore>,
    command_policy_path: PathBuf,
    mode: SecurityMode,
}

impl ApprovalEngine {
    pub fn new(store: Arc<PolicyStore>, command_policy_path: PathBuf, mode: SecurityMode) -> Self {
        Self {
            store,
            command_policy_path,
            mode,
        }
    }

    pub fn store(&self) -> Arc<PolicyStore> {
        self.store.clone()
    }

    pub async fn execute_tool(
        &self,
        ctx: &ExecutionContext,
        approver: Option<&dyn Approver>,
        tool: &dyn Tool,
        args: &Value,
        description: &str,
    ) -> Result<ToolResult, NeoclawError> {
        if self.mode.is_danger() {
            return tool.execute(args.clone(), ctx).await.map_err(from_tool_error);
        }

        let mut permission = tool.permission();
        if tool.name() == "run_command" && permission == ToolPermission::RequiresApproval {
            permission = self.resolve_run_command_permission(approver, args).await?;
        }

        if permission == ToolPermission::RequiresApproval {
            let Some(approver) = approver else {
                return Err(NeoclawError::ApprovalRequired(format!(
                    "tool '{}' requires approval but no approver is configured",
                    tool.name()
                )));
            };
            let decision = approver
                .request_approval(ApprovalRequest {
                    tool_name: tool.name().to_string(),
                    description: description.to_string(),
                    args: args.clone(),
                })
                .await
                .map_err(NeoclawError::Internal)?;
            if decision == ApprovalDecision::Denied {
                return Err(NeoclawError::denied(format!(
                    "approval denied for tool '{}'",
                    tool.name()
                )));
            }
            debug!("tool '{}' approved: {}", tool.name(), description);
        }

        let result = tool.execute(args.clone(), ctx).await;

        // The subprocess may have rewritten policy files on disk; restore
        // authority from the in-memory snapshot before reporting anything.
        if tool.name() == "run_command" {
            let flush = self.store.flush_all();
            return match (result, flush) {
                (Ok(r), Ok(())) => Ok(r),
                (Ok(_), Err(fe)) => Err(NeoclawError::Internal(
                    fe.context("policy flush after run_command failed"),
                )),
                (Err(ee), Ok(())) => Err(from_tool_error(ee)),
                (Err(ee), Err(fe)) => Err(NeoclawError::Internal(anyhow!(
                    "{}; additionally the policy flush failed: {}",
                    ee,
                    fe
                ))),
            };
        }

        result.map_err(from_tool_error)
    }

    /// Classify a `run_command` invocation against the command policy,
    /// prompting (and persisting the outcome) when nothing matches.
    async fn resolve_run_command_permission(
        &self,
        approver: Option<&dyn Approver>,
        args: &Value,
    ) -> Result<ToolPermission, NeoclawError> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                NeoclawError::InvalidArgs(
                    "run_command requires a non-empty string argument 'command'".to_string(),
                )
            })?;

        let mut policy = self
            .store
            .load_command_policy(&self.command_policy_path)
            .map_err(NeoclawError::Internal)?;

        match pattern::evaluate(command, &policy.allow, &policy.deny) {
            CommandVerdict::Allowed => Ok(ToolPermission::AutoApprove),
            CommandVerdict::Denied => Err(NeoclawError::denied(format!(
                "command '{}' matches a deny pattern",
                command
            ))),
            CommandVerdict::NoMatch => {
                let Some(approver) = approver else {
                    return Err(NeoclawError::ApprovalRequired(format!(
                        "command '{}' is not allowlisted and no approver is configured",
                        command
                    )));
                };

                let candidate =
                    pattern::generate_pattern(command).unwrap_or_else(|| command.to_string());
                let decision = approver
                    .request_approval(ApprovalRequest {
                        tool_name: "run_command".to_string(),
                        description: format!("Allow Command: {}", candidate),
                        args: args.clone(),
                    })
                    .await
                    .map_err(NeoclawError::Internal)?;

                match decision {
                    ApprovalDecision::Approved => {
                        policy.insert_allow(&candidate);
                        if let Err(e) = self
                            .store
                            .save_command_policy(&self.command_policy_path, &policy)
                        {
                            warn!("failed to persist allow pattern '{}': {}", candidate, e);
                        }
                        Ok(ToolPermission::AutoApprove)
                    }
                    ApprovalDecision::Denied => {
                        policy.insert_deny(&candidate);
                        if let Err(e) = self
                            .store
                            .save_command_policy(&self.command_policy_path, &policy)
                        {
                            warn!("failed to persist deny pattern '{}': {}", candidate, e);
                        }
                        Err(NeoclawError::denied(format!(
                            "command '{}' was denied",
                            command
                        )))
                    }
                }
            }
        }
    }
}

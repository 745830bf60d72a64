use crate::agent::tools::base::{
    ExecutionContext, Tool, ToolResult, json_type_name, require_str_arg,
};
use crate::cron::{JobAction, JobInput, JobScheduler};
use crate::errors::NeoclawError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

fn parse_action(raw: &str) -> Result<JobAction, NeoclawError> {
    match raw {
        "send_message" => Ok(JobAction::SendMessage),
        "run_command" => Ok(JobAction::RunCommand),
        "http_request" => Ok(JobAction::HttpRequest),
        other => Err(NeoclawError::InvalidArgs(format!(
            "unknown job action '{}' (expected send_message, run_command, or http_request)",
            other
        ))),
    }
}

pub struct JobCreateTool {
    scheduler: Arc<JobScheduler>,
    default_channel: String,
}

impl JobCreateTool {
    pub fn new(scheduler: Arc<JobScheduler>, default_channel: String) -> Self {
        Self {
            scheduler,
            default_channel,
        }
    }
}

#[async_trait]
impl Tool for JobCreateTool {
    fn name(&self) -> &str {
        "job_create"
    }

    fn description(&self) -> &str {
        "Schedule a recurring job (five-field cron expression)."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "What the job does"
                },
                "cron_expression": {
                    "type": "string",
                    "description": "Standard five-field cron schedule, e.g. \"0 9 * * 1-5\""
                },
                "action": {
                    "type": "string",
                    "enum": ["send_message", "run_command", "http_request"],
                    "description": "What to do when the job fires"
                },
                "args": {
                    "type": "object",
                    "description": "Arguments for the action (e.g. {\"message\": ...} or {\"command\": ...})"
                },
                "channel_id": {
                    "type": "string",
                    "description": "Target channel; defaults to the current one"
                }
            },
            "required": ["description", "cron_expression", "action"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let description = require_str_arg(&params, "description")?;
        let cron_expression = require_str_arg(&params, "cron_expression")?;
        let action = parse_action(require_str_arg(&params, "action")?)?;
        let args = match params.get("args") {
            None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
            Some(obj @ Value::Object(_)) => obj.clone(),
            Some(other) => {
                return Err(NeoclawError::InvalidArgs(format!(
                    "job args must be an object, got {}",
                    json_type_name(other)
                ))
                .into());
            }
        };
        let channel_id = params
            .get("channel_id")
            .and_then(Value::as_str)
            .unwrap_or(&self.default_channel)
            .to_string();

        let job = self
            .scheduler
            .create(JobInput {
                description: description.to_string(),
                cron_expression: cron_expression.to_string(),
                action,
                args,
                channel_id,
            })
            .await?;
        Ok(ToolResult::new(format!(
            "created job {} ({}), next run {}",
            job.id,
            job.description,
            job.next_run_after(chrono::Utc::now())
                .map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
        )))
    }
}

pub struct JobListTool {
    scheduler: Arc<JobScheduler>,
}

impl JobListTool {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for JobListTool {
    fn name(&self) -> &str {
        "job_list"
    }

    fn description(&self) -> &str {
        "List all scheduled jobs."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let jobs = self.scheduler.list().await?;
        if jobs.is_empty() {
            return Ok(ToolResult::new("no jobs scheduled"));
        }
        let lines: Vec<String> = jobs
            .iter()
            .map(|j| {
                format!(
                    "{} | {} | {} | {:?} | {}",
                    j.id,
                    j.cron_expression,
                    if j.enabled { "enabled" } else { "disabled" },
                    j.action,
                    j.description
                )
            })
            .collect();
        Ok(ToolResult::new(lines.join("\n")))
    }
}

pub struct JobDeleteTool {
    scheduler: Arc<JobScheduler>,
}

impl JobDeleteTool {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for JobDeleteTool {
    fn name(&self) -> &str {
        "job_delete"
    }

    fn description(&self) -> &str {
        "Delete a scheduled job by id."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "The job id to delete"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let id = require_str_arg(&params, "id")?;
        self.scheduler.delete(id).await?;
        Ok(ToolResult::new(format!("deleted job {}", id)))
    }
}

pub struct JobRunTool {
    scheduler: Arc<JobScheduler>,
}

impl JobRunTool {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for JobRunTool {
    fn name(&self) -> &str {
        "job_run"
    }

    fn description(&self) -> &str {
        "Run a scheduled job immediately."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "The job id to run"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let id = require_str_arg(&params, "id")?;
        match self.scheduler.run_now(id).await? {
            Some(output) => Ok(ToolResult::new(output)),
            None => Ok(ToolResult::new("job ran with no output")),
        }
    }
}

#[cfg(test)]
mod tests;

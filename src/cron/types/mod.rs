use crate::errors::NeoclawError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    SendMessage,
    RunCommand,
    HttpRequest,
}

/// A persisted scheduled job. `args` is handed to the action runner verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub description: String,
    pub cron_expression: String,
    pub action: JobAction,
    #[serde(default = "empty_args")]
    pub args: Value,
    pub channel_id: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Caller-supplied fields for [`crate::cron::JobScheduler::create`].
#[derive(Debug, Clone)]
pub struct JobInput {
    pub description: String,
    pub cron_expression: String,
    pub action: JobAction,
    pub args: Value,
    pub channel_id: String,
}

/// Validate a standard five-field cron expression and return the parsed
/// schedule. The `cron` crate wants a seconds field, so a `0` is prepended
/// before parsing.
pub fn parse_cron_expr(expr: &str) -> Result<cron::Schedule, NeoclawError> {
    if expr.split_whitespace().count() != 5 {
        return Err(NeoclawError::Parse(format!(
            "cron expression '{}' must have exactly five fields",
            expr
        )));
    }
    format!("0 {}", expr)
        .parse::<cron::Schedule>()
        .map_err(|e| NeoclawError::Parse(format!("invalid cron expression '{}': {}", expr, e)))
}

impl Job {
    pub fn from_input(input: JobInput, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: input.description,
            cron_expression: input.cron_expression,
            action: input.action,
            args: input.args,
            channel_id: input.channel_id,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Every persisted job satisfies this predicate.
    pub fn validate(&self) -> Result<(), NeoclawError> {
        if self.description.trim().is_empty() {
            return Err(NeoclawError::InvalidArgs(
                "job description must not be empty".to_string(),
            ));
        }
        if self.channel_id.trim().is_empty() {
            return Err(NeoclawError::InvalidArgs(
                "job channel_id must not be empty".to_string(),
            ));
        }
        if !self.args.is_object() {
            return Err(NeoclawError::InvalidArgs(
                "job args must be an object".to_string(),
            ));
        }
        parse_cron_expr(&self.cron_expression)?;
        Ok(())
    }

    /// Next fire time strictly after `now`, or `None` when the expression is
    /// invalid or has no future occurrences.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let schedule = parse_cron_expr(&self.cron_expression).ok()?;
        schedule.after(&now).next()
    }
}

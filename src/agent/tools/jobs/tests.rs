use super::*;
use crate::cron::ActionRunner;
use crate::cron::types::Job;
use serde_json::json;
use std::collections::HashMap;

struct EchoRunner;

#[async_trait]
impl ActionRunner for EchoRunner {
    async fn run(&self, job: &Job) -> anyhow::Result<Option<String>> {
        Ok(Some(format!("ran {}", job.description)))
    }
}

fn scheduler(dir: &tempfile::TempDir) -> Arc<JobScheduler> {
    let mut runners: HashMap<JobAction, Arc<dyn ActionRunner>> = HashMap::new();
    runners.insert(JobAction::SendMessage, Arc::new(EchoRunner));
    Arc::new(JobScheduler::new(dir.path().join("jobs.json"), runners))
}

#[tokio::test]
async fn test_job_crud_through_tools() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler(&dir);
    let ctx = ExecutionContext::default();

    let created = JobCreateTool::new(scheduler.clone(), "terminal".into())
        .execute(
            json!({
                "description": "daily summary",
                "cron_expression": "0 18 * * *",
                "action": "send_message",
                "args": {"message": "summary time"},
            }),
            &ctx,
        )
        .await
        .unwrap();
    assert!(created.output.contains("created job"));

    let listed = JobListTool::new(scheduler.clone())
        .execute(json!({}), &ctx)
        .await
        .unwrap();
    assert!(listed.output.contains("daily summary"));
    assert!(listed.output.contains("0 18 * * *"));

    let id = listed.output.split(" | ").next().unwrap().to_string();

    let ran = JobRunTool::new(scheduler.clone())
        .execute(json!({"id": id}), &ctx)
        .await
        .unwrap();
    assert_eq!(ran.output, "ran daily summary");

    JobDeleteTool::new(scheduler.clone())
        .execute(json!({"id": id}), &ctx)
        .await
        .unwrap();
    let listed = JobListTool::new(scheduler)
        .execute(json!({}), &ctx)
        .await
        .unwrap();
    assert_eq!(listed.output, "no jobs scheduled");
}

#[tokio::test]
async fn test_job_create_rejects_unknown_action() {
    let dir = tempfile::tempdir().unwrap();
    let tool = JobCreateTool::new(scheduler(&dir), "terminal".into());
    let err = tool
        .execute(
            json!({
                "description": "x",
                "cron_expression": "* * * * *",
                "action": "fax_machine",
            }),
            &ExecutionContext::default(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown job action"));
}

#[tokio::test]
async fn test_job_create_rejects_non_object_args() {
    let dir = tempfile::tempdir().unwrap();
    let tool = JobCreateTool::new(scheduler(&dir), "terminal".into());
    let err = tool
        .execute(
            json!({
                "description": "x",
                "cron_expression": "* * * * *",
                "action": "send_message",
                "args": "not an object",
            }),
            &ExecutionContext::default(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("must be an object"));
}

#[tokio::test]
async fn test_job_create_rejects_bad_cron() {
    let dir = tempfile::tempdir().unwrap();
    let tool = JobCreateTool::new(scheduler(&dir), "terminal".into());
    let err = tool
        .execute(
            json!({
                "description": "x",
                "cron_expression": "often",
                "action": "send_message",
            }),
            &ExecutionContext::default(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cron expression"));
}

use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

struct RecordingRunner {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionRunner for RecordingRunner {
    async fn run(&self, _job: &Job) -> Result<Option<String>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(Some("done".into()))
    }
}

struct RecordingWriter {
    sent: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl ChannelWriter for RecordingWriter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn scheduler_with_runner(
    dir: &tempfile::TempDir,
    runs: Arc<AtomicUsize>,
) -> JobScheduler {
    let mut runners: HashMap<JobAction, Arc<dyn ActionRunner>> = HashMap::new();
    runners.insert(JobAction::RunCommand, Arc::new(RecordingRunner { runs }));
    JobScheduler::new(dir.path().join("jobs.json"), runners)
}

fn input(action: JobAction) -> JobInput {
    JobInput {
        description: "test job".into(),
        cron_expression: "*/5 * * * *".into(),
        action,
        args: json!({"command": "true"}),
        channel_id: "terminal".into(),
    }
}

#[tokio::test]
async fn test_create_then_delete_lists_empty() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));

    let job = scheduler.create(input(JobAction::RunCommand)).await.unwrap();
    assert_eq!(scheduler.list().await.unwrap().len(), 1);

    scheduler.delete(&job.id).await.unwrap();
    assert!(scheduler.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_invalid_cron_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));

    let mut bad = input(JobAction::RunCommand);
    bad.cron_expression = "every five minutes".into();
    let err = scheduler.create(bad).await.unwrap_err();
    let err = err.downcast::<NeoclawError>().unwrap();
    assert!(matches!(err, NeoclawError::Parse(_)));
    assert!(scheduler.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_jobs_persist_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));
    let job = scheduler.create(input(JobAction::RunCommand)).await.unwrap();

    let fresh = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));
    let listed = fresh.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, job.id);
    assert_eq!(listed[0].action, JobAction::RunCommand);
}

#[tokio::test]
async fn test_run_now_dispatches_to_runner() {
    let dir = tempfile::tempdir().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let scheduler = scheduler_with_runner(&dir, runs.clone());
    let job = scheduler.create(input(JobAction::RunCommand)).await.unwrap();

    let output = scheduler.run_now(&job.id).await.unwrap();
    assert_eq!(output.as_deref(), Some("done"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_now_unknown_id_fails() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));
    assert!(scheduler.run_now("missing").await.is_err());
}

#[tokio::test]
async fn test_run_now_without_runner_skips() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));
    let mut job_input = input(JobAction::HttpRequest);
    job_input.args = json!({"method": "GET", "url": "http://example.com/"});
    let job = scheduler.create(job_input).await.unwrap();
    // No HttpRequest runner registered: warn + skip, not an error.
    assert_eq!(scheduler.run_now(&job.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_unknown_id_fails() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));
    assert!(scheduler.delete("missing").await.is_err());
}

#[tokio::test]
async fn test_start_stop_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler_with_runner(&dir, Arc::new(AtomicUsize::new(0)));
    scheduler.create(input(JobAction::RunCommand)).await.unwrap();
    scheduler.start().await.unwrap();
    assert_eq!(scheduler.entries.lock().await.len(), 1);
    scheduler.stop(Duration::from_millis(200)).await;
    assert!(scheduler.entries.lock().await.is_empty());
}

#[tokio::test]
async fn test_send_message_runner() {
    let writer = Arc::new(RecordingWriter {
        sent: std::sync::Mutex::new(vec![]),
    });
    let mut writers: HashMap<String, Arc<dyn ChannelWriter>> = HashMap::new();
    writers.insert("terminal".to_string(), writer.clone());
    let runner = SendMessageRunner::new(writers);

    let mut job_input = input(JobAction::SendMessage);
    job_input.args = json!({"message": "standup in 5"});
    let job = Job::from_input(job_input, Utc::now());
    let output = runner.run(&job).await.unwrap();
    assert_eq!(output.as_deref(), Some("sent to terminal"));
    assert_eq!(writer.sent.lock().unwrap().as_slice(), ["standup in 5"]);

    // Unknown channel: warn + skip.
    let mut other = job.clone();
    other.channel_id = "slack".into();
    assert_eq!(runner.run(&other).await.unwrap(), None);
}

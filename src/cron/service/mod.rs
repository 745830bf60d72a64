use crate::agent::tools::base::{ExecutionContext, Tool};
use crate::approval::ApprovalEngine;
use crate::channels::ChannelWriter;
use crate::cron::types::{Job, JobAction, JobInput};
use crate::errors::NeoclawError;
use crate::utils::{atomic_write, to_pretty_json};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Executes one kind of job action. Runners are looked up by
/// [`JobAction`] on every fire.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, job: &Job) -> Result<Option<String>>;
}

/// Resolves the job's `channel_id` against the writer map and delivers
/// `args.message`. Unknown channels are skipped with a warning — a job must
/// never be removed because its channel went away.
pub struct SendMessageRunner {
    writers: HashMap<String, Arc<dyn ChannelWriter>>,
}

impl SendMessageRunner {
    pub fn new(writers: HashMap<String, Arc<dyn ChannelWriter>>) -> Self {
        Self { writers }
    }
}

#[async_trait]
impl ActionRunner for SendMessageRunner {
    async fn run(&self, job: &Job) -> Result<Option<String>> {
        let message = job
            .args
            .get("message")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                NeoclawError::InvalidArgs("send_message job needs args.message".to_string())
            })?;
        let Some(writer) = self.writers.get(&job.channel_id) else {
            warn!(
                "job '{}' targets unknown channel '{}', skipping",
                job.id, job.channel_id
            );
            return Ok(None);
        };
        writer.send(message).await?;
        Ok(Some(format!("sent to {}", job.channel_id)))
    }
}

/// Runs the job's command through the approval engine with no approver:
/// allowlisted commands execute, everything else fails (and stays failed
/// until the user allowlists it interactively).
pub struct RunCommandRunner {
    engine: Arc<ApprovalEngine>,
    tool: Arc<dyn Tool>,
}

impl RunCommandRunner {
    pub fn new(engine: Arc<ApprovalEngine>, tool: Arc<dyn Tool>) -> Self {
        Self { engine, tool }
    }
}

#[async_trait]
impl ActionRunner for RunCommandRunner {
    async fn run(&self, job: &Job) -> Result<Option<String>> {
        let ctx = ExecutionContext {
            channel: job.channel_id.clone(),
            chat_id: job.id.clone(),
            ..ExecutionContext::default()
        };
        let result = self
            .engine
            .execute_tool(&ctx, None, self.tool.as_ref(), &job.args, "run_command")
            .await?;
        Ok(Some(result.output))
    }
}

/// Issues the job's HTTP request through the gated client inside the tool.
pub struct HttpRequestRunner {
    tool: Arc<dyn Tool>,
}

impl HttpRequestRunner {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ActionRunner for HttpRequestRunner {
    async fn run(&self, job: &Job) -> Result<Option<String>> {
        let ctx = ExecutionContext {
            channel: job.channel_id.clone(),
            chat_id: job.id.clone(),
            ..ExecutionContext::default()
        };
        let result = self.tool.execute(job.args.clone(), &ctx).await?;
        Ok(Some(result.output))
    }
}

/// Cron-expression registry over the persisted job file. Every enabled job
/// gets its own timer task; the task awaits the job's run before sleeping
/// again, so each job is single-flight by construction.
pub struct JobScheduler {
    store_path: PathBuf,
    jobs: Mutex<Option<Vec<Job>>>,
    entries: Mutex<HashMap<String, JoinHandle<()>>>,
    runners: Arc<HashMap<JobAction, Arc<dyn ActionRunner>>>,
    started: std::sync::atomic::AtomicBool,
    cancel: CancellationToken,
}

impl JobScheduler {
    pub fn new(store_path: PathBuf, runners: HashMap<JobAction, Arc<dyn ActionRunner>>) -> Self {
        Self {
            store_path,
            jobs: Mutex::new(None),
            entries: Mutex::new(HashMap::new()),
            runners: Arc::new(runners),
            started: std::sync::atomic::AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    async fn load_jobs(&self) -> Result<Vec<Job>> {
        let mut guard = self.jobs.lock().await;
        if let Some(jobs) = guard.as_ref() {
            return Ok(jobs.clone());
        }
        let jobs = if self.store_path.exists() {
            let content = std::fs::read_to_string(&self.store_path)
                .with_context(|| format!("Failed to read {}", self.store_path.display()))?;
            if content.trim().is_empty() {
                vec![]
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", self.store_path.display()))?
            }
        } else {
            vec![]
        };
        *guard = Some(jobs.clone());
        Ok(jobs)
    }

    async fn save_jobs(&self, jobs: Vec<Job>) -> Result<()> {
        let content = to_pretty_json(&jobs)?;
        atomic_write(&self.store_path, &content)?;
        *self.jobs.lock().await = Some(jobs);
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Job>> {
        self.load_jobs().await
    }

    pub async fn create(&self, input: JobInput) -> Result<Job> {
        let job = Job::from_input(input, Utc::now());
        job.validate()?;

        let mut jobs = self.load_jobs().await?;
        jobs.push(job.clone());
        self.save_jobs(jobs).await?;

        if self.started.load(std::sync::atomic::Ordering::SeqCst) && job.enabled {
            self.register(job.clone()).await;
        }
        info!("created job '{}' ({})", job.description, job.id);
        Ok(job)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut jobs = self.load_jobs().await?;
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        if jobs.len() == before {
            return Err(NeoclawError::InvalidArgs(format!("no job with id '{}'", id)).into());
        }
        self.save_jobs(jobs).await?;

        if let Some(handle) = self.entries.lock().await.remove(id) {
            handle.abort();
        }
        info!("deleted job {}", id);
        Ok(())
    }

    /// Fire one job immediately, outside its schedule.
    pub async fn run_now(&self, id: &str) -> Result<Option<String>> {
        let jobs = self.load_jobs().await?;
        let job = jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| NeoclawError::InvalidArgs(format!("no job with id '{}'", id)))?;
        Self::dispatch(&self.runners, job).await
    }

    async fn dispatch(
        runners: &HashMap<JobAction, Arc<dyn ActionRunner>>,
        job: &Job,
    ) -> Result<Option<String>> {
        let Some(runner) = runners.get(&job.action) else {
            warn!("no runner for action {:?}, skipping job {}", job.action, job.id);
            return Ok(None);
        };
        runner.run(job).await
    }

    /// Spawn the timer task for one job and record its entry handle.
    async fn register(&self, job: Job) {
        let runners = self.runners.clone();
        let cancel = self.cancel.clone();
        let job_id = job.id.clone();

        let handle = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = job.next_run_after(now) else {
                    warn!("job {} has no future run times, parking it", job.id);
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(wait) => {}
                }

                info!("firing job '{}' ({})", job.description, job.id);
                match Self::dispatch(&runners, &job).await {
                    Ok(Some(output)) => {
                        info!("job {} completed: {} chars", job.id, output.len());
                    }
                    Ok(None) => info!("job {} completed (no output)", job.id),
                    // Failures log and the schedule continues; the job record
                    // is never removed on error.
                    Err(e) => error!("job {} failed: {}", job.id, e),
                }
            }
        });

        let mut entries = self.entries.lock().await;
        if let Some(old) = entries.insert(job_id, handle) {
            old.abort();
        }
    }

    /// Read the job file and register every enabled job with the timer
    /// runtime.
    pub async fn start(&self) -> Result<()> {
        let jobs = self.load_jobs().await?;
        let count = jobs.iter().filter(|j| j.enabled).count();
        for job in jobs.into_iter().filter(|j| j.enabled) {
            self.register(job).await;
        }
        self.started.store(true, std::sync::atomic::Ordering::SeqCst);
        info!("scheduler started with {} enabled job(s)", count);
        Ok(())
    }

    /// Graceful shutdown: signal every timer task, then wait (bounded) for
    /// in-flight callbacks before aborting stragglers.
    pub async fn stop(&self, grace: Duration) {
        self.cancel.cancel();
        self.started
            .store(false, std::sync::atomic::Ordering::SeqCst);

        let handles: Vec<(String, JoinHandle<()>)> =
            self.entries.lock().await.drain().collect();
        let deadline = tokio::time::Instant::now() + grace;
        for (id, mut handle) in handles {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut handle).await.is_err() {
                warn!("job {} did not stop within the grace period, aborting", id);
                handle.abort();
            }
        }
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests;

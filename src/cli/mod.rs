use crate::agent::costs::CostLog;
use crate::agent::dispatcher::{Dispatcher, TurnHandler, TurnRequest};
use crate::agent::memory::MemoryStore;
use crate::agent::tools::base::ExecutionContext;
use crate::agent::tools::http::HttpRequestTool;
use crate::agent::tools::setup::{ToolBuildContext, register_all_tools};
use crate::agent::tools::shell::RunCommandTool;
use crate::agent::TurnLoop;
use crate::approval::{ApprovalEngine, Approver, TerminalApprover};
use crate::channels::{ChannelWriter, StdoutWriter};
use crate::config::Config;
use crate::cron::service::{
    HttpRequestRunner, JobScheduler, RunCommandRunner, SendMessageRunner,
};
use crate::cron::{ActionRunner, JobAction};
use crate::errors::NeoclawError;
use crate::policy::domain::{DomainChecker, GatedClient};
use crate::policy::store::PolicyStore;
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::base::{LLMProvider, Message};
use crate::sandbox::proxy::start_domain_proxy;
use crate::sandbox::restrict_process;
use crate::utils::{ensure_dir, write_pid_file};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "neoclaw", version, about = "Local AI assistant with policy-gated tools")]
struct Cli {
    /// Path to config.toml (default: $NEOCLAW_HOME/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the terminal agent (default)
    Serve,
}

/// Terminal session handler: keeps the conversation history for the life of
/// the process and commits it only when a turn completes.
struct AgentHandler {
    turn_loop: TurnLoop,
    history: tokio::sync::Mutex<Vec<Message>>,
}

#[async_trait]
impl TurnHandler for AgentHandler {
    async fn handle(
        &self,
        ctx: ExecutionContext,
        message: String,
    ) -> Result<String, NeoclawError> {
        let mut history = self.history.lock().await.clone();
        history.push(Message::user(message));
        let outcome = self.turn_loop.run(&ctx, &mut history).await?;
        // An interrupted turn is abandoned; only completed turns persist.
        *self.history.lock().await = history;
        Ok(outcome.text)
    }
}

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("neoclaw=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.config.as_deref()).await,
    }
}

async fn serve(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let mode = config.security.mode;
    if mode.is_danger() {
        warn!("security mode is DANGER: approvals and sandboxing are disabled");
    }

    let data_dir = ensure_dir(config.data_dir())?;
    ensure_dir(config.workspace_path())?;
    ensure_dir(config.policy_dir())?;

    // Filesystem restriction happens before anything else touches the agent
    // loop (may re-exec on macOS).
    restrict_process(mode, &data_dir)?;

    let pid_file = write_pid_file(&data_dir)?;

    let store = Arc::new(PolicyStore::new());
    let approver: Arc<dyn Approver> = Arc::new(TerminalApprover);
    let engine = Arc::new(ApprovalEngine::new(
        store.clone(),
        config.command_policy_path(),
        mode,
    ));
    let checker = Arc::new(
        DomainChecker::new(store.clone(), config.domain_policy_path(), mode)
            .with_approver(approver.clone()),
    );
    let gated_client = Arc::new(GatedClient::new(checker.clone()));

    let proxy = start_domain_proxy(checker.clone()).await?;
    let proxy_addr = proxy.addr().to_string();

    let memory = Arc::new(MemoryStore::new(config.memory_dir())?);
    let terminal: Arc<dyn ChannelWriter> = Arc::new(StdoutWriter);

    // Scheduler action runners share the approval/gating substrate.
    let mut writers: HashMap<String, Arc<dyn ChannelWriter>> = HashMap::new();
    writers.insert(terminal.name().to_string(), terminal.clone());
    let mut runners: HashMap<JobAction, Arc<dyn ActionRunner>> = HashMap::new();
    runners.insert(
        JobAction::SendMessage,
        Arc::new(SendMessageRunner::new(writers)),
    );
    runners.insert(
        JobAction::RunCommand,
        Arc::new(RunCommandRunner::new(
            engine.clone(),
            Arc::new(RunCommandTool::new(
                config.workspace_path(),
                config.tools.exec.timeout,
                config.tools.exec.inline_output_limit,
                Some(proxy_addr.clone()),
            )),
        )),
    );
    runners.insert(
        JobAction::HttpRequest,
        Arc::new(HttpRequestRunner::new(Arc::new(HttpRequestTool::new(
            gated_client.clone(),
        )))),
    );
    let scheduler = Arc::new(JobScheduler::new(config.jobs_path(), runners));

    let registry = Arc::new(register_all_tools(&ToolBuildContext {
        workspace: config.workspace_path(),
        security_mode: mode,
        exec_timeout: config.tools.exec.timeout,
        inline_output_limit: config.tools.exec.inline_output_limit,
        proxy_addr: Some(proxy_addr),
        gated_client,
        memory,
        scheduler: scheduler.clone(),
        channel_writer: Some(terminal.clone()),
        default_channel: terminal.name().to_string(),
        web_search_api_key: config.tools.web_search.api_key.clone(),
        web_search_max_results: config.tools.web_search.max_results,
    })?);

    if config.provider.api_key.is_empty() {
        warn!("no Anthropic API key configured (provider.api_key or ANTHROPIC_API_KEY)");
    }
    let provider: Arc<dyn LLMProvider> = {
        let mut provider = AnthropicProvider::new(
            config.provider.api_key.clone(),
            config.provider.model.clone(),
            config.provider.request_timeout,
        );
        if let Some(base_url) = &config.provider.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
        Arc::new(provider)
    };

    let cost_log = Arc::new(CostLog::new(config.costs_path()));
    let model_for_costs = config
        .provider
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());
    let turn_loop = TurnLoop::new(
        provider,
        registry,
        engine,
        Some(approver),
        config.agent.system_prompt.clone(),
        config.agent.max_tool_iterations,
        config.agent.max_tokens,
    )
    .with_usage_callback(Box::new(move |usage| {
        if let Err(e) = cost_log.record("anthropic", &model_for_costs, usage) {
            warn!("failed to record usage: {}", e);
        }
    }));

    let handler = Arc::new(AgentHandler {
        turn_loop,
        history: tokio::sync::Mutex::new(Vec::new()),
    });
    let dispatcher = Arc::new(Dispatcher::new(handler, 32));

    scheduler.start().await?;
    info!("neoclaw {} ready (agent '{}')", crate::VERSION, config.agent.name);

    let result = repl(&dispatcher, &terminal).await;

    dispatcher.stop();
    scheduler.stop(Duration::from_secs(5)).await;
    proxy.shutdown();
    if let Err(e) = store.flush_all() {
        warn!("final policy flush failed: {}", e);
    }
    std::fs::remove_file(&pid_file).ok();
    result
}

/// Line-oriented terminal loop. Waits for the dispatcher to go idle between
/// prompts so approval prompts have stdin to themselves during a turn.
async fn repl(dispatcher: &Arc<Dispatcher>, terminal: &Arc<dyn ChannelWriter>) -> Result<()> {
    let idle = CancellationToken::new();
    loop {
        let line = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("signal handler failed")?;
                info!("interrupt received, shutting down");
                return Ok(());
            }
            line = tokio::task::spawn_blocking(read_prompt_line) => line??,
        };

        let Some(line) = line else {
            // EOF
            return Ok(());
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            return Ok(());
        }

        dispatcher
            .enqueue(TurnRequest {
                channel: terminal.name().to_string(),
                chat_id: "local".to_string(),
                message: line,
                responder: terminal.clone(),
            })
            .await
            .map_err(|e| anyhow::anyhow!("dispatcher rejected message: {}", e))?;
        dispatcher.wait_until_idle(&idle).await;
    }
}

/// Blocking read of one input line. Returns `None` on EOF.
fn read_prompt_line() -> Result<Option<String>> {
    use std::io::Write;
    let mut stdout = std::io::stdout();
    stdout.write_all(b"> ")?;
    stdout.flush()?;
    let mut line = String::new();
    let read = std::io::stdin().read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

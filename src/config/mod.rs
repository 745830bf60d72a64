use crate::utils::get_neoclaw_home;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How aggressively neoclaw gates side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Approval + policy gating on, filesystem restriction in its loose form.
    #[default]
    Standard,
    /// Approval + policy gating on, filesystem restriction narrowed to an
    /// explicit read allowlist. Startup aborts if the sandbox primitive is
    /// unavailable on this host.
    Strict,
    /// Skip all approval checks and file-restriction gates. The only way to
    /// opt out.
    Danger,
}

impl SecurityMode {
    pub fn is_danger(self) -> bool {
        matches!(self, Self::Danger)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            system_prompt: default_system_prompt(),
            max_tool_iterations: default_max_tool_iterations(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_agent_name() -> String {
    "main".to_string()
}

fn default_system_prompt() -> String {
    "You are neoclaw, a local personal assistant with tools for files, shell \
     commands, HTTP, web search, memory, and scheduled jobs."
        .to_string()
}

fn default_max_tool_iterations() -> usize {
    10
}

fn default_max_tokens() -> u32 {
    8192
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout for chat calls, seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: None,
            base_url: None,
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecToolConfig {
    /// Subprocess timeout, seconds.
    #[serde(default = "default_exec_timeout")]
    pub timeout: u64,
    /// Maximum characters returned inline; larger outputs spill to a file.
    #[serde(default = "default_inline_output_limit")]
    pub inline_output_limit: usize,
}

impl Default for ExecToolConfig {
    fn default() -> Self {
        Self {
            timeout: default_exec_timeout(),
            inline_output_limit: default_inline_output_limit(),
        }
    }
}

fn default_exec_timeout() -> u64 {
    300
}

fn default_inline_output_limit() -> usize {
    12_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exec: ExecToolConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub mode: SecurityMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Home directory override. Normally unset; resolved at load time.
    #[serde(skip)]
    pub home: PathBuf,
}

impl Config {
    /// Load config.toml from `path`, or from `$NEOCLAW_HOME/config.toml` when
    /// `None`. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = get_neoclaw_home()?;
        let default_path = home.join("config.toml");
        let path = path.unwrap_or(default_path.as_path());

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config TOML from {}", path.display()))?
        } else {
            Config::default()
        };

        if config.provider.api_key.is_empty()
            && let Ok(key) = std::env::var("ANTHROPIC_API_KEY")
        {
            config.provider.api_key = key;
        }
        config.home = home;
        Ok(config)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.home.join("data")
    }

    pub fn policy_dir(&self) -> PathBuf {
        self.data_dir().join("policy")
    }

    pub fn command_policy_path(&self) -> PathBuf {
        self.policy_dir().join("allowed_commands.json")
    }

    pub fn domain_policy_path(&self) -> PathBuf {
        self.policy_dir().join("allowed_domains.json")
    }

    pub fn users_path(&self) -> PathBuf {
        self.policy_dir().join("allowed_users.json")
    }

    pub fn agent_dir(&self) -> PathBuf {
        self.data_dir().join("agents").join(&self.agent.name)
    }

    pub fn workspace_path(&self) -> PathBuf {
        self.agent_dir().join("workspace")
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.agent_dir().join("jobs.json")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.agent_dir().join("memory")
    }

    pub fn costs_path(&self) -> PathBuf {
        self.data_dir().join("logs").join("costs.tsv")
    }
}

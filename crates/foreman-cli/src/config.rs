use anyhow::Context;
use foreman_core::Role;
use foreman_orchestrator::{
    capability_set, Agent, ExecutorSpec, Orchestrator, OrchestratorConfig, RegisterRequest,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Contents of `foreman.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct ForemanConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Agents registered at start-up.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One `[[agents]]` entry.
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub executor: ExecutorSpec,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    4000
}

impl AgentConfig {
    pub fn register_request(&self) -> RegisterRequest {
        let mut request = RegisterRequest::new(self.role, self.name.clone());
        if let Some(caps) = &self.capabilities {
            request = request.with_capabilities(capability_set(caps.iter().cloned()));
        }
        if let Some(capacity) = self.capacity {
            request = request.with_capacity(capacity);
        }
        request
    }
}

impl ForemanConfig {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid foreman config")
    }

    /// Read the config at `path`, falling back to defaults when the file
    /// does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::parse(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e)
                .with_context(|| format!("failed to read config file '{}'", path.display())),
        }
    }

    /// Register every configured agent with `orchestrator`.
    pub fn register_agents(&self, orchestrator: &Orchestrator) -> anyhow::Result<Vec<Agent>> {
        let mut registered = Vec::with_capacity(self.agents.len());
        for entry in &self.agents {
            let executor = entry
                .executor
                .build(&entry.name)
                .with_context(|| format!("agent '{}' has an invalid executor", entry.name))?;
            let agent = orchestrator
                .register_agent(entry.register_request(), executor)
                .with_context(|| format!("failed to register agent '{}'", entry.name))?;
            info!(agent_id = %agent.id, name = %agent.name, role = %agent.role, "Configured agent registered");
            registered.push(agent);
        }
        Ok(registered)
    }
}

mod config;

use clap::{Parser, Subcommand};
use config::ForemanConfig;
use foreman_gateway::GatewayServer;
use foreman_orchestrator::{CapabilityCatalog, Orchestrator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "foreman", about = "Foreman: role-based agent orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "foreman.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the role capability catalog
    Roles,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = ForemanConfig::load(&cli.config).await?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{host}:{port}").parse()?;

            let orchestrator = Arc::new(Orchestrator::new(config.orchestrator.clone())?);
            let agents = config.register_agents(&orchestrator)?;
            info!(agents = agents.len(), "Starting Foreman gateway on {}", addr);

            let serving = GatewayServer::serve(Arc::clone(&orchestrator), addr);
            tokio::select! {
                result = serving => result?,
                _ = tokio::signal::ctrl_c() => {
                    let report = orchestrator.shutdown();
                    info!(
                        agents_removed = report.agents_removed,
                        handoffs_cancelled = report.handoffs_cancelled,
                        "Shutdown complete"
                    );
                }
            }
        }
        Commands::Roles => {
            let catalog = CapabilityCatalog::default();
            println!("Roles:");
            for profile in catalog.profiles() {
                let caps: Vec<&str> = profile.capabilities.iter().map(String::as_str).collect();
                println!(
                    "  {:<20} capacity {}  [{}]",
                    profile.role.as_str(),
                    profile.max_concurrent,
                    caps.join(", ")
                );
            }
            println!("\nTotal: {} role(s)", catalog.profiles().len());
        }
    }

    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::Method;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use x402_registry::{marketplace_router, AgentRepository, MarketplaceState};

#[derive(Parser, Debug)]
#[command(name = "marketplace-node")]
#[command(about = "x402 agent marketplace registry")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Serve {
        #[arg(long, alias = "host", default_value = "127.0.0.1")]
        hostname: String,
        #[arg(long, default_value_t = 4401)]
        port: u16,
        #[arg(long)]
        agents_file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            hostname,
            port,
            agents_file,
        } => {
            let agents_file = resolve_agents_file(agents_file);

            let logs_dir = agents_file
                .parent()
                .map(x402_observability::canonical_logs_dir_from_root)
                .unwrap_or_else(|| PathBuf::from("logs"));
            let (_guard, _logging_info) = x402_observability::init_process_logging(
                x402_observability::ProcessKind::Marketplace,
                &logs_dir,
                14,
            )?;

            let repository = Arc::new(AgentRepository::new(agents_file.clone()).await?);
            let state = MarketplaceState { repository };

            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
            let app = marketplace_router(state).layer(cors);

            let addr: SocketAddr = format!("{hostname}:{port}")
                .parse()
                .context("invalid hostname or port")?;
            let listener = TcpListener::bind(addr).await?;
            info!(agents_file = %agents_file.display(), "marketplace-node listening on http://{addr}");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

fn resolve_agents_file(flag: Option<String>) -> PathBuf {
    if let Some(path) = flag {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("MARKETPLACE_AGENTS_FILE") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(".marketplace/agents.json")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

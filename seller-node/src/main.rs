mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use x402_core::{ExecutionService, TaskRepository, UnconfiguredRunner};
use x402_payments::{load_pricing_config, HttpFacilitatorClient, NullFacilitator, PaymentState};
use x402_ratelimit::{LimitRule, RateLimiter};
use x402_registry::{RegistrationClient, RegistrationSettings};
use x402_server::{serve, AppState};

use config::ServiceConfig;

#[derive(Parser, Debug)]
#[command(name = "seller-node")]
#[command(about = "x402 seller execution node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Serve {
        #[arg(long, default_value = "seller.yaml")]
        config: String,
        #[arg(long)]
        state_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, state_dir } => {
            let state_dir = resolve_state_dir(state_dir);
            tokio::fs::create_dir_all(&state_dir).await.ok();

            let logs_dir = x402_observability::canonical_logs_dir_from_root(&state_dir);
            let (_guard, _logging_info) = x402_observability::init_process_logging(
                x402_observability::ProcessKind::Seller,
                &logs_dir,
                14,
            )?;

            let service_config = ServiceConfig::load(&PathBuf::from(&config))?;
            let (state, registration) = build_state(&service_config, &state_dir).await?;

            let addr: SocketAddr = format!("{}:{}", service_config.hostname, service_config.port)
                .parse()
                .context("invalid hostname or port")?;
            info!("starting seller-node on http://{addr}");

            tokio::spawn(async move {
                registration.register().await;
            });

            let janitor_interval =
                std::time::Duration::from_secs(service_config.janitor_interval_seconds);
            serve(addr, state, janitor_interval).await?;
        }
    }

    Ok(())
}

fn resolve_state_dir(flag: Option<String>) -> PathBuf {
    if let Some(dir) = flag {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("SELLER_STATE_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(".seller")
}

async fn build_state(
    config: &ServiceConfig,
    state_dir: &PathBuf,
) -> anyhow::Result<(AppState, RegistrationClient)> {
    let repository = Arc::new(TaskRepository::new(config.deadline_seconds));
    let execution = Arc::new(ExecutionService::new(
        repository.clone(),
        Arc::new(UnconfiguredRunner),
    ));

    let rules = config
        .rate_limit
        .rules
        .iter()
        .map(|rule| LimitRule {
            pattern: rule.pattern.clone(),
            limit: rule.limit,
        })
        .collect();
    let rate_limiter = Arc::new(RateLimiter::new(rules, config.rate_limit.window_seconds));

    let pricing_path = config.pricing_config_path(state_dir);
    let pricing = load_pricing_config(&pricing_path);

    let facilitator: Arc<dyn x402_payments::Facilitator> =
        match (&config.payments.facilitator_base_url, config.payments.enabled) {
            (Some(base_url), true) => Arc::new(HttpFacilitatorClient::new(base_url.clone())),
            _ => Arc::new(NullFacilitator),
        };

    let payments = PaymentState {
        pricing,
        facilitator,
        payee_wallet_address: config.payments.payee_wallet_address.clone(),
        enabled: config.payments.enabled,
    };

    let registration = RegistrationClient::new(RegistrationSettings {
        enabled: config.marketplace.enabled,
        marketplace_base_url: config.marketplace.base_url.clone(),
        agent_name: config.marketplace.agent_name.clone(),
        base_url: config.marketplace.self_base_url.clone(),
        description: config.marketplace.description.clone(),
        tags: config.marketplace.tags.clone(),
        retry_attempts: config.marketplace.retry_attempts,
        retry_delay_seconds: config.marketplace.retry_delay_seconds,
    });

    Ok((
        AppState {
            repository,
            execution,
            rate_limiter,
            payments,
        },
        registration,
    ))
}

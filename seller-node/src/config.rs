use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4402
}
fn default_deadline_seconds() -> i64 {
    300
}
fn default_janitor_interval_seconds() -> u64 {
    600
}
fn default_window_seconds() -> i64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_seconds() -> u64 {
    5
}
fn default_pricing_path() -> String {
    "tool_pricing.yaml".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitRuleConfig {
    pub pattern: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,
    #[serde(default)]
    pub rules: Vec<RateLimitRuleConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_pricing_path")]
    pub pricing_config_path: String,
    pub facilitator_base_url: Option<String>,
    #[serde(default)]
    pub payee_wallet_address: String,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pricing_config_path: default_pricing_path(),
            facilitator_base_url: None,
            payee_wallet_address: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub self_base_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            agent_name: String::new(),
            self_base_url: String::new(),
            description: String::new(),
            tags: Vec::new(),
            retry_attempts: default_retry_attempts(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

/// Layered service configuration: a YAML file merged with `SELLER_*`
/// environment variable overrides for the handful of fields operators most
/// often need to flip per-deployment (no hot reload — loaded once at
/// startup).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: i64,
    /// How often the janitor sweeps expired tasks (spec.md §4.3/§6).
    #[serde(default = "default_janitor_interval_seconds")]
    pub janitor_interval_seconds: u64,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            deadline_seconds: default_deadline_seconds(),
            janitor_interval_seconds: default_janitor_interval_seconds(),
            rate_limit: RateLimitConfig::default(),
            payments: PaymentsConfig::default(),
            marketplace: MarketplaceConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.is_file() {
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        } else {
            tracing::warn!(path = %path.display(), "no config file found, using defaults");
            ServiceConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(hostname) = std::env::var("SELLER_HOSTNAME") {
            self.hostname = hostname;
        }
        if let Ok(port) = std::env::var("SELLER_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(wallet) = std::env::var("SELLER_PAYEE_WALLET_ADDRESS") {
            self.payments.payee_wallet_address = wallet;
        }
        if let Ok(facilitator) = std::env::var("SELLER_FACILITATOR_BASE_URL") {
            self.payments.facilitator_base_url = Some(facilitator);
        }
        if let Ok(base_url) = std::env::var("SELLER_BASE_URL") {
            self.marketplace.self_base_url = base_url;
        }
        if let Ok(marketplace_url) = std::env::var("MARKETPLACE_BASE_URL") {
            self.marketplace.base_url = marketplace_url;
        }
    }

    pub fn pricing_config_path(&self, state_dir: &Path) -> PathBuf {
        let configured = PathBuf::from(&self.payments.pricing_config_path);
        if configured.is_absolute() {
            configured
        } else {
            state_dir.join(configured)
        }
    }
}

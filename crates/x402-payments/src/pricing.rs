use std::path::Path;

use tracing::{info, warn};

use x402_types::PricingConfig;

/// Chain id -> x402 network name. Illustrative, not exhaustive — extend as
/// new chains are priced.
const CHAIN_NETWORKS: &[(u64, &str)] = &[
    (8453, "base"),
    (84532, "base-sepolia"),
    (43114, "avalanche"),
    (43113, "avalanche-fuji"),
    (4689, "iotex"),
];

pub fn network_name_for_chain(chain_id: u64) -> Option<&'static str> {
    CHAIN_NETWORKS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, name)| *name)
}

/// Loads `tool_pricing.yaml`. A missing file logs a warning and yields an
/// empty table (every operation unpriced) rather than failing startup,
/// matching `SellerX402Config.pricing`.
pub fn load_pricing_config(path: &Path) -> PricingConfig {
    if !path.is_file() {
        warn!(
            path = %path.display(),
            "pricing config file not found; no endpoints will be monetized"
        );
        return PricingConfig::new();
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read pricing config");
            return PricingConfig::new();
        }
    };

    match serde_yaml::from_str::<PricingConfig>(&raw) {
        Ok(config) => {
            info!(operations = config.len(), "loaded pricing config");
            config
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to parse pricing config");
            PricingConfig::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_empty_config() {
        let config = load_pricing_config(Path::new("/nonexistent/tool_pricing.yaml"));
        assert!(config.is_empty());
    }

    #[test]
    fn parses_operation_pricing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "summarize:\n  - chain_id: 8453\n    token_address: \"0xabc\"\n    token_amount: 1000\n"
        )
        .unwrap();

        let config = load_pricing_config(file.path());
        assert_eq!(config.len(), 1);
        assert_eq!(config["summarize"][0].chain_id, 8453);
    }

    #[test]
    fn known_chain_ids_resolve_to_network_names() {
        assert_eq!(network_name_for_chain(8453), Some("base"));
        assert_eq!(network_name_for_chain(1), None);
    }
}

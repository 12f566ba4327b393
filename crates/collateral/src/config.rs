use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::Error;

/// JSON-RPC method of the 4mica core API returning the escrow deployment.
pub const DEFAULT_CORE_PARAMS_METHOD: &str = "core_getPublicParams";

/// Deposit tool configuration, read from JSON and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Chain key in the catalog, e.g. `eth-sepolia`.
    pub chain: String,
    /// Escrow contract address. When unset it is read from the chain's 4mica API.
    pub escrow_contract: Option<Address>,
    /// Overrides both the 4mica-published and the catalog RPC endpoint.
    pub rpc_url: Option<String>,
    pub core_params_method: String,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: "eth-sepolia".to_string(),
            escrow_contract: None,
            rpc_url: None,
            core_params_method: DEFAULT_CORE_PARAMS_METHOD.to_string(),
            confirmation_timeout_secs: 120,
            poll_interval_ms: 1500,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Explicitly configured escrow contract; the zero address counts as unset.
    pub fn escrow_override(&self) -> Option<Address> {
        self.escrow_contract.filter(|a| !a.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = Config::from_json(
            r#"{ "chain": "polygon-amoy", "escrowContract": "0x00000000000000000000000000000000000000ee" }"#,
        )
        .unwrap();
        assert_eq!(config.chain, "polygon-amoy");
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(120));
        assert_eq!(config.core_params_method, DEFAULT_CORE_PARAMS_METHOD);
        assert_eq!(config.escrow_override().unwrap().0[19], 0xee);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_json(
            r#"{ "coreParamsMethod": "core_params", "pollIntervalMs": 10 }"#,
        )
        .unwrap();
        assert_eq!(config.core_params_method, "core_params");
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_zero_escrow_is_unset() {
        assert!(Config::default().escrow_override().is_none());
        let config = Config {
            escrow_contract: Some(Address::ZERO),
            ..Config::default()
        };
        assert!(config.escrow_override().is_none());
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(Config::from_json(r#"{ "escrowContract": "0x12" }"#).is_err());
    }
}

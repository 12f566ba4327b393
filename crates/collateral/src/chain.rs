use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Payment provider id of the escrow/credit service.
pub const FOURMICA_PROVIDER: &str = "4mica";

/// Feature id that turns on x402 payments in a generated agent.
pub const X402_FEATURE: &str = "x402";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Solana,
}

/// Static network metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub key: String,
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,
    pub family: ChainFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usdc_address: Option<String>,
    #[serde(default)]
    pub x402_providers: Vec<String>,
    /// 4mica core API that publishes the escrow contract for this chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fourmica_api_url: Option<String>,
}

impl ChainInfo {
    pub fn is_testnet(&self) -> bool {
        let name = self.name.to_ascii_lowercase();
        name.contains("testnet")
            || name.contains("sepolia")
            || name.contains("amoy")
            || name.contains("fuji")
            || name.contains("devnet")
    }

    pub fn supports_provider(&self, provider: &str) -> bool {
        self.x402_providers.iter().any(|p| p == provider)
    }
}

/// Read-only lookup from chain key to [`ChainInfo`].
#[derive(Debug, Clone, Default)]
pub struct ChainCatalog {
    chains: BTreeMap<String, ChainInfo>,
}

impl ChainCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Networks known to the agent wizard.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        let evm = |key: &str,
                   name: &str,
                   chain_id: u64,
                   rpc_url: &str,
                   explorer_url: &str,
                   usdc: Option<&str>,
                   providers: &[&str]| ChainInfo {
            key: key.to_string(),
            name: name.to_string(),
            chain_id,
            rpc_url: rpc_url.to_string(),
            explorer_url: explorer_url.to_string(),
            family: ChainFamily::Evm,
            usdc_address: usdc.map(str::to_string),
            x402_providers: providers.iter().map(|p| p.to_string()).collect(),
            fourmica_api_url: None,
        };

        let mut sepolia = evm(
            "eth-sepolia",
            "Ethereum Sepolia",
            11155111,
            "https://ethereum-sepolia-rpc.publicnode.com",
            "https://sepolia.etherscan.io",
            Some("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
            &[FOURMICA_PROVIDER],
        );
        sepolia.fourmica_api_url = Some("https://ethereum.sepolia.api.4mica.xyz".to_string());
        catalog.insert(sepolia);

        let mut amoy = evm(
            "polygon-amoy",
            "Polygon Amoy",
            80002,
            "https://rpc-amoy.polygon.technology",
            "https://amoy.polygonscan.com",
            Some("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"),
            &[FOURMICA_PROVIDER],
        );
        amoy.fourmica_api_url = Some("https://api.4mica.xyz".to_string());
        catalog.insert(amoy);

        catalog.insert(evm(
            "base-sepolia",
            "Base Sepolia",
            84532,
            "https://sepolia.base.org",
            "https://sepolia.basescan.org",
            Some("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            &["payai"],
        ));
        catalog.insert(evm(
            "avalanche-mainnet",
            "Avalanche C-Chain",
            43114,
            "https://api.avax.network/ext/bc/C/rpc",
            "https://snowtrace.io",
            Some("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            &[],
        ));
        catalog.insert(evm(
            "avalanche-fuji",
            "Avalanche Fuji",
            43113,
            "https://api.avax-test.network/ext/bc/C/rpc",
            "https://testnet.snowtrace.io",
            Some("0x5425890298aed601595a70AB815c96711a31Bc65"),
            &[],
        ));
        catalog.insert(ChainInfo {
            key: "solana-devnet".to_string(),
            name: "Solana Devnet".to_string(),
            chain_id: 0,
            rpc_url: "https://api.devnet.solana.com".to_string(),
            explorer_url: "https://explorer.solana.com/?cluster=devnet".to_string(),
            family: ChainFamily::Solana,
            usdc_address: None,
            x402_providers: vec![],
            fourmica_api_url: None,
        });
        catalog
    }

    /// Load a catalog from a JSON array of [`ChainInfo`].
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let chains: Vec<ChainInfo> =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        let mut catalog = Self::new();
        for chain in chains {
            catalog.insert(chain);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, chain: ChainInfo) {
        self.chains.insert(chain.key.clone(), chain);
    }

    pub fn get(&self, key: &str) -> Result<&ChainInfo, Error> {
        self.chains
            .get(key)
            .ok_or_else(|| Error::UnknownChain(key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainInfo> {
        self.chains.values()
    }
}

/// Whether the collateral deposit should be offered for this chain and
/// feature set: EVM only, the escrow provider must be available, and the
/// agent must use x402 payments.
pub fn offers_collateral_deposit<S: AsRef<str>>(chain: &ChainInfo, features: &[S]) -> bool {
    chain.family == ChainFamily::Evm
        && chain.supports_provider(FOURMICA_PROVIDER)
        && features.iter().any(|f| f.as_ref() == X402_FEATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = ChainCatalog::builtin();
        let sepolia = catalog.get("eth-sepolia").unwrap();
        assert_eq!(sepolia.chain_id, 11155111);
        assert!(sepolia.is_testnet());
        assert!(sepolia.supports_provider(FOURMICA_PROVIDER));

        let avalanche = catalog.get("avalanche-mainnet").unwrap();
        assert_eq!(avalanche.chain_id, 43114);
        assert!(avalanche.rpc_url.contains("avax.network"));
        assert!(!avalanche.is_testnet());

        let fuji = catalog.get("avalanche-fuji").unwrap();
        assert_eq!(fuji.chain_id, 43113);
        assert!(fuji.rpc_url.contains("avax-test.network"));
        assert!(fuji.usdc_address.is_some());
    }

    #[test]
    fn test_deposit_chains_have_fourmica_api() {
        let catalog = ChainCatalog::builtin();
        for chain in catalog.iter() {
            if offers_collateral_deposit(chain, &[X402_FEATURE]) {
                assert!(
                    chain.fourmica_api_url.is_some(),
                    "{} offers the deposit but has no 4mica API",
                    chain.key
                );
            }
        }
        assert_eq!(
            catalog.get("polygon-amoy").unwrap().fourmica_api_url.as_deref(),
            Some("https://api.4mica.xyz")
        );
        assert!(catalog.get("base-sepolia").unwrap().fourmica_api_url.is_none());
    }

    #[test]
    fn test_unknown_chain() {
        let catalog = ChainCatalog::builtin();
        assert!(matches!(catalog.get("moon-mainnet"), Err(Error::UnknownChain(_))));
    }

    #[test]
    fn test_deposit_gating() {
        let catalog = ChainCatalog::builtin();
        let sepolia = catalog.get("eth-sepolia").unwrap();
        let base = catalog.get("base-sepolia").unwrap();
        let solana = catalog.get("solana-devnet").unwrap();

        assert!(offers_collateral_deposit(sepolia, &["a2a", "x402"]));
        assert!(!offers_collateral_deposit(sepolia, &["a2a", "mcp"]));
        assert!(!offers_collateral_deposit(base, &["x402"]));
        assert!(!offers_collateral_deposit(solana, &["x402"]));
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {
                "key": "local",
                "name": "Local Anvil",
                "chainId": 31337,
                "rpcUrl": "http://127.0.0.1:8545",
                "explorerUrl": "",
                "family": "evm",
                "x402Providers": ["4mica"],
                "fourmicaApiUrl": "http://127.0.0.1:3000"
            }
        ]"#;
        let catalog = ChainCatalog::from_json(json).unwrap();
        let local = catalog.get("local").unwrap();
        assert_eq!(local.chain_id, 31337);
        assert_eq!(local.fourmica_api_url.as_deref(), Some("http://127.0.0.1:3000"));
        assert!(offers_collateral_deposit(local, &["x402".to_string()]));
        assert_eq!(catalog.iter().count(), 1);
    }
}

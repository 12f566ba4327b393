use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::Error;
use crate::ledger::{Ledger, StableSymbol};

/// Decimals assumed for stablecoins whose `decimals()` cannot be read.
pub const DEFAULT_STABLE_DECIMALS: u8 = 6;

/// Decimals of the chain's native currency.
pub const DEFAULT_NATIVE_DECIMALS: u8 = 18;

/// Collateral asset picked by the user. Chain-independent; the on-chain
/// address is resolved per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSelection {
    Usdc,
    Usdt,
    Native,
}

impl AssetSelection {
    pub const ALL: [AssetSelection; 3] = [
        AssetSelection::Usdc,
        AssetSelection::Usdt,
        AssetSelection::Native,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AssetSelection::Usdc => "USDC",
            AssetSelection::Usdt => "USDT",
            AssetSelection::Native => "native token",
        }
    }

    /// Amount offered when the user accepts the default.
    pub fn default_amount(&self) -> &'static str {
        match self {
            AssetSelection::Usdc | AssetSelection::Usdt => "1",
            AssetSelection::Native => "0.01",
        }
    }

    pub fn symbol(&self) -> Option<StableSymbol> {
        match self {
            AssetSelection::Usdc => Some(StableSymbol::Usdc),
            AssetSelection::Usdt => Some(StableSymbol::Usdt),
            AssetSelection::Native => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            AssetSelection::Usdc => "usdc",
            AssetSelection::Usdt => "usdt",
            AssetSelection::Native => "native",
        }
    }
}

impl fmt::Display for AssetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssetSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usdc" => Ok(AssetSelection::Usdc),
            "usdt" => Ok(AssetSelection::Usdt),
            "native" | "eth" => Ok(AssetSelection::Native),
            other => Err(Error::Config(format!(
                "unknown asset '{other}' (expected usdc, usdt or native)"
            ))),
        }
    }
}

/// Where [`ResolvedAsset::decimals`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalsSource {
    /// Read from the token's `decimals()`.
    OnChain,
    /// Native currency, fixed at 18.
    Native,
    /// `decimals()` failed; [`DEFAULT_STABLE_DECIMALS`] was substituted.
    Fallback,
}

/// An asset selection bound to a concrete on-chain asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub selection: AssetSelection,
    pub label: String,
    /// Zero address if and only if `is_native`.
    pub address: Address,
    pub is_native: bool,
    pub decimals: u8,
    pub decimals_source: DecimalsSource,
}

impl ResolvedAsset {
    /// Token to approve and deposit, `None` for the native asset.
    pub fn erc20_token(&self) -> Option<Address> {
        (!self.is_native).then_some(self.address)
    }

    pub fn decimals_defaulted(&self) -> bool {
        self.decimals_source == DecimalsSource::Fallback
    }
}

/// Resolve `selection` on the chain the ledger is connected to.
///
/// Fails with [`Error::UnsupportedAsset`] when the escrow has no token for the
/// symbol. A failing `decimals()` never aborts resolution.
pub async fn resolve<L: Ledger + ?Sized>(
    ledger: &L,
    chain: &str,
    selection: AssetSelection,
) -> Result<ResolvedAsset, Error> {
    let Some(symbol) = selection.symbol() else {
        return Ok(ResolvedAsset {
            selection,
            label: selection.label().to_string(),
            address: Address::ZERO,
            is_native: true,
            decimals: DEFAULT_NATIVE_DECIMALS,
            decimals_source: DecimalsSource::Native,
        });
    };

    let token = match ledger.token_address(symbol).await? {
        Some(address) if !address.is_zero() => address,
        _ => {
            return Err(Error::UnsupportedAsset {
                asset: selection.label().to_string(),
                chain: chain.to_string(),
            })
        }
    };

    let (decimals, decimals_source) = match ledger.token_decimals(token).await {
        Ok(decimals) => (decimals, DecimalsSource::OnChain),
        Err(err) => {
            tracing::warn!(
                %token,
                error = %err,
                "decimals() failed, assuming {DEFAULT_STABLE_DECIMALS}"
            );
            (DEFAULT_STABLE_DECIMALS, DecimalsSource::Fallback)
        }
    };

    Ok(ResolvedAsset {
        selection,
        label: selection.label().to_string(),
        address: token,
        is_native: false,
        decimals,
        decimals_source,
    })
}

pub mod address;
pub mod amount;
pub mod asset;
pub mod chain;
pub mod config;
pub mod deposit;
pub mod error;
#[cfg(feature = "rpc")]
pub mod fourmica;
pub mod key;
pub mod ledger;
#[cfg(feature = "rpc")]
pub mod rpc;
#[cfg(all(test, feature = "rpc"))]
mod test_utils;

use error::Error;

// Re-exports for convenience
pub use address::Address;
pub use asset::{AssetSelection, DecimalsSource, ResolvedAsset};
pub use chain::{offers_collateral_deposit, ChainCatalog, ChainInfo};
pub use config::Config;
pub use deposit::{CollateralDepositor, DepositOutcome, DepositRequest};
pub use key::SigningKey;
pub use ledger::{Ledger, StaticLedger, TxReceipt};
#[cfg(feature = "rpc")]
pub use rpc::{Endpoints, RpcLedger};

/// Run one deposit attempt against a borrowed ledger.
pub async fn attempt_deposit<L: Ledger>(
    ledger: &L,
    request: &DepositRequest,
) -> Result<DepositOutcome, Error> {
    CollateralDepositor::new(ledger).attempt_deposit(request).await
}

/// Check the chain and the agent's features against the catalog, then run the
/// attempt.
///
/// Fails with [`Error::UnsupportedAsset`] for every asset when the deposit is
/// not offered for this chain and feature set.
pub async fn attempt_deposit_on<L: Ledger, S: AsRef<str>>(
    catalog: &ChainCatalog,
    chain_key: &str,
    features: &[S],
    ledger: &L,
    signing_key: SigningKey,
    asset: AssetSelection,
    human_amount: &str,
) -> Result<DepositOutcome, Error> {
    let info = catalog.get(chain_key)?;
    if !offers_collateral_deposit(info, features) {
        return Err(Error::UnsupportedAsset {
            asset: asset.label().to_string(),
            chain: info.name.clone(),
        });
    }
    let request = DepositRequest {
        chain: info.name.clone(),
        signing_key,
        asset,
        human_amount: human_amount.to_string(),
    };
    attempt_deposit(ledger, &request).await
}

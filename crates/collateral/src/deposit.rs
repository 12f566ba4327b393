//! Collateral deposit decision flow.
//!
//! One attempt runs strictly in order:
//! validate → resolve → read collateral → read balance → approve → deposit,
//! stopping at the first terminal outcome. Reads always hit the ledger; nothing
//! is cached between attempts.

use std::fmt;

use num_bigint::BigUint;

use crate::address::Address;
use crate::amount::{format_units, parse_units, validate_amount};
use crate::asset::{self, AssetSelection, ResolvedAsset};
use crate::error::{Error, LedgerError};
use crate::key::SigningKey;
use crate::ledger::{Ledger, TxReceipt};

/// One user-confirmed deposit.
#[derive(Debug, Clone)]
pub struct DepositRequest {
    /// Chain display name, used in messages.
    pub chain: String,
    pub signing_key: SigningKey,
    pub asset: AssetSelection,
    /// Amount in human units, e.g. `"1.5"`.
    pub human_amount: String,
}

/// Collateral read for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollateralSnapshot {
    pub asset_address: Address,
    pub current_collateral: BigUint,
}

/// Terminal result of a deposit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    /// Collateral already covers the requested amount; nothing was submitted.
    AlreadyFunded {
        address: Address,
        asset_label: String,
        requested_amount: String,
        current_collateral: BigUint,
    },
    /// The wallet cannot cover the requested amount; nothing was submitted.
    InsufficientBalance {
        address: Address,
        asset_label: String,
        requested_amount: String,
        current_balance: BigUint,
    },
    Deposited {
        address: Address,
        asset_label: String,
        requested_amount: String,
        /// Absent for native deposits.
        approve_tx: Option<String>,
        deposit_tx: Option<String>,
    },
}

impl DepositOutcome {
    pub fn address(&self) -> Address {
        match self {
            DepositOutcome::AlreadyFunded { address, .. }
            | DepositOutcome::InsufficientBalance { address, .. }
            | DepositOutcome::Deposited { address, .. } => *address,
        }
    }

    /// True only when funds were moved.
    pub fn submitted(&self) -> bool {
        matches!(self, DepositOutcome::Deposited { .. })
    }
}

impl fmt::Display for DepositOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepositOutcome::AlreadyFunded {
                asset_label,
                requested_amount,
                ..
            } => write!(
                f,
                "4mica collateral already funded (>= {requested_amount} {asset_label})."
            ),
            DepositOutcome::InsufficientBalance {
                address,
                asset_label,
                requested_amount,
                ..
            } => write!(
                f,
                "Insufficient {asset_label} balance for 4mica registration.\n\
                 Add at least {requested_amount} {asset_label} to {address} and re-run the setup if you want to register."
            ),
            DepositOutcome::Deposited { deposit_tx, .. } => {
                write!(f, "4mica registration deposit submitted.")?;
                if let Some(tx) = deposit_tx {
                    write!(f, "\nDeposit tx: {tx}")?;
                }
                Ok(())
            }
        }
    }
}

/// Runs deposit attempts against a [`Ledger`].
///
/// Attempts for the same key and asset must be serialized by the caller; the
/// funded and balance checks are read-then-write against remote state.
pub struct CollateralDepositor<L> {
    ledger: L,
}

impl<L: Ledger> CollateralDepositor<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn into_inner(self) -> L {
        self.ledger
    }

    /// Decide whether a deposit is needed and, if so, execute it.
    pub async fn attempt_deposit(&self, request: &DepositRequest) -> Result<DepositOutcome, Error> {
        let human_amount = validate_amount(&request.human_amount)?.to_string();
        tracing::debug!(asset = %request.asset, amount = %human_amount, "validated");

        let resolved = asset::resolve(&self.ledger, &request.chain, request.asset).await?;
        tracing::debug!(
            token = %resolved.address,
            decimals = resolved.decimals,
            defaulted = resolved.decimals_defaulted(),
            "resolved asset"
        );

        let target = parse_units(&human_amount, resolved.decimals)?;

        let address = self.ledger.derive_address(&request.signing_key)?;
        tracing::debug!(%address, key = %request.signing_key.redacted(), "signer");

        let snapshot = self.read_collateral(address, &resolved).await?;
        if snapshot.current_collateral >= target {
            tracing::info!(
                %address,
                collateral = %format_units(&snapshot.current_collateral, resolved.decimals),
                "collateral already funded"
            );
            return Ok(DepositOutcome::AlreadyFunded {
                address,
                asset_label: resolved.label,
                requested_amount: human_amount,
                current_collateral: snapshot.current_collateral,
            });
        }

        let balance = match resolved.erc20_token() {
            Some(token) => self.ledger.token_balance(token, address).await?,
            None => self.ledger.native_balance(address).await?,
        };
        tracing::debug!(balance = %format_units(&balance, resolved.decimals), "read balance");
        if balance < target {
            tracing::info!(%address, "insufficient balance for deposit");
            return Ok(DepositOutcome::InsufficientBalance {
                address,
                asset_label: resolved.label,
                requested_amount: human_amount,
                current_balance: balance,
            });
        }

        let approve_tx = match resolved.erc20_token() {
            Some(token) => {
                let receipt = self
                    .ledger
                    .approve(&request.signing_key, token, &target)
                    .await?;
                let receipt = ensure_accepted("approve", receipt)?;
                tracing::debug!(tx = %receipt.transaction_id, "approval accepted");
                Some(receipt.transaction_id)
            }
            None => None,
        };

        let deposit = self
            .ledger
            .deposit(&request.signing_key, &target, resolved.erc20_token())
            .await
            .and_then(|receipt| ensure_accepted("deposit", receipt));
        let deposit = match deposit {
            Ok(receipt) => receipt,
            Err(err) => {
                if let Some(tx) = &approve_tx {
                    tracing::warn!(
                        approve_tx = %tx,
                        "deposit failed after approval; the allowance remains set"
                    );
                }
                return Err(err.into());
            }
        };
        tracing::info!(%address, tx = %deposit.transaction_id, "collateral deposit submitted");

        Ok(DepositOutcome::Deposited {
            address,
            asset_label: resolved.label,
            requested_amount: human_amount,
            approve_tx,
            deposit_tx: Some(deposit.transaction_id),
        })
    }

    async fn read_collateral(
        &self,
        owner: Address,
        resolved: &ResolvedAsset,
    ) -> Result<CollateralSnapshot, Error> {
        let current_collateral = self.ledger.collateral(owner, resolved.address).await?;
        Ok(CollateralSnapshot {
            asset_address: resolved.address,
            current_collateral,
        })
    }
}

fn ensure_accepted(operation: &str, receipt: TxReceipt) -> Result<TxReceipt, LedgerError> {
    if receipt.accepted {
        Ok(receipt)
    } else {
        Err(LedgerError::Rejected {
            operation: operation.to_string(),
            transaction_id: receipt.transaction_id,
        })
    }
}

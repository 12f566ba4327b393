use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::address::Address;
use crate::error::LedgerError;
use crate::key::SigningKey;

/// Stablecoins the escrow contract exposes a token-address accessor for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StableSymbol {
    Usdc,
    Usdt,
}

impl StableSymbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            StableSymbol::Usdc => "USDC",
            StableSymbol::Usdt => "USDT",
        }
    }
}

/// Result of submitting a mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_id: String,
    pub accepted: bool,
}

/// Capability set the deposit flow needs from the remote ledger.
///
/// Every method is a request/response against a remote service and may fail;
/// nothing here retries.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address that `key` signs for.
    fn derive_address(&self, key: &SigningKey) -> Result<Address, LedgerError> {
        Ok(key.address())
    }

    /// Collateral held by the escrow for `owner` in `asset` (zero address = native).
    async fn collateral(&self, owner: Address, asset: Address) -> Result<BigUint, LedgerError>;

    async fn token_balance(&self, token: Address, owner: Address)
        -> Result<BigUint, LedgerError>;

    async fn native_balance(&self, owner: Address) -> Result<BigUint, LedgerError>;

    async fn token_decimals(&self, token: Address) -> Result<u8, LedgerError>;

    /// Token the escrow accepts for `symbol` on this chain, if any.
    async fn token_address(&self, symbol: StableSymbol) -> Result<Option<Address>, LedgerError>;

    /// Allow the escrow contract to pull `amount` of `token` from the signer.
    async fn approve(
        &self,
        key: &SigningKey,
        token: Address,
        amount: &BigUint,
    ) -> Result<TxReceipt, LedgerError>;

    /// Deposit `amount` as collateral; `token` is `None` for the native asset.
    async fn deposit(
        &self,
        key: &SigningKey,
        amount: &BigUint,
        token: Option<Address>,
    ) -> Result<TxReceipt, LedgerError>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for &L {
    fn derive_address(&self, key: &SigningKey) -> Result<Address, LedgerError> {
        (**self).derive_address(key)
    }

    async fn collateral(&self, owner: Address, asset: Address) -> Result<BigUint, LedgerError> {
        (**self).collateral(owner, asset).await
    }

    async fn token_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<BigUint, LedgerError> {
        (**self).token_balance(token, owner).await
    }

    async fn native_balance(&self, owner: Address) -> Result<BigUint, LedgerError> {
        (**self).native_balance(owner).await
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, LedgerError> {
        (**self).token_decimals(token).await
    }

    async fn token_address(&self, symbol: StableSymbol) -> Result<Option<Address>, LedgerError> {
        (**self).token_address(symbol).await
    }

    async fn approve(
        &self,
        key: &SigningKey,
        token: Address,
        amount: &BigUint,
    ) -> Result<TxReceipt, LedgerError> {
        (**self).approve(key, token, amount).await
    }

    async fn deposit(
        &self,
        key: &SigningKey,
        amount: &BigUint,
        token: Option<Address>,
    ) -> Result<TxReceipt, LedgerError> {
        (**self).deposit(key, amount, token).await
    }
}

/// One recorded call against a [`StaticLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    Collateral { owner: Address, asset: Address },
    TokenBalance { token: Address, owner: Address },
    NativeBalance { owner: Address },
    TokenDecimals { token: Address },
    TokenAddress { symbol: StableSymbol },
    Approve { token: Address, amount: BigUint },
    Deposit { amount: BigUint, token: Option<Address> },
}

impl LedgerCall {
    pub fn is_mutating(&self) -> bool {
        matches!(self, LedgerCall::Approve { .. } | LedgerCall::Deposit { .. })
    }
}

/// Operations a [`StaticLedger`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Collateral,
    Balance,
    Decimals,
    TokenAddress,
    Approve,
    Deposit,
}

#[derive(Default)]
struct StaticState {
    token_addresses: HashMap<StableSymbol, Address>,
    decimals: HashMap<Address, u8>,
    balances: HashMap<(Address, Address), BigUint>,
    collateral: HashMap<(Address, Address), BigUint>,
    failures: HashMap<LedgerOp, String>,
    rejected: Vec<LedgerOp>,
    calls: Vec<LedgerCall>,
    next_tx: u64,
}

/// In-memory ledger with canned state, for tests and dry runs.
///
/// Native balances are keyed by the zero token address. A successful deposit
/// moves funds from balance to collateral so a repeated attempt sees the
/// updated state.
#[derive(Default)]
pub struct StaticLedger {
    state: Mutex<StaticState>,
}

impl StaticLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut StaticState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn set_token_address(&self, symbol: StableSymbol, address: Address) {
        self.with_state(|s| {
            s.token_addresses.insert(symbol, address);
        });
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.with_state(|s| {
            s.decimals.insert(token, decimals);
        });
    }

    /// Set the balance of `owner` in `token` (zero address for native).
    pub fn set_balance(&self, owner: Address, token: Address, amount: BigUint) {
        self.with_state(|s| {
            s.balances.insert((owner, token), amount);
        });
    }

    pub fn set_collateral(&self, owner: Address, asset: Address, amount: BigUint) {
        self.with_state(|s| {
            s.collateral.insert((owner, asset), amount);
        });
    }

    /// Make `op` fail with a transport error carrying `message`.
    pub fn fail(&self, op: LedgerOp, message: &str) {
        self.with_state(|s| {
            s.failures.insert(op, message.to_string());
        });
    }

    /// Make a mutating `op` return a receipt with `accepted = false`.
    pub fn reject(&self, op: LedgerOp) {
        self.with_state(|s| s.rejected.push(op));
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn mutating_calls(&self) -> Vec<LedgerCall> {
        self.with_state(|s| s.calls.iter().filter(|c| c.is_mutating()).cloned().collect())
    }

    pub fn collateral_of(&self, owner: Address, asset: Address) -> BigUint {
        self.with_state(|s| s.collateral.get(&(owner, asset)).cloned().unwrap_or_default())
    }

    fn record(&self, call: LedgerCall, op: LedgerOp) -> Result<(), LedgerError> {
        self.with_state(|s| {
            s.calls.push(call);
            match s.failures.get(&op) {
                Some(message) => Err(LedgerError::Transport(message.clone())),
                None => Ok(()),
            }
        })
    }

    fn receipt(&self, op: LedgerOp) -> TxReceipt {
        self.with_state(|s| {
            s.next_tx += 1;
            TxReceipt {
                transaction_id: format!("0x{:064x}", s.next_tx),
                accepted: !s.rejected.contains(&op),
            }
        })
    }
}

#[async_trait]
impl Ledger for StaticLedger {
    async fn collateral(&self, owner: Address, asset: Address) -> Result<BigUint, LedgerError> {
        self.record(LedgerCall::Collateral { owner, asset }, LedgerOp::Collateral)?;
        Ok(self.collateral_of(owner, asset))
    }

    async fn token_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<BigUint, LedgerError> {
        self.record(LedgerCall::TokenBalance { token, owner }, LedgerOp::Balance)?;
        Ok(self.with_state(|s| s.balances.get(&(owner, token)).cloned().unwrap_or_default()))
    }

    async fn native_balance(&self, owner: Address) -> Result<BigUint, LedgerError> {
        self.record(LedgerCall::NativeBalance { owner }, LedgerOp::Balance)?;
        Ok(self.with_state(|s| {
            s.balances
                .get(&(owner, Address::ZERO))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, LedgerError> {
        self.record(LedgerCall::TokenDecimals { token }, LedgerOp::Decimals)?;
        self.with_state(|s| s.decimals.get(&token).copied())
            .ok_or_else(|| LedgerError::Decode(format!("no decimals() on {token}")))
    }

    async fn token_address(&self, symbol: StableSymbol) -> Result<Option<Address>, LedgerError> {
        self.record(LedgerCall::TokenAddress { symbol }, LedgerOp::TokenAddress)?;
        Ok(self.with_state(|s| s.token_addresses.get(&symbol).copied()))
    }

    async fn approve(
        &self,
        _key: &SigningKey,
        token: Address,
        amount: &BigUint,
    ) -> Result<TxReceipt, LedgerError> {
        self.record(
            LedgerCall::Approve {
                token,
                amount: amount.clone(),
            },
            LedgerOp::Approve,
        )?;
        Ok(self.receipt(LedgerOp::Approve))
    }

    async fn deposit(
        &self,
        key: &SigningKey,
        amount: &BigUint,
        token: Option<Address>,
    ) -> Result<TxReceipt, LedgerError> {
        self.record(
            LedgerCall::Deposit {
                amount: amount.clone(),
                token,
            },
            LedgerOp::Deposit,
        )?;
        let receipt = self.receipt(LedgerOp::Deposit);
        if receipt.accepted {
            let owner = key.address();
            let asset = token.unwrap_or(Address::ZERO);
            self.with_state(|s| {
                let balance = s.balances.entry((owner, asset)).or_default();
                if *balance >= *amount {
                    *balance -= amount;
                }
                *s.collateral.entry((owner, asset)).or_default() += amount;
            });
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[tokio::test]
    async fn test_static_ledger_records_calls() {
        let ledger = StaticLedger::new();
        let owner = Address([7u8; 20]);
        ledger.set_balance(owner, Address::ZERO, BigUint::from(5u8));

        assert_eq!(ledger.native_balance(owner).await.unwrap(), BigUint::from(5u8));
        assert_eq!(
            ledger.calls(),
            vec![LedgerCall::NativeBalance { owner }]
        );
        assert!(ledger.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_static_ledger_failure_injection() {
        let ledger = StaticLedger::new();
        ledger.fail(LedgerOp::Collateral, "connection refused");
        let err = ledger
            .collateral(Address::ZERO, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport(ref m) if m == "connection refused"));
    }

    #[tokio::test]
    async fn test_static_ledger_deposit_credits_collateral() {
        let ledger = StaticLedger::new();
        let key = SigningKey::parse(KEY).unwrap();
        let owner = key.address();
        ledger.set_balance(owner, Address::ZERO, BigUint::from(10u8));

        let receipt = ledger.deposit(&key, &BigUint::from(4u8), None).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(ledger.collateral_of(owner, Address::ZERO), BigUint::from(4u8));
        assert_eq!(ledger.native_balance(owner).await.unwrap(), BigUint::from(6u8));
    }

    #[tokio::test]
    async fn test_missing_decimals_is_an_error() {
        let ledger = StaticLedger::new();
        assert!(ledger.token_decimals(Address([1u8; 20])).await.is_err());
    }
}

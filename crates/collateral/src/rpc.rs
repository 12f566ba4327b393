//! [`Ledger`] over an Ethereum JSON-RPC endpoint, on an alloy provider.
//!
//! Writes go through a provider carrying a local-signer wallet for the
//! caller's key and are awaited until their receipt, so the deposit never
//! runs ahead of its approval.

use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address as EvmAddress, B256, U256};
use alloy::providers::{PendingTransactionError, Provider, ProviderBuilder, WatchTxError};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::eth::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use num_bigint::BigUint;
use url::Url;

use crate::address::Address;
use crate::chain::ChainInfo;
use crate::config::Config;
use crate::error::{Error, LedgerError};
use crate::fourmica::{fetch_core_params, CoreParams};
use crate::key::SigningKey;
use crate::ledger::{Ledger, StableSymbol, TxReceipt};

/// Headroom added on top of `eth_estimateGas`, in percent.
const GAS_HEADROOM_PERCENT: u64 = 20;

mod erc20 {
    alloy_sol_types::sol! {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

mod escrow {
    alloy_sol_types::sol! {
        function USDC() external view returns (address);
        function USDT() external view returns (address);
        function getUserAssetCollateral(address user, address asset) external view returns (uint256);
        function deposit() external payable;
        function depositStablecoin(address asset, uint256 amount) external;
    }
}

/// Where to reach a chain and the escrow serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub rpc_url: String,
    pub chain_id: u64,
    pub escrow: Address,
}

impl Endpoints {
    /// Config overrides win, then the 4mica core params, then the catalog.
    pub fn resolve(
        config: &Config,
        chain: &ChainInfo,
        params: Option<&CoreParams>,
    ) -> Result<Self, Error> {
        if let Some(params) = params {
            if params.chain_id != chain.chain_id {
                return Err(Error::Config(format!(
                    "4mica API for {} serves chain id {}, expected {}",
                    chain.key, params.chain_id, chain.chain_id
                )));
            }
        }
        let escrow = config
            .escrow_override()
            .or_else(|| params.map(|p| p.contract_address).filter(|a| !a.is_zero()))
            .ok_or_else(|| {
                Error::Config(format!("no escrow contract configured for {}", chain.key))
            })?;
        let rpc_url = config
            .rpc_url
            .clone()
            .or_else(|| params.and_then(|p| p.ethereum_http_rpc_url.clone()))
            .unwrap_or_else(|| chain.rpc_url.clone());
        Ok(Self {
            rpc_url,
            chain_id: chain.chain_id,
            escrow,
        })
    }
}

/// JSON-RPC backed ledger for one chain and one escrow contract.
pub struct RpcLedger {
    url: Url,
    provider: Box<dyn Provider>,
    chain_id: u64,
    escrow: Address,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(endpoints: &Endpoints) -> Result<Self, Error> {
        let url = Url::parse(&endpoints.rpc_url)
            .map_err(|e| Error::Config(format!("invalid RPC URL {}: {e}", endpoints.rpc_url)))?;
        let provider = ProviderBuilder::new().connect_http(url.clone());
        let defaults = Config::default();
        Ok(Self {
            url,
            provider: Box::new(provider),
            chain_id: endpoints.chain_id,
            escrow: endpoints.escrow,
            confirmation_timeout: defaults.confirmation_timeout(),
            poll_interval: defaults.poll_interval(),
        })
    }

    /// Resolve the endpoints for `chain` and connect. The chain's 4mica API is
    /// only asked when the config names no escrow contract.
    pub async fn connect(config: &Config, chain: &ChainInfo) -> Result<Self, Error> {
        let params = match (config.escrow_override(), &chain.fourmica_api_url) {
            (None, Some(api_url)) => Some(
                fetch_core_params(&reqwest::Client::new(), api_url, &config.core_params_method)
                    .await?,
            ),
            _ => None,
        };
        let endpoints = Endpoints::resolve(config, chain, params.as_ref())?;
        tracing::debug!(
            rpc_url = %endpoints.rpc_url,
            escrow = %endpoints.escrow,
            "resolved ledger endpoints"
        );
        Ok(Self::new(&endpoints)?
            .with_timing(config.confirmation_timeout(), config.poll_interval()))
    }

    pub fn with_timing(mut self, confirmation_timeout: Duration, poll_interval: Duration) -> Self {
        self.confirmation_timeout = confirmation_timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn escrow(&self) -> Address {
        self.escrow
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        Ok(self.provider.call(request(to, data)).await?.to_vec())
    }

    /// Sign with `key`, send, and wait for the receipt.
    async fn submit(
        &self,
        operation: &'static str,
        key: &SigningKey,
        tx: TransactionRequest,
    ) -> Result<TxReceipt, LedgerError> {
        let signer = key.local_signer();
        let from = signer.address();
        let client = RpcClient::new_http(self.url.clone()).with_poll_interval(self.poll_interval);
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_client(client);

        let tx = tx.from(from).with_chain_id(self.chain_id);
        let estimate = provider.estimate_gas(tx.clone()).await?;
        let tx = tx.with_gas_limit(gas_with_headroom(estimate)?);

        let pending = provider.send_transaction(tx).await?;
        let hash = *pending.tx_hash();
        tracing::info!(%operation, tx = %hash, "transaction submitted");

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|e| confirmation_error(hash, e))?;
        Ok(receipt_outcome(&receipt))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn collateral(&self, owner: Address, asset: Address) -> Result<BigUint, LedgerError> {
        let call = escrow::getUserAssetCollateralCall {
            user: evm(owner),
            asset: evm(asset),
        };
        let data = self.call(self.escrow, call.abi_encode()).await?;
        Ok(to_biguint(decode::<escrow::getUserAssetCollateralCall>(&data)?))
    }

    async fn token_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<BigUint, LedgerError> {
        let call = erc20::balanceOfCall { account: evm(owner) };
        let data = self.call(token, call.abi_encode()).await?;
        Ok(to_biguint(decode::<erc20::balanceOfCall>(&data)?))
    }

    async fn native_balance(&self, owner: Address) -> Result<BigUint, LedgerError> {
        Ok(to_biguint(self.provider.get_balance(evm(owner)).await?))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, LedgerError> {
        let data = self.call(token, erc20::decimalsCall {}.abi_encode()).await?;
        decode::<erc20::decimalsCall>(&data)
    }

    async fn token_address(&self, symbol: StableSymbol) -> Result<Option<Address>, LedgerError> {
        let token = match symbol {
            StableSymbol::Usdc => {
                let data = self.call(self.escrow, escrow::USDCCall {}.abi_encode()).await?;
                if data.is_empty() {
                    return Ok(None);
                }
                decode::<escrow::USDCCall>(&data)?
            }
            StableSymbol::Usdt => {
                let data = self.call(self.escrow, escrow::USDTCall {}.abi_encode()).await?;
                if data.is_empty() {
                    return Ok(None);
                }
                decode::<escrow::USDTCall>(&data)?
            }
        };
        Ok(Some(Address(token.into_array())))
    }

    async fn approve(
        &self,
        key: &SigningKey,
        token: Address,
        amount: &BigUint,
    ) -> Result<TxReceipt, LedgerError> {
        let call = erc20::approveCall {
            spender: evm(self.escrow),
            amount: to_u256(amount)?,
        };
        self.submit("approve", key, request(token, call.abi_encode()))
            .await
    }

    async fn deposit(
        &self,
        key: &SigningKey,
        amount: &BigUint,
        token: Option<Address>,
    ) -> Result<TxReceipt, LedgerError> {
        let tx = match token {
            Some(token) => {
                let call = escrow::depositStablecoinCall {
                    asset: evm(token),
                    amount: to_u256(amount)?,
                };
                request(self.escrow, call.abi_encode())
            }
            None => request(self.escrow, escrow::depositCall {}.abi_encode())
                .value(to_u256(amount)?),
        };
        self.submit("deposit", key, tx).await
    }
}

fn request(to: Address, data: Vec<u8>) -> TransactionRequest {
    TransactionRequest::default()
        .to(evm(to))
        .input(TransactionInput::new(data.into()))
}

fn decode<C: SolCall>(data: &[u8]) -> Result<C::Return, LedgerError> {
    C::abi_decode_returns(data).map_err(|e| LedgerError::Decode(format!("{}: {e}", C::SIGNATURE)))
}

fn evm(address: Address) -> EvmAddress {
    EvmAddress::from(address.0)
}

fn to_u256(amount: &BigUint) -> Result<U256, LedgerError> {
    U256::try_from_be_slice(&amount.to_bytes_be())
        .ok_or_else(|| LedgerError::Decode(format!("amount does not fit in uint256: {amount}")))
}

fn to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

fn gas_with_headroom(estimate: u64) -> Result<u64, LedgerError> {
    estimate
        .checked_mul(100 + GAS_HEADROOM_PERCENT)
        .map(|gas| gas / 100)
        .ok_or_else(|| LedgerError::Decode(format!("gas estimate out of range: {estimate}")))
}

/// A mined receipt counts as accepted only when its status is success.
fn receipt_outcome(receipt: &TransactionReceipt) -> TxReceipt {
    TxReceipt {
        transaction_id: receipt.transaction_hash.to_string(),
        accepted: receipt.status(),
    }
}

fn confirmation_error(hash: B256, err: PendingTransactionError) -> LedgerError {
    match err {
        PendingTransactionError::TxWatcher(WatchTxError::Timeout) => LedgerError::Timeout {
            transaction_id: hash.to_string(),
        },
        PendingTransactionError::TransportError(err) => err.into(),
        other => LedgerError::Transport(other.to_string()),
    }
}

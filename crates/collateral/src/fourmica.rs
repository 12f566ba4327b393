//! 4mica core API: publishes which escrow contract serves a chain.

use serde::Deserialize;
use serde_json::json;

use crate::address::Address;
use crate::error::LedgerError;

/// Deployment parameters published by a 4mica core API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoreParams {
    #[serde(alias = "chainId")]
    pub chain_id: u64,
    #[serde(alias = "contractAddress")]
    pub contract_address: Address,
    #[serde(default, alias = "ethereumHttpRpcUrl")]
    pub ethereum_http_rpc_url: Option<String>,
}

#[derive(Deserialize)]
struct Response<T> {
    result: Option<T>,
}

/// Ask the core API at `api_url` for its deployment parameters.
///
/// A JSON-RPC error in the body is reported even when the HTTP status is not
/// a success.
pub async fn fetch_core_params(
    http: &reqwest::Client,
    api_url: &str,
    method: &str,
) -> Result<CoreParams, LedgerError> {
    tracing::debug!(%api_url, %method, "fetching 4mica core params");
    let response = http
        .post(api_url)
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": [] }))
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;

    if let Some(err) = LedgerError::from_rpc_body(&body) {
        return Err(err);
    }
    if !status.is_success() {
        return Err(LedgerError::Transport(format!("HTTP {status}: {body}")));
    }
    serde_json::from_str::<Response<CoreParams>>(&body)
        .map_err(|e| LedgerError::Decode(format!("{method}: {e}")))?
        .result
        .ok_or_else(|| LedgerError::Decode(format!("{method} returned no result")))
}

use thiserror::Error;

/// Unified error type for the collateral deposit flow.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed amount: {0}")]
    MalformedAmount(String),

    #[error("{asset} is not supported on {chain}")]
    UnsupportedAsset { asset: String, chain: String },

    #[error("ledger unavailable: {0}")]
    RpcUnavailable(#[from] LedgerError),

    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Errors raised by a remote ledger client, read or write.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("{operation} transaction {transaction_id} was not accepted")]
    Rejected {
        operation: String,
        transaction_id: String,
    },

    #[error("timed out waiting for transaction {transaction_id}")]
    Timeout { transaction_id: String },
}

#[cfg(feature = "rpc")]
impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::Transport(err.to_string())
    }
}

#[cfg(feature = "rpc")]
impl From<alloy::transports::TransportError> for LedgerError {
    fn from(err: alloy::transports::TransportError) -> Self {
        use alloy::transports::{RpcError, TransportErrorKind};

        match err {
            RpcError::ErrorResp(payload) => LedgerError::Rpc {
                code: payload.code,
                message: payload.message.into_owned(),
            },
            // Nodes behind gateways often pair a 4xx/5xx with a JSON-RPC error body.
            RpcError::Transport(TransportErrorKind::HttpError(http)) => {
                LedgerError::from_rpc_body(&http.body).unwrap_or_else(|| {
                    LedgerError::Transport(format!("HTTP {}: {}", http.status, http.body))
                })
            }
            other => LedgerError::Transport(other.to_string()),
        }
    }
}

#[cfg(feature = "rpc")]
impl LedgerError {
    /// The `error` member of a JSON-RPC response body, if it has one.
    pub(crate) fn from_rpc_body(body: &str) -> Option<Self> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            error: Option<ErrorBody>,
        }

        #[derive(serde::Deserialize)]
        struct ErrorBody {
            code: i64,
            message: String,
        }

        let error = serde_json::from_str::<Envelope>(body).ok()?.error?;
        Some(LedgerError::Rpc {
            code: error.code,
            message: error.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "rpc")]
    #[test]
    fn test_error_from_rpc_body() {
        let err = LedgerError::from_rpc_body(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
        )
        .unwrap();
        assert_eq!(err.to_string(), "rpc error -32000: execution reverted");

        assert!(LedgerError::from_rpc_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#).is_none());
        assert!(LedgerError::from_rpc_body("<html>bad gateway</html>").is_none());
    }

    #[test]
    fn test_unsupported_asset_message() {
        let err = Error::UnsupportedAsset {
            asset: "USDT".to_string(),
            chain: "Polygon Amoy".to_string(),
        };
        assert_eq!(err.to_string(), "USDT is not supported on Polygon Amoy");
    }

    #[cfg(feature = "rpc")]
    #[test]
    fn test_transport_error_mapping() {
        use alloy::rpc::json_rpc::ErrorPayload;
        use alloy::transports::{RpcError, TransportErrorKind};

        let err: LedgerError = RpcError::<TransportErrorKind>::ErrorResp(ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: None,
        })
        .into();
        assert!(matches!(err, LedgerError::Rpc { code: 3, ref message } if message == "execution reverted"));

        let err: LedgerError = TransportErrorKind::http_error(
            503,
            r#"{"jsonrpc":"2.0","id":7,"error":{"code":-32005,"message":"rate limited"}}"#.to_string(),
        )
        .into();
        assert!(matches!(err, LedgerError::Rpc { code: -32005, ref message } if message == "rate limited"));

        let err: LedgerError = TransportErrorKind::http_error(502, "bad gateway".to_string()).into();
        assert_eq!(err.to_string(), "transport error: HTTP 502: bad gateway");
    }
}

use std::fmt;

use k256::ecdsa;
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::address::{keccak256, Address};
use crate::error::Error;

/// A secp256k1 wallet key used to sign approve and deposit transactions.
///
/// The raw key is never printed; `Debug` and [`SigningKey::redacted`] show a
/// shortened form.
#[derive(Clone)]
pub struct SigningKey {
    hex: String,
    inner: ecdsa::SigningKey,
}

impl SigningKey {
    /// Parse a 32-byte hex key, with or without a `0x` prefix.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.len() != 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidKey(
                "expected a 32-byte hex private key".to_string(),
            ));
        }
        let bytes = hex::decode(digits).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let inner = ecdsa::SigningKey::from_slice(&bytes)
            .map_err(|_| Error::InvalidKey("not a valid secp256k1 scalar".to_string()))?;
        Ok(Self {
            hex: format!("0x{}", digits.to_ascii_lowercase()),
            inner,
        })
    }

    /// Derive the EVM address: keccak256 of the uncompressed public key, last 20 bytes.
    pub fn address(&self) -> Address {
        let point = self.inner.verifying_key().as_affine().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        Address(addr)
    }

    /// `0x1234...abcd`, safe for logs.
    pub fn redacted(&self) -> String {
        format!("{}...{}", &self.hex[..6], &self.hex[self.hex.len() - 4..])
    }

    /// Local signer for submitting transactions through an alloy wallet.
    #[cfg(feature = "rpc")]
    pub fn local_signer(&self) -> alloy_signer_local::PrivateKeySigner {
        alloy_signer_local::PrivateKeySigner::from_signing_key(self.inner.clone())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({})", self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (first account of the default test mnemonic).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_derive_address() {
        let key = SigningKey::parse(DEV_KEY).unwrap();
        assert_eq!(
            key.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_prefix_optional() {
        let with = SigningKey::parse(DEV_KEY).unwrap();
        let without = SigningKey::parse(&DEV_KEY[2..]).unwrap();
        assert_eq!(with.address(), without.address());
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(SigningKey::parse("").is_err());
        assert!(SigningKey::parse("0x1234").is_err());
        assert!(SigningKey::parse(&"g".repeat(64)).is_err());
        // Zero is not a valid scalar.
        assert!(SigningKey::parse(&"0".repeat(64)).is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SigningKey::parse(DEV_KEY).unwrap();
        let debug = format!("{key:?}");
        assert_eq!(debug, "SigningKey(0xac09...ff80)");
        assert!(!debug.contains("bec39a17"));
    }

    #[cfg(feature = "rpc")]
    #[test]
    fn test_local_signer_matches_address() {
        let key = SigningKey::parse(DEV_KEY).unwrap();
        let signer = key.local_signer();
        assert_eq!(signer.address().into_array(), key.address().0);
    }
}

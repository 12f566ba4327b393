use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_keccak::{Hasher, Keccak};

/// A 20-byte EVM account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address, used as the native-asset sentinel.
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Lowercase `0x`-prefixed hex, the form JSON-RPC nodes expect.
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// EIP-55: a hex letter is uppercased when the matching nibble of the hash
/// of the lowercase form is 8 or more.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let checksummed: String = lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let shift = if i % 2 == 0 { 4 } else { 0 };
                if (hash[i / 2] >> shift) & 0x0f >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect();
        write!(f, "0x{checksummed}")
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Error returned when a string is not a 20-byte hex address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct ParseAddressError(pub String);

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 40 {
            return Err(ParseAddressError(s.to_string()));
        }
        let bytes = hex::decode(digits).map_err(|_| ParseAddressError(s.to_string()))?;
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        Ok(Address(addr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eip55_display() {
        let addr: Address = "0xdac17f958d2ee523a2206206994597c13d831ec7".parse().unwrap();
        assert_eq!(addr.to_string(), "0xdAC17F958D2ee523a2206206994597C13D831ec7");
        assert_eq!(addr.to_lower_hex(), "0xdac17f958d2ee523a2206206994597c13d831ec7");
    }

    #[test]
    fn test_keccak256() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_parse_case_insensitive() {
        let lower: Address = "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238".parse().unwrap();
        let mixed: Address = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".parse().unwrap();
        let bare: Address = "1C7D4B196CB0C7B01D743FBC6116A902379C7238".parse().unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(lower, bare);
    }

    #[test]
    fn test_zero_address() {
        let zero: Address = "0x0000000000000000000000000000000000000000".parse().unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Address::ZERO);
        assert!(!Address([1u8; 20]).is_zero());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz17f958d2ee523a2206206994597c13d831ec7".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
    }
}

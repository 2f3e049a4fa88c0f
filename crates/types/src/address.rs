/// Hex-encoded identifiers: account addresses, transaction hashes, role ids

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{OtterError, OtterResult, ADMIN_ROLE, ISSUER_ROLE, VERIFIER_ROLE};

/// Lower-case `0x`-prefixed hex encoding
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed (or bare) hex of any even length
pub fn decode_hex(kind: &str, input: &str) -> OtterResult<Vec<u8>> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    hex::decode(digits).map_err(|e| OtterError::invalid_hex(kind, input, &e.to_string()))
}

fn decode_fixed<const N: usize>(kind: &str, input: &str) -> OtterResult<[u8; N]> {
    let bytes = decode_hex(kind, input)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        OtterError::invalid_hex(kind, input, &format!("expected {} bytes, got {}", N, bytes.len()))
    })
}

// ============================================================================
// Address
// ============================================================================

/// 20-byte account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Sentinel used by the registry for vaults that do not exist yet
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// `None` for the zero sentinel
    pub fn non_zero(self) -> Option<Address> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Shortened `0x1234…abcd` form for compact display
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = OtterError;

    fn from_str(s: &str) -> OtterResult<Self> {
        decode_fixed::<20>("address", s.trim()).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

// ============================================================================
// Transaction Hash
// ============================================================================

/// 32-byte transaction hash returned by the wallet on submission
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = OtterError;

    fn from_str(s: &str) -> OtterResult<Self> {
        decode_fixed::<32>("transaction hash", s.trim()).map(TxHash)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

// ============================================================================
// Role Identifier
// ============================================================================

/// Access-control role identifier (`bytes32`)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleId(pub [u8; 32]);

impl RoleId {
    pub const ADMIN: RoleId = RoleId(ADMIN_ROLE);
    pub const VERIFIER: RoleId = RoleId(VERIFIER_ROLE);
    pub const ISSUER: RoleId = RoleId(ISSUER_ROLE);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleId({})", self)
    }
}

// ============================================================================
// Serde (string form)
// ============================================================================

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Address);
hex_serde!(TxHash);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr: Address = "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0".parse().unwrap();
        assert_eq!(addr.to_string(), "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0");
        assert_eq!(addr.short(), "0x9fe4…a6e0");
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_zero_sentinel() {
        let zero: Address = "0x0000000000000000000000000000000000000000".parse().unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Address::ZERO);
        assert_eq!(zero.non_zero(), None);
    }

    #[test]
    fn test_invalid_addresses() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz46736679d2d9a65f0992f2272de9f3c7fa6e0".parse::<Address>().is_err());
        assert!("0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e".parse::<Address>().is_err());
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(encode_hex(&[0x00, 0xab, 0x7f]), "0x00ab7f");
        assert_eq!(decode_hex("data", "0X00AB7f").unwrap(), vec![0x00, 0xab, 0x7f]);
        assert_eq!(decode_hex("data", "0x").unwrap(), Vec::<u8>::new());
        assert!(matches!(decode_hex("data", "0xabc"), Err(OtterError::InvalidHex { .. })));
        assert!(matches!(decode_hex("data", "0xzz"), Err(OtterError::InvalidHex { .. })));
    }

    #[test]
    fn test_role_ids() {
        assert_eq!(
            RoleId::VERIFIER.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
        assert_eq!(RoleId::ADMIN.as_bytes(), &[0u8; 32]);
        assert_eq!(RoleId::ISSUER.as_bytes()[31], 2);
    }

    #[test]
    fn test_address_serde() {
        let addr: Address = "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x5fbdb2315678afecb367f032d93f642f64180aa3\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}

//! Contract address value type.
//!
//! Addresses are parsed once and compared by their 20 raw bytes, so
//! `0xabc…` and `0xABC…` are the same address. The canonical text form is the
//! EIP-55 mixed-case checksum, which is also what gets persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A 20-byte contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(alloy_primitives::Address);

impl Address {
    /// The zero address
    pub const ZERO: Self = Self(alloy_primitives::Address::ZERO);

    /// Parse from hex text, with or without `0x`, in any letter case
    pub fn parse(s: &str) -> Result<Self> {
        alloy_primitives::Address::from_str(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))
    }

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(alloy_primitives::Address::new(bytes))
    }

    /// Canonical EIP-55 checksummed string
    pub fn eip55_string(&self) -> String {
        self.0.to_checksum(None)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Shortened form for log lines
    pub fn short(&self) -> String {
        let full = self.eip55_string();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl From<alloy_primitives::Address> for Address {
    fn from(address: alloy_primitives::Address) -> Self {
        Self(address)
    }
}

impl From<Address> for alloy_primitives::Address {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.eip55_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.eip55_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

    #[test]
    fn test_parse_is_case_insensitive() {
        let mixed = Address::parse(DAI).unwrap();
        let lower = Address::parse(&DAI.to_lowercase()).unwrap();
        let upper = Address::parse(&format!("0x{}", &DAI[2..].to_uppercase())).unwrap();

        assert_eq!(mixed, lower);
        assert_eq!(mixed, upper);
    }

    #[test]
    fn test_eip55_string() {
        let address = Address::parse(&DAI.to_lowercase()).unwrap();
        assert_eq!(address.eip55_string(), DAI);
        assert_eq!(address.to_string(), DAI);
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(Address::parse("0x1234"), Err(Error::InvalidAddress(_))));
        assert!(Address::parse("not an address").is_err());
    }

    #[test]
    fn test_serde_uses_checksum() {
        let address = Address::parse(&DAI.to_lowercase()).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", DAI));

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }

    #[test]
    fn test_short() {
        let address = Address::parse(DAI).unwrap();
        assert_eq!(address.short(), "0x6B17…1d0F");
    }
}

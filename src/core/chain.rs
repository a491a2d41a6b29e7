//! Chain identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric EVM chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u64);

impl ChainId {
    /// Ethereum mainnet
    pub const MAINNET: Self = Self(1);
    /// Polygon PoS
    pub const POLYGON: Self = Self(137);
    /// Sepolia testnet
    pub const SEPOLIA: Self = Self(11_155_111);

    /// Create from a raw chain id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

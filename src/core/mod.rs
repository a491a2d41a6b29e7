//! Core value types shared by the store.
//!
//! - Contract addresses compared in canonical (EIP-55) form
//! - Numeric chain identifiers

pub mod address;
pub mod chain;

pub use address::*;
pub use chain::*;

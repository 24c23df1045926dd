//! Common identity types shared by the registry, ledger, and gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identifier of one of the two chains.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 20-byte account or contract address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Parse from a hex string, with or without `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, crate::error::BridgeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 40 {
            return Err(crate::error::BridgeError::InvalidAddress {
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let bytes = hex::decode(s).map_err(|e| crate::error::BridgeError::InvalidAddress {
            reason: e.to_string(),
        })?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Identity of a token collection: the chain it lives on plus its address.
///
/// Identities are never reused: once a mapping for an origin token is
/// unregistered, that `(chain, address)` pair stays retired.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenKey {
    pub chain: ChainId,
    pub address: Address,
}

impl TokenKey {
    pub fn new(chain: ChainId, address: Address) -> Self {
        TokenKey { chain, address }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

/// Item identifier within a collection (ERC721 token id / ERC1155 id).
pub type ItemId = u128;

/// Which accounting mode a collection uses.
///
/// Non-fungible items carry exactly one unit per id; multi-fungible items
/// carry arbitrary amounts. Both share the same ledger path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    NonFungible,
    MultiFungible,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::NonFungible => "non-fungible",
            AssetKind::MultiFungible => "multi-fungible",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Error types for the bridge core.
//!
//! Every state-changing operation either completes or fails with one of
//! these errors and no partial effect.

use thiserror::Error;

use crate::registry::RegistrationState;
use crate::types::{Address, ItemId, TokenKey};
use crate::upgrade::BeaconId;

#[derive(Error, Debug, PartialEq)]
pub enum BridgeError {
    // ========================================================================
    // Registry Errors
    // ========================================================================
    #[error("no live pegged mapping for origin token {origin}")]
    NotFound { origin: TokenKey },

    #[error("pegged mapping already live for origin token {origin}")]
    AlreadyDeployed { origin: TokenKey },

    #[error("invalid registry state for {origin}: {state}")]
    InvalidState {
        origin: TokenKey,
        state: RegistrationState,
    },

    #[error("unauthorized: {caller} is not the administrator of {origin}")]
    Unauthorized { origin: TokenKey, caller: Address },

    // ========================================================================
    // Ledger Errors
    // ========================================================================
    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("length mismatch: {item_ids} item ids vs {amounts} amounts")]
    LengthMismatch { item_ids: usize, amounts: usize },

    #[error("insufficient locked balance for item {item_id}: locked {locked}, requested {requested}")]
    InsufficientLocked {
        item_id: ItemId,
        locked: u128,
        requested: u128,
    },

    // ========================================================================
    // Pegged Asset Errors
    // ========================================================================
    #[error("unauthorized: {caller} is not the collection controller")]
    UnauthorizedController { caller: Address },

    #[error("insufficient balance for item {item_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        item_id: ItemId,
        balance: u128,
        requested: u128,
    },

    #[error("item {item_id} already exists and cannot be re-minted")]
    AlreadyExists { item_id: ItemId },

    #[error("unknown token collection {token}")]
    UnknownToken { token: TokenKey },

    #[error("token collection {token} already exists")]
    CollectionExists { token: TokenKey },

    // ========================================================================
    // Gateway Errors
    // ========================================================================
    #[error("replay detected: record {record_id} already consumed")]
    ReplayDetected { record_id: String },

    // ========================================================================
    // Upgrade Errors
    // ========================================================================
    #[error("unknown beacon {beacon}")]
    UnknownBeacon { beacon: BeaconId },

    #[error("unknown proxy instance {instance}")]
    UnknownInstance { instance: Address },

    #[error("proxy instance {instance} already attached to beacon {beacon}")]
    InstanceExists { instance: Address, beacon: BeaconId },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },
}

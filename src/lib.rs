//! Accounting and registry core for a two-chain NFT bridge.
//!
//! This crate models the per-chain state that lets ERC721/ERC1155-style
//! assets move between two independently operated ledgers while keeping a
//! 1:1 correspondence between an origin asset and its pegged counterpart:
//!
//! - **Registry** - maps an origin token to its local pegged counterpart,
//!   tracks the registration lifecycle, and holds per-token callback
//!   overrides.
//! - **LockLedger** - escrow accounting for locked item amounts, plus the
//!   replay seen-set and outgoing nonce counter.
//! - **PeggedToken** - mintable/burnable collections whose mint/burn
//!   authority is a single fixed controller.
//! - **BridgeGateway** - the façade a relay drives: `on_deposit`,
//!   `on_mirrored_release`, `on_withdraw_request`.
//! - **UpgradeCoordinator** - beacon indirection for atomically swapping
//!   the implementation behind many proxy instances.
//!
//! The chains' transaction execution, the relay process, and the token
//! standards' transfer hooks are external collaborators. Each chain's
//! state is one explicitly owned [`ChainState`], mutated by a single
//! writer; every operation either completes or fails atomically with no
//! partial effect, and the replay/balance checks hold independently of
//! relay delivery order.

pub mod error;
pub mod gateway;
pub mod hash;
pub mod ledger;
pub mod pegged;
pub mod registry;
pub mod types;
pub mod upgrade;

pub use error::BridgeError;
pub use gateway::{BridgeGateway, ChainState, DepositOutcome, ReleaseOutcome, TransferRecord};
pub use ledger::{LockLedger, LockedBalance};
pub use pegged::{PeggedAssets, PeggedToken};
pub use registry::{PeggedHandler, PeggedMapping, RegistrationState, Registry};
pub use types::{Address, AssetKind, ChainId, ItemId, TokenKey};
pub use upgrade::{BeaconId, UpgradeCoordinator};

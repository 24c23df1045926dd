//! Bridge gateway: the entry points a relay and users drive.
//!
//! The gateway holds no ledger state of its own. Every operation takes the
//! chain's explicitly owned [`ChainState`] and sequences calls into the
//! registry, the lock ledger, and the pegged collections so that a failing
//! call leaves all three untouched: validation runs first, then the one
//! fallible ledger mutation, then mutations that can no longer fail, and
//! the record id is consumed last.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::hash::{bytes32_to_hex, compute_record_id, mirror_address};
use crate::ledger::LockLedger;
use crate::pegged::{PeggedAssets, PeggedToken};
use crate::registry::{PeggedHandler, RegistrationState, Registry};
use crate::types::{Address, AssetKind, ChainId, ItemId, TokenKey};

/// The whole bridge state of one chain. One instance per chain, mutated by
/// exactly one writer at a time.
#[derive(Debug, Default, Clone)]
pub struct ChainState {
    pub registry: Registry,
    pub ledger: LockLedger,
    pub assets: PeggedAssets,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The unit of work a relay mirrors to the other chain.
///
/// Emitted as a deposit record when assets are locked and as a release
/// record when pegged assets are burned back; both directions share this
/// wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Chain the record was emitted on.
    pub src_chain: ChainId,
    /// Chain the relay must deliver it to.
    pub dest_chain: ChainId,
    /// Origin token identity (always the home-chain identity, on both legs).
    pub token: TokenKey,
    pub from_account: Address,
    pub item_ids: Vec<ItemId>,
    pub amounts: Vec<u128>,
    /// Recipient on the destination chain.
    pub to_chain_account: Address,
    pub kind: AssetKind,
    pub nonce: u64,
}

impl TransferRecord {
    /// Canonical 32-byte id, used for replay protection on the mirrored side.
    pub fn record_id(&self) -> [u8; 32] {
        compute_record_id(
            self.src_chain,
            self.dest_chain,
            &self.token,
            &self.from_account,
            &self.to_chain_account,
            &self.item_ids,
            &self.amounts,
            self.nonce,
        )
    }
}

/// Result of accepting an outbound transfer into escrow.
#[derive(Debug, Clone)]
pub struct DepositOutcome {
    /// The record a relay must mirror to the destination chain.
    pub record: TransferRecord,
    pub record_id: [u8; 32],
    /// Which handler owns the pegged side for this origin token. When a
    /// callback is registered the host must defer pegged-side effects to
    /// it; the escrow entry is recorded here regardless.
    pub handler: PeggedHandler,
}

/// Result of applying a mirrored release.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    /// The local pegged collection, when the pegged path applied.
    pub pegged: Option<TokenKey>,
    pub handler: PeggedHandler,
}

/// Stateless façade for one chain's bridge entry points.
#[derive(Debug, Clone, Copy)]
pub struct BridgeGateway {
    /// The chain this gateway serves.
    chain: ChainId,
    /// The gateway's own address: escrow target and controller of the
    /// pegged collections it deploys.
    address: Address,
}

fn check_items(
    kind: AssetKind,
    item_ids: &[ItemId],
    amounts: &[u128],
) -> Result<(), BridgeError> {
    if item_ids.len() != amounts.len() {
        return Err(BridgeError::LengthMismatch {
            item_ids: item_ids.len(),
            amounts: amounts.len(),
        });
    }
    for (item_id, amount) in item_ids.iter().zip(amounts.iter()) {
        if *amount == 0 {
            return Err(BridgeError::InvalidAmount {
                reason: format!("zero units for item {item_id}"),
            });
        }
        if kind == AssetKind::NonFungible && *amount != 1 {
            return Err(BridgeError::InvalidAmount {
                reason: format!("non-fungible item {item_id} moves exactly one unit"),
            });
        }
    }
    Ok(())
}

impl BridgeGateway {
    pub fn new(chain: ChainId, address: Address) -> Self {
        BridgeGateway { chain, address }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Accept a user transfer into escrow on this chain.
    ///
    /// Ensures a live mapping exists for the origin token (creating one in
    /// `Deploying` state on first observation, with the first depositor as
    /// administrator), records the batch in the lock ledger, and returns
    /// the record the relay must mirror to `dest_chain`.
    #[allow(clippy::too_many_arguments)]
    pub fn on_deposit(
        &self,
        state: &mut ChainState,
        token: Address,
        kind: AssetKind,
        from: Address,
        item_ids: &[ItemId],
        amounts: &[u128],
        to_chain_account: Address,
        dest_chain: ChainId,
    ) -> Result<DepositOutcome, BridgeError> {
        let origin = TokenKey::new(self.chain, token);
        check_items(kind, item_ids, amounts)?;

        // Retired identities reject new deposits permanently.
        let mapping_exists = match state.registry.get(&origin) {
            Some(mapping) if mapping.state == RegistrationState::Unregistered => {
                return Err(BridgeError::InvalidState {
                    origin,
                    state: mapping.state,
                });
            }
            Some(_) => true,
            None => false,
        };

        // The only fallible mutation; atomic across the batch.
        state.ledger.batch_deposit(origin, from, item_ids, amounts)?;

        if !mapping_exists {
            state.registry.begin_deployment(origin, from)?;
        }

        let nonce = state.ledger.next_nonce();
        let handler = state.registry.handler_for(&origin);
        let record = TransferRecord {
            src_chain: self.chain,
            dest_chain,
            token: origin,
            from_account: from,
            item_ids: item_ids.to_vec(),
            amounts: amounts.to_vec(),
            to_chain_account,
            kind,
            nonce,
        };
        let record_id = record.record_id();
        tracing::info!(
            nonce,
            token = %origin,
            from = %from,
            items = item_ids.len(),
            record_id = %bytes32_to_hex(&record_id),
            "deposit recorded"
        );
        Ok(DepositOutcome {
            record,
            record_id,
            handler,
        })
    }

    /// Apply a mirrored release submitted by the relay.
    ///
    /// If `token` is home on this chain the escrow is unlocked for `to`
    /// (bounded by the locked balance). Otherwise the pegged path applies:
    /// the pegged collection is deployed on first sight at its
    /// deterministic mirror address, the amounts are mirrored into this
    /// chain's ledger, and the items are minted to `to` unless a callback
    /// owns the pegged side. Re-delivery of a consumed record id fails
    /// with `ReplayDetected` regardless of delivery order.
    #[allow(clippy::too_many_arguments)]
    pub fn on_mirrored_release(
        &self,
        state: &mut ChainState,
        record_id: [u8; 32],
        token: TokenKey,
        kind: AssetKind,
        item_ids: &[ItemId],
        amounts: &[u128],
        to: Address,
    ) -> Result<ReleaseOutcome, BridgeError> {
        check_items(kind, item_ids, amounts)?;
        if state.ledger.is_consumed(&record_id) {
            return Err(BridgeError::ReplayDetected {
                record_id: bytes32_to_hex(&record_id),
            });
        }

        if token.chain == self.chain {
            // Unlock path: the implied owner of the locked position is the
            // release recipient.
            state.ledger.batch_withdraw(token, to, item_ids, amounts)?;
            state.ledger.mark_consumed(record_id)?;
            tracing::info!(
                token = %token,
                to = %to,
                items = item_ids.len(),
                record_id = %bytes32_to_hex(&record_id),
                "escrow released"
            );
            return Ok(ReleaseOutcome {
                pegged: None,
                handler: PeggedHandler::DefaultMintBurn,
            });
        }

        // Pegged path. Resolve or derive the local counterpart first, with
        // no mutation until everything is validated.
        let (pegged_key, needs_deployment) = match state.registry.get(&token) {
            Some(mapping) if mapping.state == RegistrationState::Unregistered => {
                return Err(BridgeError::InvalidState {
                    origin: token,
                    state: mapping.state,
                });
            }
            Some(mapping) => match mapping.pegged {
                Some(pegged) => (pegged, false),
                // Deployment was started but never completed; finish it at
                // the deterministic mirror address.
                None => (TokenKey::new(self.chain, mirror_address(&token)), true),
            },
            None => (TokenKey::new(self.chain, mirror_address(&token)), true),
        };
        let mapping_exists = state.registry.get(&token).is_some();
        let handler = state.registry.handler_for(&token);

        if handler == PeggedHandler::DefaultMintBurn {
            match state.assets.lookup(&pegged_key) {
                Some(collection) => collection.check_mint(item_ids, amounts)?,
                None if needs_deployment => {
                    // Validate against the empty collection we are about to
                    // create.
                    PeggedToken::new(pegged_key, kind, self.address)
                        .check_mint(item_ids, amounts)?
                }
                None => return Err(BridgeError::UnknownToken { token: pegged_key }),
            }
        }

        // The only fallible mutation; atomic across the batch.
        state.ledger.batch_deposit(token, to, item_ids, amounts)?;

        if !mapping_exists {
            state.registry.begin_deployment(token, self.address)?;
        }
        if needs_deployment {
            if !state.assets.contains(&pegged_key) {
                state.assets.create(pegged_key, kind, self.address)?;
            }
            state.registry.complete_deployment(&token, pegged_key)?;
        }
        if handler == PeggedHandler::DefaultMintBurn {
            state
                .assets
                .get_mut(&pegged_key)?
                .mint_batch(self.address, to, item_ids, amounts)?;
        }
        state.ledger.mark_consumed(record_id)?;
        tracing::info!(
            token = %token,
            pegged = %pegged_key,
            to = %to,
            items = item_ids.len(),
            record_id = %bytes32_to_hex(&record_id),
            "pegged release applied"
        );
        Ok(ReleaseOutcome {
            pegged: Some(pegged_key),
            handler,
        })
    }

    /// Burn pegged assets back toward their origin chain.
    ///
    /// Withdraws the mirrored ledger position for `from`, burns the pegged
    /// items, and returns the release record the relay must mirror to the
    /// origin chain (where it arrives as a mirrored release).
    pub fn on_withdraw_request(
        &self,
        state: &mut ChainState,
        pegged: Address,
        from: Address,
        item_ids: &[ItemId],
        amounts: &[u128],
        to_origin_account: Address,
    ) -> Result<DepositOutcome, BridgeError> {
        let pegged_key = TokenKey::new(self.chain, pegged);
        let origin = state
            .registry
            .resolve_origin(&pegged_key)
            .ok_or(BridgeError::UnknownToken { token: pegged_key })?;

        let collection = state.assets.get(&pegged_key)?;
        let kind = collection.kind();
        check_items(kind, item_ids, amounts)?;
        collection.check_burn(&from, item_ids, amounts)?;

        // The only fallible mutation; atomic across the batch.
        state.ledger.batch_withdraw(origin, from, item_ids, amounts)?;

        state
            .assets
            .get_mut(&pegged_key)?
            .burn_batch(self.address, from, item_ids, amounts)?;

        let nonce = state.ledger.next_nonce();
        let handler = state.registry.handler_for(&origin);
        let record = TransferRecord {
            src_chain: self.chain,
            dest_chain: origin.chain,
            token: origin,
            from_account: from,
            item_ids: item_ids.to_vec(),
            amounts: amounts.to_vec(),
            to_chain_account: to_origin_account,
            kind,
            nonce,
        };
        let record_id = record.record_id();
        tracing::info!(
            nonce,
            pegged = %pegged_key,
            origin = %origin,
            from = %from,
            items = item_ids.len(),
            record_id = %bytes32_to_hex(&record_id),
            "withdrawal recorded"
        );
        Ok(DepositOutcome {
            record,
            record_id,
            handler,
        })
    }
}

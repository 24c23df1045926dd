//! Pegged asset collections.
//!
//! A pegged collection is the minimal capability set the bridge needs from
//! the shared token standard: mint, burn, transfer, balance. Mint and burn
//! are restricted to a single controller fixed at creation (the local
//! gateway, or a registered callback's contract). Batch mint/burn validate
//! the whole batch before mutating anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::{Address, AssetKind, ItemId, TokenKey};

/// One pegged collection and its balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeggedToken {
    key: TokenKey,
    kind: AssetKind,
    /// Sole mint/burn authority, immutable after creation.
    controller: Address,
    /// item id -> holder -> balance, nonzero entries only.
    balances: BTreeMap<ItemId, BTreeMap<Address, u128>>,
    /// item id -> total supply, nonzero entries only.
    supply: BTreeMap<ItemId, u128>,
}

impl PeggedToken {
    pub fn new(key: TokenKey, kind: AssetKind, controller: Address) -> Self {
        PeggedToken {
            key,
            kind,
            controller,
            balances: BTreeMap::new(),
            supply: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &TokenKey {
        &self.key
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn controller(&self) -> &Address {
        &self.controller
    }

    pub fn balance_of(&self, owner: &Address, item_id: ItemId) -> u128 {
        self.balances
            .get(&item_id)
            .and_then(|holders| holders.get(owner).copied())
            .unwrap_or(0)
    }

    pub fn supply_of(&self, item_id: ItemId) -> u128 {
        self.supply.get(&item_id).copied().unwrap_or(0)
    }

    /// Validate a batch mint without mutating anything.
    ///
    /// Non-fungible collections mint exactly one unit per item id and
    /// reject re-minting an id with live supply, including duplicates
    /// within the batch itself.
    pub fn check_mint(&self, item_ids: &[ItemId], amounts: &[u128]) -> Result<(), BridgeError> {
        if item_ids.len() != amounts.len() {
            return Err(BridgeError::LengthMismatch {
                item_ids: item_ids.len(),
                amounts: amounts.len(),
            });
        }
        let mut pending: BTreeMap<ItemId, u128> = BTreeMap::new();
        for (item_id, amount) in item_ids.iter().zip(amounts.iter()) {
            if *amount == 0 {
                return Err(BridgeError::InvalidAmount {
                    reason: format!("mint of zero units for item {item_id}"),
                });
            }
            match self.kind {
                AssetKind::NonFungible => {
                    if *amount != 1 {
                        return Err(BridgeError::InvalidAmount {
                            reason: format!(
                                "non-fungible item {item_id} mints exactly one unit"
                            ),
                        });
                    }
                    if self.supply_of(*item_id) > 0 || pending.contains_key(item_id) {
                        return Err(BridgeError::AlreadyExists { item_id: *item_id });
                    }
                    pending.insert(*item_id, 1);
                }
                AssetKind::MultiFungible => {
                    let minted = pending.get(item_id).copied().unwrap_or(0);
                    let batch_total = minted
                        .checked_add(*amount)
                        .and_then(|t| self.supply_of(*item_id).checked_add(t).map(|_| t))
                        .ok_or_else(|| BridgeError::InvalidAmount {
                            reason: format!("supply overflow for item {item_id}"),
                        })?;
                    pending.insert(*item_id, batch_total);
                }
            }
        }
        Ok(())
    }

    /// Mint a batch to `owner`. Controller-only, all-or-nothing.
    pub fn mint_batch(
        &mut self,
        caller: Address,
        owner: Address,
        item_ids: &[ItemId],
        amounts: &[u128],
    ) -> Result<(), BridgeError> {
        if caller != self.controller {
            return Err(BridgeError::UnauthorizedController { caller });
        }
        self.check_mint(item_ids, amounts)?;
        for (item_id, amount) in item_ids.iter().zip(amounts.iter()) {
            let balance = self
                .balances
                .entry(*item_id)
                .or_default()
                .entry(owner)
                .or_insert(0);
            *balance += amount;
            *self.supply.entry(*item_id).or_insert(0) += amount;
        }
        tracing::debug!(token = %self.key, owner = %owner, items = item_ids.len(), "mint");
        Ok(())
    }

    /// Validate a batch burn against `owner`'s balances without mutating.
    pub fn check_burn(
        &self,
        owner: &Address,
        item_ids: &[ItemId],
        amounts: &[u128],
    ) -> Result<(), BridgeError> {
        if item_ids.len() != amounts.len() {
            return Err(BridgeError::LengthMismatch {
                item_ids: item_ids.len(),
                amounts: amounts.len(),
            });
        }
        let mut required: BTreeMap<ItemId, u128> = BTreeMap::new();
        for (item_id, amount) in item_ids.iter().zip(amounts.iter()) {
            if *amount == 0 {
                return Err(BridgeError::InvalidAmount {
                    reason: format!("burn of zero units for item {item_id}"),
                });
            }
            let total = required.entry(*item_id).or_insert(0);
            *total = total
                .checked_add(*amount)
                .ok_or_else(|| BridgeError::InvalidAmount {
                    reason: format!("burn amount overflow for item {item_id}"),
                })?;
            let balance = self.balance_of(owner, *item_id);
            if *total > balance {
                return Err(BridgeError::InsufficientBalance {
                    item_id: *item_id,
                    balance,
                    requested: *total,
                });
            }
        }
        Ok(())
    }

    /// Burn a batch from `owner`. Controller-only, all-or-nothing.
    pub fn burn_batch(
        &mut self,
        caller: Address,
        owner: Address,
        item_ids: &[ItemId],
        amounts: &[u128],
    ) -> Result<(), BridgeError> {
        if caller != self.controller {
            return Err(BridgeError::UnauthorizedController { caller });
        }
        self.check_burn(&owner, item_ids, amounts)?;
        for (item_id, amount) in item_ids.iter().zip(amounts.iter()) {
            if let Some(holders) = self.balances.get_mut(item_id) {
                if let Some(balance) = holders.get_mut(&owner) {
                    *balance -= amount;
                    if *balance == 0 {
                        holders.remove(&owner);
                    }
                }
                if holders.is_empty() {
                    self.balances.remove(item_id);
                }
            }
            if let Some(supply) = self.supply.get_mut(item_id) {
                *supply -= amount;
                if *supply == 0 {
                    self.supply.remove(item_id);
                }
            }
        }
        tracing::debug!(token = %self.key, owner = %owner, items = item_ids.len(), "burn");
        Ok(())
    }

    /// Holder-to-holder transfer; unrestricted, like the underlying standard.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        item_id: ItemId,
        amount: u128,
    ) -> Result<(), BridgeError> {
        if amount == 0 {
            return Err(BridgeError::InvalidAmount {
                reason: format!("transfer of zero units for item {item_id}"),
            });
        }
        let balance = self.balance_of(&from, item_id);
        if amount > balance {
            return Err(BridgeError::InsufficientBalance {
                item_id,
                balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let holders = self.balances.entry(item_id).or_default();
        let from_balance = holders.entry(from).or_insert(0);
        *from_balance -= amount;
        if *from_balance == 0 {
            holders.remove(&from);
        }
        *holders.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

/// Per-chain directory of pegged collections, keyed by token identity.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PeggedAssets {
    tokens: BTreeMap<TokenKey, PeggedToken>,
}

impl PeggedAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &TokenKey) -> bool {
        self.tokens.contains_key(key)
    }

    pub fn lookup(&self, key: &TokenKey) -> Option<&PeggedToken> {
        self.tokens.get(key)
    }

    /// Create a fresh collection; the controller is fixed for its lifetime.
    pub fn create(
        &mut self,
        key: TokenKey,
        kind: AssetKind,
        controller: Address,
    ) -> Result<&mut PeggedToken, BridgeError> {
        if self.tokens.contains_key(&key) {
            return Err(BridgeError::CollectionExists { token: key });
        }
        tracing::info!(token = %key, kind = %kind, controller = %controller, "pegged collection created");
        Ok(self
            .tokens
            .entry(key)
            .or_insert_with(|| PeggedToken::new(key, kind, controller)))
    }

    pub fn get(&self, key: &TokenKey) -> Result<&PeggedToken, BridgeError> {
        self.tokens
            .get(key)
            .ok_or(BridgeError::UnknownToken { token: *key })
    }

    pub fn get_mut(&mut self, key: &TokenKey) -> Result<&mut PeggedToken, BridgeError> {
        self.tokens
            .get_mut(key)
            .ok_or(BridgeError::UnknownToken { token: *key })
    }
}

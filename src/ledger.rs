//! Per-chain escrow accounting.
//!
//! The lock ledger records how many units of which item ids are held in
//! escrow for each `(token, owner)` pair while the mirrored action on the
//! other chain is pending. It also owns the replay seen-set and the
//! outgoing nonce counter, so the gateway itself stays stateless.
//!
//! Batch operations are all-or-nothing: the whole batch is validated
//! against a scratch copy of the position and committed only if every item
//! succeeds. A rejected call leaves the ledger unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::hash::bytes32_to_hex;
use crate::types::{Address, ItemId, TokenKey};

/// Paginated view of the nonzero locked amounts for one `(token, owner)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedBalance {
    /// Full count of item ids with a nonzero locked amount, not just the
    /// returned page.
    pub total: u64,
    pub item_ids: Vec<ItemId>,
    pub amounts: Vec<u128>,
}

/// Escrow ledger for one chain.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LockLedger {
    /// Locked amounts, indexed per (token, owner) with item ids ascending.
    /// An item id with amount zero is pruned and indistinguishable from one
    /// never deposited.
    positions: BTreeMap<(TokenKey, Address), BTreeMap<ItemId, u128>>,
    /// Record ids already released on this chain.
    consumed: BTreeSet<[u8; 32]>,
    /// Next outgoing record nonce.
    nonce: u64,
}

fn check_lengths(item_ids: &[ItemId], amounts: &[u128]) -> Result<(), BridgeError> {
    if item_ids.len() != amounts.len() {
        return Err(BridgeError::LengthMismatch {
            item_ids: item_ids.len(),
            amounts: amounts.len(),
        });
    }
    Ok(())
}

fn apply_deposit(
    position: &mut BTreeMap<ItemId, u128>,
    item_id: ItemId,
    amount: u128,
) -> Result<u128, BridgeError> {
    if amount == 0 {
        return Err(BridgeError::InvalidAmount {
            reason: format!("deposit of zero units for item {item_id}"),
        });
    }
    let current = position.get(&item_id).copied().unwrap_or(0);
    let updated = current
        .checked_add(amount)
        .ok_or_else(|| BridgeError::InvalidAmount {
            reason: format!("locked amount overflow for item {item_id}"),
        })?;
    position.insert(item_id, updated);
    Ok(updated)
}

fn apply_withdraw(
    position: &mut BTreeMap<ItemId, u128>,
    item_id: ItemId,
    amount: u128,
) -> Result<u128, BridgeError> {
    if amount == 0 {
        return Err(BridgeError::InvalidAmount {
            reason: format!("withdrawal of zero units for item {item_id}"),
        });
    }
    let locked = position.get(&item_id).copied().unwrap_or(0);
    if amount > locked {
        return Err(BridgeError::InsufficientLocked {
            item_id,
            locked,
            requested: amount,
        });
    }
    let updated = locked - amount;
    if updated == 0 {
        position.remove(&item_id);
    } else {
        position.insert(item_id, updated);
    }
    Ok(updated)
}

impl LockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increase the locked amount for `(token, owner, item_id)`.
    ///
    /// Returns the new per-item locked total.
    pub fn deposit(
        &mut self,
        token: TokenKey,
        owner: Address,
        item_id: ItemId,
        amount: u128,
    ) -> Result<u128, BridgeError> {
        let position = self.positions.entry((token, owner)).or_default();
        let updated = apply_deposit(position, item_id, amount);
        if position.is_empty() {
            self.positions.remove(&(token, owner));
        }
        let updated = updated?;
        tracing::debug!(token = %token, owner = %owner, item_id, locked = updated, "deposit");
        Ok(updated)
    }

    /// Atomic batch analog of [`deposit`](Self::deposit): either every item
    /// updates or none does.
    pub fn batch_deposit(
        &mut self,
        token: TokenKey,
        owner: Address,
        item_ids: &[ItemId],
        amounts: &[u128],
    ) -> Result<(), BridgeError> {
        check_lengths(item_ids, amounts)?;
        let mut scratch = self
            .positions
            .get(&(token, owner))
            .cloned()
            .unwrap_or_default();
        for (item_id, amount) in item_ids.iter().zip(amounts.iter()) {
            apply_deposit(&mut scratch, *item_id, *amount)?;
        }
        if scratch.is_empty() {
            self.positions.remove(&(token, owner));
        } else {
            self.positions.insert((token, owner), scratch);
        }
        tracing::debug!(token = %token, owner = %owner, items = item_ids.len(), "batch deposit");
        Ok(())
    }

    /// Decrease the locked amount for `(token, owner, item_id)`.
    ///
    /// Fails with `InsufficientLocked` if `amount` exceeds the currently
    /// locked amount; this is the core safety property preventing withdrawal
    /// of units never deposited. Returns the new per-item locked total.
    pub fn withdraw(
        &mut self,
        token: TokenKey,
        owner: Address,
        item_id: ItemId,
        amount: u128,
    ) -> Result<u128, BridgeError> {
        if amount == 0 {
            return Err(BridgeError::InvalidAmount {
                reason: format!("withdrawal of zero units for item {item_id}"),
            });
        }
        let Some(position) = self.positions.get_mut(&(token, owner)) else {
            return Err(BridgeError::InsufficientLocked {
                item_id,
                locked: 0,
                requested: amount,
            });
        };
        let updated = apply_withdraw(position, item_id, amount)?;
        if position.is_empty() {
            self.positions.remove(&(token, owner));
        }
        tracing::debug!(token = %token, owner = %owner, item_id, locked = updated, "withdraw");
        Ok(updated)
    }

    /// Atomic batch analog of [`withdraw`](Self::withdraw).
    pub fn batch_withdraw(
        &mut self,
        token: TokenKey,
        owner: Address,
        item_ids: &[ItemId],
        amounts: &[u128],
    ) -> Result<(), BridgeError> {
        check_lengths(item_ids, amounts)?;
        let mut scratch = self
            .positions
            .get(&(token, owner))
            .cloned()
            .unwrap_or_default();
        for (item_id, amount) in item_ids.iter().zip(amounts.iter()) {
            apply_withdraw(&mut scratch, *item_id, *amount)?;
        }
        if scratch.is_empty() {
            self.positions.remove(&(token, owner));
        } else {
            self.positions.insert((token, owner), scratch);
        }
        tracing::debug!(token = %token, owner = %owner, items = item_ids.len(), "batch withdraw");
        Ok(())
    }

    /// Currently locked amount for one item, zero if never deposited.
    pub fn locked_amount(&self, token: &TokenKey, owner: &Address, item_id: ItemId) -> u128 {
        self.positions
            .get(&(*token, *owner))
            .and_then(|position| position.get(&item_id).copied())
            .unwrap_or(0)
    }

    /// Paginated read of the nonzero-amount index for an owner, ordered by
    /// item id ascending. `total` reflects the full count.
    pub fn locked_balance(
        &self,
        token: &TokenKey,
        owner: &Address,
        offset: usize,
        limit: usize,
    ) -> LockedBalance {
        let Some(position) = self.positions.get(&(*token, *owner)) else {
            return LockedBalance {
                total: 0,
                item_ids: Vec::new(),
                amounts: Vec::new(),
            };
        };
        let mut item_ids = Vec::new();
        let mut amounts = Vec::new();
        for (item_id, amount) in position.iter().skip(offset).take(limit) {
            item_ids.push(*item_id);
            amounts.push(*amount);
        }
        LockedBalance {
            total: position.len() as u64,
            item_ids,
            amounts,
        }
    }

    /// Whether a mirrored release for this record id was already processed.
    pub fn is_consumed(&self, record_id: &[u8; 32]) -> bool {
        self.consumed.contains(record_id)
    }

    /// Mark a record id consumed, rejecting re-delivery.
    pub fn mark_consumed(&mut self, record_id: [u8; 32]) -> Result<(), BridgeError> {
        if !self.consumed.insert(record_id) {
            return Err(BridgeError::ReplayDetected {
                record_id: bytes32_to_hex(&record_id),
            });
        }
        Ok(())
    }

    /// Draw the next outgoing record nonce.
    pub fn next_nonce(&mut self) -> u64 {
        let nonce = self.nonce;
        self.nonce += 1;
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn token_x() -> TokenKey {
        TokenKey::new(ChainId(1), Address([0x01; 20]))
    }

    fn alice() -> Address {
        Address([0xa1; 20])
    }

    fn bob() -> Address {
        Address([0xb0; 20])
    }

    #[test]
    fn test_deposit_then_withdraw_accounting() {
        let mut ledger = LockLedger::new();
        // deposit 5 units of item 7, withdraw 2 -> locked 3, withdraw 4 -> rejected
        assert_eq!(ledger.deposit(token_x(), alice(), 7, 5).unwrap(), 5);
        assert_eq!(ledger.withdraw(token_x(), alice(), 7, 2).unwrap(), 3);
        let err = ledger.withdraw(token_x(), alice(), 7, 4).unwrap_err();
        assert_eq!(
            err,
            BridgeError::InsufficientLocked {
                item_id: 7,
                locked: 3,
                requested: 4
            }
        );
        assert_eq!(ledger.locked_amount(&token_x(), &alice(), 7), 3);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut ledger = LockLedger::new();
        assert!(matches!(
            ledger.deposit(token_x(), alice(), 1, 0),
            Err(BridgeError::InvalidAmount { .. })
        ));
        ledger.deposit(token_x(), alice(), 1, 1).unwrap();
        assert!(matches!(
            ledger.withdraw(token_x(), alice(), 1, 0),
            Err(BridgeError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_withdraw_never_deposited() {
        let mut ledger = LockLedger::new();
        let err = ledger.withdraw(token_x(), alice(), 9, 1).unwrap_err();
        assert_eq!(
            err,
            BridgeError::InsufficientLocked {
                item_id: 9,
                locked: 0,
                requested: 1
            }
        );
    }

    #[test]
    fn test_zero_balance_pruned() {
        let mut ledger = LockLedger::new();
        ledger.deposit(token_x(), alice(), 7, 2).unwrap();
        ledger.withdraw(token_x(), alice(), 7, 2).unwrap();
        // fully withdrawn item is indistinguishable from never-deposited
        let balance = ledger.locked_balance(&token_x(), &alice(), 0, 10);
        assert_eq!(balance.total, 0);
        assert!(balance.item_ids.is_empty());
    }

    #[test]
    fn test_batch_length_mismatch() {
        let mut ledger = LockLedger::new();
        let err = ledger
            .batch_deposit(token_x(), bob(), &[1, 2, 3], &[1, 1])
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::LengthMismatch {
                item_ids: 3,
                amounts: 2
            }
        );
        assert_eq!(ledger.locked_balance(&token_x(), &bob(), 0, 10).total, 0);
    }

    #[test]
    fn test_batch_withdraw_all_or_nothing() {
        let mut ledger = LockLedger::new();
        ledger
            .batch_deposit(token_x(), bob(), &[1, 2, 3], &[2, 3, 4])
            .unwrap();
        // item 3 fails: the whole batch must leave balances untouched
        let err = ledger
            .batch_withdraw(token_x(), bob(), &[1, 2, 3], &[2, 3, 5])
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::InsufficientLocked {
                item_id: 3,
                locked: 4,
                requested: 5
            }
        );
        assert_eq!(ledger.locked_amount(&token_x(), &bob(), 1), 2);
        assert_eq!(ledger.locked_amount(&token_x(), &bob(), 2), 3);
        assert_eq!(ledger.locked_amount(&token_x(), &bob(), 3), 4);
    }

    #[test]
    fn test_batch_duplicate_item_ids() {
        let mut ledger = LockLedger::new();
        ledger.deposit(token_x(), bob(), 5, 3).unwrap();
        // two withdrawals of the same item inside one batch must be summed
        let err = ledger
            .batch_withdraw(token_x(), bob(), &[5, 5], &[2, 2])
            .unwrap_err();
        assert!(matches!(err, BridgeError::InsufficientLocked { .. }));
        assert_eq!(ledger.locked_amount(&token_x(), &bob(), 5), 3);
        ledger
            .batch_withdraw(token_x(), bob(), &[5, 5], &[2, 1])
            .unwrap();
        assert_eq!(ledger.locked_amount(&token_x(), &bob(), 5), 0);
    }

    #[test]
    fn test_pagination_scenario() {
        let mut ledger = LockLedger::new();
        ledger
            .batch_deposit(token_x(), bob(), &[1, 2, 3], &[2, 3, 4])
            .unwrap();
        ledger
            .batch_withdraw(token_x(), bob(), &[1, 2], &[2, 3])
            .unwrap();
        // only item 3 survives with amount 4
        let page = ledger.locked_balance(&token_x(), &bob(), 0, 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.item_ids, vec![3]);
        assert_eq!(page.amounts, vec![4]);
    }

    #[test]
    fn test_pagination_offset_limit() {
        let mut ledger = LockLedger::new();
        ledger
            .batch_deposit(token_x(), alice(), &[10, 20, 30, 40], &[1, 1, 1, 1])
            .unwrap();
        let page = ledger.locked_balance(&token_x(), &alice(), 1, 2);
        assert_eq!(page.total, 4);
        assert_eq!(page.item_ids, vec![20, 30]);
        let tail = ledger.locked_balance(&token_x(), &alice(), 3, 10);
        assert_eq!(tail.item_ids, vec![40]);
    }

    #[test]
    fn test_positions_isolated_per_owner() {
        let mut ledger = LockLedger::new();
        ledger.deposit(token_x(), alice(), 1, 5).unwrap();
        ledger.deposit(token_x(), bob(), 1, 2).unwrap();
        assert_eq!(ledger.locked_amount(&token_x(), &alice(), 1), 5);
        assert_eq!(ledger.locked_amount(&token_x(), &bob(), 1), 2);
        let other = TokenKey::new(ChainId(1), Address([0x02; 20]));
        assert_eq!(ledger.locked_amount(&other, &alice(), 1), 0);
    }

    #[test]
    fn test_deposit_overflow_rejected() {
        let mut ledger = LockLedger::new();
        ledger.deposit(token_x(), alice(), 1, u128::MAX).unwrap();
        assert!(matches!(
            ledger.deposit(token_x(), alice(), 1, 1),
            Err(BridgeError::InvalidAmount { .. })
        ));
        assert_eq!(ledger.locked_amount(&token_x(), &alice(), 1), u128::MAX);
    }

    #[test]
    fn test_mark_consumed_rejects_replay() {
        let mut ledger = LockLedger::new();
        let id = [0x42; 32];
        assert!(!ledger.is_consumed(&id));
        ledger.mark_consumed(id).unwrap();
        assert!(ledger.is_consumed(&id));
        assert!(matches!(
            ledger.mark_consumed(id),
            Err(BridgeError::ReplayDetected { .. })
        ));
    }

    #[test]
    fn test_nonce_monotonic() {
        let mut ledger = LockLedger::new();
        assert_eq!(ledger.next_nonce(), 0);
        assert_eq!(ledger.next_nonce(), 1);
        assert_eq!(ledger.next_nonce(), 2);
    }
}

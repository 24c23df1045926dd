//! Beacon-style upgrade coordination.
//!
//! Many deployed proxy instances share one beacon; swapping the beacon's
//! implementation retargets every instance atomically without migrating
//! their stored state. Modeled as an explicit indirection table
//! (instance -> beacon -> implementation) resolved on every call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::Address;

/// Identifier of one beacon.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BeaconId(pub u64);

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Governs the implementation behind every proxy instance.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpgradeCoordinator {
    beacons: BTreeMap<BeaconId, Address>,
    instances: BTreeMap<Address, BeaconId>,
    next_id: u64,
}

impl UpgradeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a beacon pointing at `implementation`.
    pub fn create_beacon(&mut self, implementation: Address) -> BeaconId {
        let beacon = BeaconId(self.next_id);
        self.next_id += 1;
        self.beacons.insert(beacon, implementation);
        tracing::info!(beacon = %beacon, implementation = %implementation, "beacon created");
        beacon
    }

    /// Swap the implementation all instances of `beacon` resolve to.
    pub fn set_implementation(
        &mut self,
        beacon: BeaconId,
        implementation: Address,
    ) -> Result<(), BridgeError> {
        let slot = self
            .beacons
            .get_mut(&beacon)
            .ok_or(BridgeError::UnknownBeacon { beacon })?;
        let previous = *slot;
        *slot = implementation;
        tracing::info!(
            beacon = %beacon,
            previous = %previous,
            implementation = %implementation,
            "beacon implementation swapped"
        );
        Ok(())
    }

    /// Attach a proxy instance to a beacon, once.
    pub fn attach_instance(
        &mut self,
        instance: Address,
        beacon: BeaconId,
    ) -> Result<(), BridgeError> {
        if !self.beacons.contains_key(&beacon) {
            return Err(BridgeError::UnknownBeacon { beacon });
        }
        if let Some(existing) = self.instances.get(&instance) {
            return Err(BridgeError::InstanceExists {
                instance,
                beacon: *existing,
            });
        }
        self.instances.insert(instance, beacon);
        Ok(())
    }

    pub fn beacon_of(&self, instance: &Address) -> Option<BeaconId> {
        self.instances.get(instance).copied()
    }

    /// Resolve an instance to its current implementation, through its
    /// beacon, on every call.
    pub fn resolve(&self, instance: &Address) -> Result<Address, BridgeError> {
        let beacon = self
            .instances
            .get(instance)
            .ok_or(BridgeError::UnknownInstance {
                instance: *instance,
            })?;
        self.beacons
            .get(beacon)
            .copied()
            .ok_or(BridgeError::UnknownBeacon { beacon: *beacon })
    }
}

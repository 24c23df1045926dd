//! Per-chain directory of pegged token mappings.
//!
//! The registry is the single-writer serialization point for pegged
//! deployment: separating `Deploying` from `Deployed` prevents two
//! concurrent first-deposits from creating duplicate pegged collections
//! for the same origin token. It also tracks the per-token callback
//! override and the administrator allowed to manage it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::{Address, TokenKey};

/// Lifecycle of a pegged mapping. Absence of an entry is the unset state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    /// A deployment was started; the pegged collection does not exist yet.
    Deploying,
    /// The pegged collection exists; the default mint/burn path applies.
    Deployed,
    /// An owner-supplied callback overrides the default path.
    Registered,
    /// Terminal. The identity is retired and never revived.
    Unregistered,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Deploying => "deploying",
            RegistrationState::Deployed => "deployed",
            RegistrationState::Registered => "registered",
            RegistrationState::Unregistered => "unregistered",
        }
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the pegged side of a transfer is handled for one origin token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeggedHandler {
    /// The gateway mints and burns the pegged collection itself.
    DefaultMintBurn,
    /// A registered callback assumes responsibility for pegged-side effects.
    ExternalCallback(Address),
}

/// Mapping from an origin token to its local pegged counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeggedMapping {
    pub origin: TokenKey,
    /// Immutable once the mapping reaches `Deployed`.
    pub pegged: Option<TokenKey>,
    pub state: RegistrationState,
    /// Administrator allowed to manage callbacks and unregister, fixed at
    /// mapping creation.
    pub admin: Address,
    pub callback: Option<Address>,
}

/// Per-chain registry. Exclusively owns all [`PeggedMapping`] entries.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Registry {
    mappings: BTreeMap<TokenKey, PeggedMapping>,
    /// Reverse index from pegged key back to origin, kept across
    /// unregistration since historical pegged assets remain transferable.
    by_pegged: BTreeMap<TokenKey, TokenKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw accessor, returning retired entries too. Use
    /// [`resolve_pegged`](Self::resolve_pegged) for deposit purposes.
    pub fn get(&self, origin: &TokenKey) -> Option<&PeggedMapping> {
        self.mappings.get(origin)
    }

    /// Look up the live mapping for an origin token.
    ///
    /// Reports `NotFound` for unknown origins and for retired ones: an
    /// unregistered mapping must not accept new deposits even though its
    /// historical pegged assets continue to exist.
    pub fn resolve_pegged(&self, origin: &TokenKey) -> Result<&PeggedMapping, BridgeError> {
        match self.mappings.get(origin) {
            Some(mapping) if mapping.state != RegistrationState::Unregistered => Ok(mapping),
            _ => Err(BridgeError::NotFound { origin: *origin }),
        }
    }

    /// Reverse lookup from a pegged key to its origin token.
    pub fn resolve_origin(&self, pegged: &TokenKey) -> Option<TokenKey> {
        self.by_pegged.get(pegged).copied()
    }

    /// Start a pegged deployment for `origin`, administered by `admin`.
    ///
    /// Only the first caller wins: a live mapping (including `Deploying`)
    /// fails with `AlreadyDeployed`, and later callers must observe the
    /// existing state instead of creating a duplicate pegged collection.
    /// A retired identity fails with `InvalidState` and is never revived.
    pub fn begin_deployment(
        &mut self,
        origin: TokenKey,
        admin: Address,
    ) -> Result<&PeggedMapping, BridgeError> {
        match self.mappings.get(&origin) {
            Some(mapping) if mapping.state == RegistrationState::Unregistered => {
                return Err(BridgeError::InvalidState {
                    origin,
                    state: mapping.state,
                });
            }
            Some(_) => return Err(BridgeError::AlreadyDeployed { origin }),
            None => {}
        }
        tracing::info!(origin = %origin, admin = %admin, "pegged deployment started");
        let mapping = PeggedMapping {
            origin,
            pegged: None,
            state: RegistrationState::Deploying,
            admin,
            callback: None,
        };
        Ok(self.mappings.entry(origin).or_insert(mapping))
    }

    /// Record the deployed pegged key: `Deploying -> Deployed`.
    pub fn complete_deployment(
        &mut self,
        origin: &TokenKey,
        pegged: TokenKey,
    ) -> Result<(), BridgeError> {
        let mapping = self
            .mappings
            .get_mut(origin)
            .ok_or(BridgeError::NotFound { origin: *origin })?;
        if mapping.state != RegistrationState::Deploying {
            return Err(BridgeError::InvalidState {
                origin: *origin,
                state: mapping.state,
            });
        }
        mapping.pegged = Some(pegged);
        mapping.state = RegistrationState::Deployed;
        self.by_pegged.insert(pegged, *origin);
        tracing::info!(origin = %origin, pegged = %pegged, "pegged deployment completed");
        Ok(())
    }

    /// Attach a callback override: `Deployed|Registered -> Registered`.
    pub fn register_callback(
        &mut self,
        origin: &TokenKey,
        caller: Address,
        callback: Address,
    ) -> Result<(), BridgeError> {
        let mapping = self
            .mappings
            .get_mut(origin)
            .ok_or(BridgeError::NotFound { origin: *origin })?;
        if caller != mapping.admin {
            return Err(BridgeError::Unauthorized {
                origin: *origin,
                caller,
            });
        }
        match mapping.state {
            RegistrationState::Deployed | RegistrationState::Registered => {}
            state => {
                return Err(BridgeError::InvalidState {
                    origin: *origin,
                    state,
                });
            }
        }
        mapping.callback = Some(callback);
        mapping.state = RegistrationState::Registered;
        tracing::info!(origin = %origin, callback = %callback, "callback registered");
        Ok(())
    }

    /// Detach the callback override: `Registered -> Deployed`.
    pub fn unregister_callback(
        &mut self,
        origin: &TokenKey,
        caller: Address,
    ) -> Result<(), BridgeError> {
        let mapping = self
            .mappings
            .get_mut(origin)
            .ok_or(BridgeError::NotFound { origin: *origin })?;
        if caller != mapping.admin {
            return Err(BridgeError::Unauthorized {
                origin: *origin,
                caller,
            });
        }
        if mapping.state != RegistrationState::Registered {
            return Err(BridgeError::InvalidState {
                origin: *origin,
                state: mapping.state,
            });
        }
        mapping.callback = None;
        mapping.state = RegistrationState::Deployed;
        tracing::info!(origin = %origin, "callback unregistered");
        Ok(())
    }

    /// Terminal transition: retire the origin identity.
    ///
    /// New deposits of this origin token are rejected afterwards, while
    /// already-minted pegged assets remain transferable among holders.
    pub fn unregister(&mut self, origin: &TokenKey, caller: Address) -> Result<(), BridgeError> {
        let mapping = self
            .mappings
            .get_mut(origin)
            .ok_or(BridgeError::NotFound { origin: *origin })?;
        if caller != mapping.admin {
            return Err(BridgeError::Unauthorized {
                origin: *origin,
                caller,
            });
        }
        if mapping.state == RegistrationState::Unregistered {
            return Err(BridgeError::InvalidState {
                origin: *origin,
                state: mapping.state,
            });
        }
        mapping.callback = None;
        mapping.state = RegistrationState::Unregistered;
        tracing::warn!(origin = %origin, "origin token unregistered");
        Ok(())
    }

    /// Which handler owns the pegged side for this origin token.
    ///
    /// The callback supersedes the default mint/burn path only while the
    /// mapping is live.
    pub fn handler_for(&self, origin: &TokenKey) -> PeggedHandler {
        match self.mappings.get(origin) {
            Some(mapping) if mapping.state != RegistrationState::Unregistered => {
                match mapping.callback {
                    Some(callback) => PeggedHandler::ExternalCallback(callback),
                    None => PeggedHandler::DefaultMintBurn,
                }
            }
            _ => PeggedHandler::DefaultMintBurn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn origin_t() -> TokenKey {
        TokenKey::new(ChainId(1), Address([0x10; 20]))
    }

    fn pegged_t() -> TokenKey {
        TokenKey::new(ChainId(2), Address([0x20; 20]))
    }

    fn admin_d() -> Address {
        Address([0xd0; 20])
    }

    fn mallory() -> Address {
        Address([0x66; 20])
    }

    #[test]
    fn test_begin_deployment_first_caller_wins() {
        let mut registry = Registry::new();
        let mapping = registry.begin_deployment(origin_t(), admin_d()).unwrap();
        assert_eq!(mapping.state, RegistrationState::Deploying);
        // a live mapping (still deploying) rejects a second deployment
        let err = registry.begin_deployment(origin_t(), mallory()).unwrap_err();
        assert_eq!(err, BridgeError::AlreadyDeployed { origin: origin_t() });
        // the loser observes the in-progress state instead
        assert_eq!(
            registry.resolve_pegged(&origin_t()).unwrap().state,
            RegistrationState::Deploying
        );
    }

    #[test]
    fn test_complete_deployment() {
        let mut registry = Registry::new();
        registry.begin_deployment(origin_t(), admin_d()).unwrap();
        registry.complete_deployment(&origin_t(), pegged_t()).unwrap();
        let mapping = registry.resolve_pegged(&origin_t()).unwrap();
        assert_eq!(mapping.state, RegistrationState::Deployed);
        assert_eq!(mapping.pegged, Some(pegged_t()));
        assert_eq!(registry.resolve_origin(&pegged_t()), Some(origin_t()));
    }

    #[test]
    fn test_complete_deployment_wrong_state() {
        let mut registry = Registry::new();
        assert_eq!(
            registry
                .complete_deployment(&origin_t(), pegged_t())
                .unwrap_err(),
            BridgeError::NotFound { origin: origin_t() }
        );
        registry.begin_deployment(origin_t(), admin_d()).unwrap();
        registry.complete_deployment(&origin_t(), pegged_t()).unwrap();
        let err = registry
            .complete_deployment(&origin_t(), pegged_t())
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::InvalidState {
                origin: origin_t(),
                state: RegistrationState::Deployed
            }
        );
    }

    #[test]
    fn test_callback_admin_gating() {
        let mut registry = Registry::new();
        registry.begin_deployment(origin_t(), admin_d()).unwrap();
        registry.complete_deployment(&origin_t(), pegged_t()).unwrap();

        let callback = Address([0xcb; 20]);
        registry
            .register_callback(&origin_t(), admin_d(), callback)
            .unwrap();
        assert_eq!(
            registry.handler_for(&origin_t()),
            PeggedHandler::ExternalCallback(callback)
        );

        // a non-admin caller may not unregister the callback
        let err = registry
            .unregister_callback(&origin_t(), mallory())
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::Unauthorized {
                origin: origin_t(),
                caller: mallory()
            }
        );

        registry.unregister_callback(&origin_t(), admin_d()).unwrap();
        assert_eq!(
            registry.handler_for(&origin_t()),
            PeggedHandler::DefaultMintBurn
        );
        assert_eq!(
            registry.resolve_pegged(&origin_t()).unwrap().state,
            RegistrationState::Deployed
        );
    }

    #[test]
    fn test_callback_while_deploying_rejected() {
        let mut registry = Registry::new();
        registry.begin_deployment(origin_t(), admin_d()).unwrap();
        let err = registry
            .register_callback(&origin_t(), admin_d(), Address([0xcb; 20]))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::InvalidState {
                origin: origin_t(),
                state: RegistrationState::Deploying
            }
        );
    }

    #[test]
    fn test_unregister_terminal() {
        let mut registry = Registry::new();
        registry.begin_deployment(origin_t(), admin_d()).unwrap();
        registry.complete_deployment(&origin_t(), pegged_t()).unwrap();
        registry.unregister(&origin_t(), admin_d()).unwrap();

        // retired mappings report NotFound for deposit purposes
        assert_eq!(
            registry.resolve_pegged(&origin_t()).unwrap_err(),
            BridgeError::NotFound { origin: origin_t() }
        );
        // second unregister fails
        assert_eq!(
            registry.unregister(&origin_t(), admin_d()).unwrap_err(),
            BridgeError::InvalidState {
                origin: origin_t(),
                state: RegistrationState::Unregistered
            }
        );
        // the identity is never revived
        assert_eq!(
            registry
                .begin_deployment(origin_t(), admin_d())
                .unwrap_err(),
            BridgeError::InvalidState {
                origin: origin_t(),
                state: RegistrationState::Unregistered
            }
        );
        // historical pegged assets keep their reverse mapping
        assert_eq!(registry.resolve_origin(&pegged_t()), Some(origin_t()));
    }

    #[test]
    fn test_unregister_clears_callback_override() {
        let mut registry = Registry::new();
        registry.begin_deployment(origin_t(), admin_d()).unwrap();
        registry.complete_deployment(&origin_t(), pegged_t()).unwrap();
        registry
            .register_callback(&origin_t(), admin_d(), Address([0xcb; 20]))
            .unwrap();
        registry.unregister(&origin_t(), admin_d()).unwrap();
        assert_eq!(
            registry.handler_for(&origin_t()),
            PeggedHandler::DefaultMintBurn
        );
    }
}

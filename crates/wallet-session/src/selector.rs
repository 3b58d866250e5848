//! The active wallet selection.
//!
//! Holds the current registry snapshot and the selected wallet identity.
//! Auto-selection only fills an empty selection; it never overrides an
//! explicit choice. What happens when the selected wallet vanishes from a
//! new snapshot is governed by [`StalePolicy`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::registry::UnifiedRegistry;
use crate::types::{WalletId, WalletRecord};

/// Treatment of a selection whose wallet disappears from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Drop the selection and fall back to auto-selection.
    #[default]
    Revalidate,
    /// Keep pointing at the vanished wallet; dispatch then fails with
    /// `WalletNotFound`.
    Keep,
}

#[derive(Debug, Default)]
struct SelectorState {
    registry: UnifiedRegistry,
    selected: Option<WalletId>,
}

#[derive(Debug)]
pub struct ActiveWalletSelector {
    state: Mutex<SelectorState>,
    policy: StalePolicy,
}

impl Default for ActiveWalletSelector {
    fn default() -> Self {
        Self::new(StalePolicy::default())
    }
}

impl ActiveWalletSelector {
    pub fn new(policy: StalePolicy) -> Self {
        Self {
            state: Mutex::new(SelectorState::default()),
            policy,
        }
    }

    pub fn policy(&self) -> StalePolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a freshly recomputed registry, then run auto-selection.
    pub fn on_registry_changed(&self, registry: UnifiedRegistry) -> Option<WalletRecord> {
        let mut state = self.lock();
        debug!(
            wallets = registry.len(),
            generation = registry.generation(),
            "registry changed"
        );

        if self.policy == StalePolicy::Revalidate {
            if let Some(id) = &state.selected {
                if !registry.contains(id) {
                    warn!(
                        address = %id.address,
                        family = %id.chain_family,
                        "selected wallet left the registry"
                    );
                    state.selected = None;
                }
            }
        }

        state.registry = registry;
        Self::auto_select(&mut state)
    }

    /// Apply the auto-select rule against the current registry.
    ///
    /// Selects the first wallet when nothing is selected; otherwise leaves
    /// the selection alone.
    pub fn evaluate(&self) -> Option<WalletRecord> {
        let mut state = self.lock();
        Self::auto_select(&mut state)
    }

    fn auto_select(state: &mut SelectorState) -> Option<WalletRecord> {
        if state.selected.is_none() {
            if let Some(first) = state.registry.first() {
                info!(
                    address = %first.address,
                    family = %first.chain_family,
                    "auto-selected wallet"
                );
                state.selected = Some(first.id());
            }
        }
        Self::current_in(state)
    }

    /// Select the wallet with `address`. An unknown address clears the
    /// selection and reports `WalletNotFound`.
    pub fn select_by_address(&self, address: &str) -> Result<WalletRecord, SessionError> {
        let mut state = self.lock();
        match state.registry.find_by_address(address).cloned() {
            Some(record) => {
                info!(address = %record.address, family = %record.chain_family, "wallet selected");
                state.selected = Some(record.id());
                Ok(record)
            }
            None => {
                state.selected = None;
                Err(SessionError::WalletNotFound(address.to_string()))
            }
        }
    }

    /// The selected wallet, as found in the current registry.
    ///
    /// An empty selection is refilled by the auto-select rule first. `None`
    /// when the registry is empty or when a kept selection no longer
    /// resolves.
    pub fn current(&self) -> Option<WalletRecord> {
        let mut state = self.lock();
        Self::auto_select(&mut state)
    }

    fn current_in(state: &SelectorState) -> Option<WalletRecord> {
        let id = state.selected.as_ref()?;
        state.registry.get(id).cloned()
    }

    /// The selected identity, whether or not it still resolves.
    pub fn selected_id(&self) -> Option<WalletId> {
        self.lock().selected.clone()
    }

    /// Re-resolve the selection against the current registry, for dispatch.
    ///
    /// Runs the auto-select rule first, so a cleared selection over a
    /// non-empty registry resolves to its first wallet.
    pub fn resolve(&self) -> Result<WalletRecord, SessionError> {
        let mut state = self.lock();
        Self::auto_select(&mut state);
        let id = state
            .selected
            .as_ref()
            .ok_or(SessionError::NoWalletSelected)?;
        state
            .registry
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::WalletNotFound(id.address.clone()))
    }

    pub fn registry(&self) -> UnifiedRegistry {
        self.lock().registry.clone()
    }

    /// Forget the registry and the selection.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.registry = UnifiedRegistry::default();
        state.selected = None;
    }
}

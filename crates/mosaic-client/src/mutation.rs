//! Optimistic like/save/follow toggles with rollback.
//!
//! The coordinator flips the held state before the remote call and puts the
//! exact previous value back if the call fails. Only one toggle per
//! `(entity, action)` may be pending at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, warn};

use mosaic_net::SocialApi;
use mosaic_shared::types::{ActionKind, EntityKey};
use mosaic_shared::MosaicError;

use crate::view::ViewScope;

/// A toggle's boolean and its paired counter (`None` for saves).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleSnapshot {
    pub active: bool,
    pub count: Option<u64>,
}

impl ToggleSnapshot {
    /// The state after flipping, with the counter moved along.
    pub fn flipped(&self) -> Self {
        let active = !self.active;
        let count = self.count.map(|c| {
            if active {
                c.saturating_add(1)
            } else {
                c.saturating_sub(1)
            }
        });
        Self { active, count }
    }
}

/// View state that holds toggleable entities.
pub trait ToggleStore {
    /// Current value, or `None` if the entity is not held here.
    fn read(&self, target: EntityKey, action: ActionKind) -> Option<ToggleSnapshot>;

    /// Overwrite the value. Returns `false` if the entity is no longer held.
    fn write(&mut self, target: EntityKey, action: ActionKind, value: ToggleSnapshot) -> bool;
}

#[derive(Error, Debug)]
pub enum ToggleError {
    #[error("A {action} toggle on {target} is already pending")]
    InFlight { target: EntityKey, action: ActionKind },

    #[error("{0} is not loaded in this view")]
    UnknownEntity(EntityKey),

    #[error("Stale state for {target}: caller saw {seen}, view holds {held}")]
    Stale {
        target: EntityKey,
        seen: bool,
        held: bool,
    },

    #[error("{action} is not defined for {target}")]
    Unsupported { target: EntityKey, action: ActionKind },

    #[error("Toggle failed and was rolled back: {0}")]
    RolledBack(#[source] MosaicError),

    #[error("View closed before the toggle settled")]
    Cancelled,
}

type PendingSet = Arc<Mutex<HashSet<(EntityKey, ActionKind)>>>;

/// Removes its key from the pending set when dropped, however the toggle
/// ends.
struct InFlightGuard {
    pending: PendingSet,
    key: (EntityKey, ActionKind),
}

impl InFlightGuard {
    fn acquire(pending: &PendingSet, key: (EntityKey, ActionKind)) -> Option<Self> {
        let inserted = pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key);
        inserted.then(|| Self {
            pending: pending.clone(),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

pub struct OptimisticCoordinator<S> {
    api: Arc<dyn SocialApi>,
    store: Arc<Mutex<S>>,
    pending: PendingSet,
    scope: ViewScope,
}

impl<S> Clone for OptimisticCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            store: self.store.clone(),
            pending: self.pending.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<S: ToggleStore + Send> OptimisticCoordinator<S> {
    pub fn new(api: Arc<dyn SocialApi>, store: Arc<Mutex<S>>, scope: ViewScope) -> Self {
        Self {
            api,
            store,
            pending: Arc::new(Mutex::new(HashSet::new())),
            scope,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    pub fn is_pending(&self, target: EntityKey, action: ActionKind) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&(target, action))
    }

    /// Flip `action` on `target` from `current` and confirm it remotely.
    ///
    /// Returns the state left in the view once the call settled.
    pub async fn toggle(
        &self,
        target: EntityKey,
        action: ActionKind,
        current: bool,
    ) -> Result<ToggleSnapshot, ToggleError> {
        if !target.supports(action) {
            return Err(ToggleError::Unsupported { target, action });
        }
        if !self.scope.is_mounted() {
            return Err(ToggleError::Cancelled);
        }

        let _guard = InFlightGuard::acquire(&self.pending, (target, action))
            .ok_or(ToggleError::InFlight { target, action })?;

        let (before, optimistic) = {
            let mut store = self.lock_store();
            let before = store
                .read(target, action)
                .ok_or(ToggleError::UnknownEntity(target))?;
            if before.active != current {
                return Err(ToggleError::Stale {
                    target,
                    seen: current,
                    held: before.active,
                });
            }
            let optimistic = before.flipped();
            store.write(target, action, optimistic);
            (before, optimistic)
        };

        debug!(%target, %action, active = optimistic.active, "Optimistic toggle applied");

        let result = self.api.set_toggle(target, action, optimistic.active).await;

        if !self.scope.is_mounted() {
            debug!(%target, %action, "View gone, dropping toggle result");
            return Err(ToggleError::Cancelled);
        }

        match result {
            Ok(ack) => {
                if ack.active != optimistic.active {
                    warn!(%target, %action, server = ack.active, "Server acknowledged a different state");
                }
                let settled = ToggleSnapshot {
                    active: optimistic.active,
                    count: optimistic.count.map(|c| ack.count.unwrap_or(c)),
                };
                self.lock_store().write(target, action, settled);
                Ok(settled)
            }
            Err(e) => {
                warn!(%target, %action, error = %e, "Toggle failed, rolling back");
                self.lock_store().write(target, action, before);
                Err(ToggleError::RolledBack(e))
            }
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

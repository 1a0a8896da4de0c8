//! Keystone bootstrap gate
//!
//! Services can only be registered once the Keystone deployment they target
//! has finished its bootstrap, which is signalled by a non-empty
//! `bootstrapHash` on the `KeystoneAPI` object.

use crate::api::{KeystoneApi, ObjectKey};
use crate::error::ReconcileError;
use crate::store::{ObjectStore, StoreError};
use std::time::Duration;

/// Wait between checks while Keystone is still bootstrapping
pub const BOOTSTRAP_REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Outcome of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    /// Not ready yet; check again after the delay
    Defer(Duration),
}

/// Decide from an already-loaded `KeystoneAPI`
pub fn evaluate(api: &KeystoneApi, delay: Duration) -> Gate {
    if api.status.bootstrap_hash.is_empty() {
        Gate::Defer(delay)
    } else {
        Gate::Proceed
    }
}

/// Load the `KeystoneAPI` at `key` and decide whether reconciliation may proceed
pub fn check<S: ObjectStore + ?Sized>(
    store: &S,
    key: &ObjectKey,
    delay: Duration,
) -> Result<Gate, ReconcileError> {
    match store.get_keystone_api(key) {
        Ok(api) => Ok(evaluate(&api, delay)),
        Err(StoreError::NotFound { .. }) => Err(ReconcileError::KeystoneApiNotFound(key.clone())),
        Err(source) => Err(ReconcileError::Read {
            key: key.clone(),
            source,
        }),
    }
}

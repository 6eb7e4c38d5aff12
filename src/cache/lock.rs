use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Cached pages are disposable, so a panic while holding the lock is not fatal:
/// log it and keep using the store.
fn recover<G>(poisoned: PoisonError<G>, op: &'static str) -> G {
    warn!(
        target = "yatube::cache",
        op, "response cache lock was poisoned; continuing"
    );
    poisoned.into_inner()
}

pub(crate) fn read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| recover(poisoned, op))
}

pub(crate) fn write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| recover(poisoned, op))
}

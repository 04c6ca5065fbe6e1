use std::sync::Mutex;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::guard;

/// Result of a lock acquisition attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LockOutcome {
    /// The lock was free and is now held by the requesting client.
    Granted,
    /// The requesting client already held the lock; the call is a no-op.
    AlreadyHeldBySelf,
    /// Another client holds the lock; its identity is attached.
    HeldByOther(String),
    /// The request itself was malformed and no lock state changed.
    Rejected(&'static str),
}

/// Per-file single-writer lock table keyed by client identity.
///
/// There is no fairness and no queue: the first caller to observe the
/// unlocked state wins. Locks never expire; a holder that walks away without
/// completing a Store or Delete leaves the file locked until one of those
/// operations releases it.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: Mutex<FxHashMap<String, String>>,
}

impl LockManager {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire the write lock on `name` for `client_id`.
    ///
    /// Empty names and empty client identities are rejected outright.
    /// Re-acquisition by the current holder reports
    /// [`LockOutcome::AlreadyHeldBySelf`] and leaves the entry untouched.
    pub fn acquire(&self, name: &str, client_id: &str) -> LockOutcome {
        if name.is_empty() {
            return LockOutcome::Rejected("file name is empty");
        }
        if client_id.is_empty() {
            return LockOutcome::Rejected("client id is empty");
        }

        let mut locks = guard(&self.locks);
        match locks.get(name) {
            None => {
                locks.insert(name.to_owned(), client_id.to_owned());
                info!(name, client_id, "write lock granted");
                LockOutcome::Granted
            }
            Some(holder) if holder == client_id => {
                debug!(name, client_id, "write lock already held by requester");
                LockOutcome::AlreadyHeldBySelf
            }
            Some(holder) => {
                info!(name, client_id, %holder, "write lock held by another client");
                LockOutcome::HeldByOther(holder.clone())
            }
        }
    }

    /// Releases the lock on `name` regardless of holder; absent entries are
    /// ignored.
    pub fn release(&self, name: &str) {
        if guard(&self.locks).remove(name).is_some() {
            info!(name, "write lock released");
        }
    }

    /// Reports whether `client_id` currently holds the lock on `name`.
    #[must_use]
    pub fn has_lock(&self, name: &str, client_id: &str) -> bool {
        guard(&self.locks)
            .get(name)
            .is_some_and(|holder| holder == client_id)
    }

    /// Returns the current holder of the lock on `name`, if any.
    #[must_use]
    pub fn holder(&self, name: &str) -> Option<String> {
        guard(&self.locks).get(name).cloned()
    }
}

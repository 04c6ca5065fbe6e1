use std::sync::Mutex;

use tracing::debug;

use crate::guard;

/// Deferred deletion notices awaiting delivery.
///
/// A name is recorded when a delete succeeds and removed only after a
/// callback-list reply carrying it has been written, so a failed delivery
/// keeps the notice for the next attempt.
#[derive(Debug, Default)]
pub struct TombstoneSet {
    names: Mutex<Vec<String>>,
}

impl TombstoneSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a deletion notice for `name`; duplicates collapse.
    pub fn record(&self, name: &str) {
        let mut names = guard(&self.names);
        if !names.iter().any(|existing| existing == name) {
            debug!(name, "tombstone recorded");
            names.push(name.to_owned());
        }
    }

    /// Returns the notices currently pending delivery.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        guard(&self.names).clone()
    }

    /// Removes exactly the delivered notices, keeping any recorded since the
    /// snapshot was taken.
    pub fn remove_delivered(&self, delivered: &[String]) {
        if delivered.is_empty() {
            return;
        }
        guard(&self.names).retain(|name| !delivered.contains(name));
    }
}

use std::sync::{Arc, Mutex};
use std::thread;

use client::{ClientError, DfsClient, FetchOutcome, StoreOutcome};
use mount::{FileStat, list_regular};
use protocol::FileList;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::guard;

/// Error produced when a reconciliation pass cannot start.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The long-poll CallbackList failed before delivering a listing.
    #[error("callback listing failed: {0}")]
    Callback(#[source] ClientError),
}

/// Counters describing one reconciliation pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PassSummary {
    /// Files downloaded from the server.
    pub fetched: usize,
    /// Files uploaded to the server.
    pub stored: usize,
    /// Local files unlinked by tombstones.
    pub removed: usize,
    /// Per-file operations that failed and were skipped.
    pub failed: usize,
}

impl PassSummary {
    /// Total number of file transfers and removals the pass performed.
    #[must_use]
    pub const fn transfers(&self) -> usize {
        self.fetched + self.stored + self.removed
    }
}

/// Callback-driven reconciliation between a local mount and the daemon.
#[derive(Debug)]
pub struct SyncEngine {
    client: Arc<DfsClient>,
    sync_mutex: Arc<Mutex<()>>,
}

impl SyncEngine {
    /// Creates an engine with its own sync mutex.
    #[must_use]
    pub fn new(client: Arc<DfsClient>) -> Self {
        Self {
            client,
            sync_mutex: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the sync mutex shared with the watcher adapter.
    #[must_use]
    pub fn sync_mutex(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.sync_mutex)
    }

    /// Consumes CallbackList responses forever.
    ///
    /// A failed long poll backs off for the configured reset timeout before
    /// re-arming; a fulfilled one triggers a reconciliation pass under the
    /// sync mutex and re-arms immediately.
    pub fn run(&self) {
        loop {
            match self.run_once() {
                Ok(summary) => {
                    debug!(
                        fetched = summary.fetched,
                        stored = summary.stored,
                        removed = summary.removed,
                        failed = summary.failed,
                        "reconciliation pass complete"
                    );
                }
                Err(SyncError::Callback(error)) => {
                    let backoff = self.client.config().reset_timeout;
                    warn!(%error, ?backoff, "callback listing failed; backing off");
                    thread::sleep(backoff);
                }
            }
        }
    }

    /// Performs one long poll followed by one reconciliation pass.
    pub fn run_once(&self) -> Result<PassSummary, SyncError> {
        let listing = self.client.callback_list().map_err(SyncError::Callback)?;
        let _pass_guard = guard(&self.sync_mutex);
        Ok(self.reconcile(&listing))
    }

    /// Builds the callback the watcher adapter invokes on local changes.
    ///
    /// The callback reconciles against a plain listing; the adapter already
    /// holds the sync mutex while running it.
    #[must_use]
    pub fn watcher_callback(engine: &Arc<Self>) -> Box<dyn Fn() + Send + Sync> {
        let engine = Arc::clone(engine);
        Box::new(move || match engine.client.list_all() {
            Ok(listing) => {
                let summary = engine.reconcile(&listing);
                debug!(
                    fetched = summary.fetched,
                    stored = summary.stored,
                    "watcher-driven pass complete"
                );
            }
            Err(error) => warn!(%error, "watcher-driven listing failed"),
        })
    }

    /// Reconciles the local mount against one server listing.
    ///
    /// Callers must already hold the sync mutex.
    pub(crate) fn reconcile(&self, listing: &FileList) -> PassSummary {
        let mut summary = PassSummary::default();

        // Tombstones go first: a tombstoned name still present locally would
        // otherwise look like a new local file and be stored straight back
        // to the server it was just deleted from.
        for name in &listing.tombstones {
            self.apply_tombstone(&mut summary, name);
        }

        let server: FxHashMap<&str, i64> = listing
            .files
            .iter()
            .map(|meta| (meta.name.as_str(), meta.mtime))
            .collect();
        let local: FxHashMap<String, FileStat> =
            match list_regular(self.client.mount().root()) {
                Ok(entries) => entries.into_iter().collect(),
                Err(error) => {
                    warn!(%error, "failed to snapshot local mount; skipping pass");
                    summary.failed += 1;
                    return summary;
                }
            };

        for (&name, &server_mtime) in &server {
            match local.get(name) {
                None => self.fetch_into(&mut summary, name),
                Some(stat) if stat.mtime < server_mtime => self.fetch_into(&mut summary, name),
                Some(stat) if stat.mtime > server_mtime => self.store_into(&mut summary, name),
                Some(_) => {}
            }
        }

        for name in local.keys() {
            if !server.contains_key(name.as_str()) {
                self.store_into(&mut summary, name);
            }
        }

        summary
    }

    fn fetch_into(&self, summary: &mut PassSummary, name: &str) {
        match self.client.fetch(name) {
            Ok(FetchOutcome::Fetched(_)) => summary.fetched += 1,
            Ok(FetchOutcome::AlreadyCurrent) => {}
            Err(error) => {
                warn!(name, %error, "fetch failed during pass");
                summary.failed += 1;
            }
        }
    }

    fn store_into(&self, summary: &mut PassSummary, name: &str) {
        match self.client.store(name) {
            Ok(StoreOutcome::Stored(_)) => summary.stored += 1,
            Ok(StoreOutcome::AlreadyCurrent) => {}
            Err(error) => {
                warn!(name, %error, "store failed during pass");
                summary.failed += 1;
            }
        }
    }

    /// Unlinks a tombstoned file locally; the server is never asked to
    /// delete anything here.
    fn apply_tombstone(&self, summary: &mut PassSummary, name: &str) {
        let path = match self.client.mount().wrap(name) {
            Ok(path) => path,
            Err(error) => {
                warn!(name, %error, "tombstone with unusable name ignored");
                summary.failed += 1;
                return;
            }
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(name, "tombstoned file removed locally");
                summary.removed += 1;
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(name, %error, "failed to remove tombstoned file");
                summary.failed += 1;
            }
        }
    }
}

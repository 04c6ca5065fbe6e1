use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use mount::list_regular;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::guard;

/// A coarse local-change notification.
///
/// The adapter deliberately does not care what changed or how; the name is
/// carried for logging only.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalChange {
    /// Name of the changed file, when the producer knows it.
    pub name: Option<String>,
}

/// Bridges an external file watcher into the sync machinery.
///
/// Every event takes the sync mutex shared with the [`crate::SyncEngine`]
/// and invokes the registered callback under it, so a watcher-driven action
/// can never interleave with a reconciliation pass.
pub struct WatcherAdapter {
    sync_mutex: Arc<Mutex<()>>,
    callback: Box<dyn Fn() + Send + Sync>,
}

impl WatcherAdapter {
    /// Creates an adapter around the shared sync mutex and callback.
    #[must_use]
    pub fn new(sync_mutex: Arc<Mutex<()>>, callback: Box<dyn Fn() + Send + Sync>) -> Self {
        Self {
            sync_mutex,
            callback,
        }
    }

    /// Handles one local-change notification.
    pub fn notify(&self) {
        let _watch_guard = guard(&self.sync_mutex);
        (self.callback)();
    }

    /// Consumes events until the producer side closes.
    pub fn run(&self, events: &Receiver<LocalChange>) {
        for change in events.iter() {
            debug!(name = ?change.name, "local change observed");
            self.notify();
        }
    }
}

impl std::fmt::Debug for WatcherAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherAdapter").finish_non_exhaustive()
    }
}

/// Spawns a polling stand-in for a platform file watcher.
///
/// Scans the mount on a fixed interval and emits one [`LocalChange`] per
/// file whose mtime or size moved since the previous scan, plus one for
/// every appearance or disappearance. The thread exits when the receiving
/// side of `events` is dropped.
pub fn spawn_poll_producer(
    mount_path: PathBuf,
    interval: Duration,
    events: Sender<LocalChange>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut previous: FxHashMap<String, (i64, u64)> = FxHashMap::default();
        loop {
            thread::sleep(interval);
            let current: FxHashMap<String, (i64, u64)> = match list_regular(&mount_path) {
                Ok(entries) => entries
                    .into_iter()
                    .map(|(name, stat)| (name, (stat.mtime, stat.size)))
                    .collect(),
                Err(error) => {
                    warn!(%error, "watch poll failed to list mount");
                    continue;
                }
            };

            let mut changed: Vec<String> = current
                .iter()
                .filter(|(name, state)| previous.get(*name) != Some(state))
                .map(|(name, _)| name.clone())
                .collect();
            changed.extend(
                previous
                    .keys()
                    .filter(|name| !current.contains_key(*name))
                    .cloned(),
            );

            for name in changed {
                if events.send(LocalChange { name: Some(name) }).is_err() {
                    return;
                }
            }
            previous = current;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notify_invokes_callback_under_mutex() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let adapter = WatcherAdapter::new(
            Arc::new(Mutex::new(())),
            Box::new(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );
        adapter.notify();
        adapter.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn run_drains_events_until_closed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let adapter = WatcherAdapter::new(
            Arc::new(Mutex::new(())),
            Box::new(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let (tx, rx) = unbounded();
        tx.send(LocalChange { name: None }).expect("send");
        tx.send(LocalChange {
            name: Some("a".to_owned()),
        })
        .expect("send");
        drop(tx);
        adapter.run(&rx);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn poll_producer_reports_new_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (tx, rx) = unbounded();
        let handle = spawn_poll_producer(
            temp.path().to_path_buf(),
            Duration::from_millis(20),
            tx,
        );

        std::fs::write(temp.path().join("fresh.txt"), b"new").expect("write");
        let change = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("change event");
        assert_eq!(change.name.as_deref(), Some("fresh.txt"));

        // A change after the receiver is gone makes the producer exit.
        drop(rx);
        std::fs::write(temp.path().join("more.txt"), b"x").expect("write");
        handle.join().expect("producer exits");
    }
}

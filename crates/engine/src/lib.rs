#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` keeps a client mount converged with the daemon's authoritative
//! copy. The [`SyncEngine`] consumes long-poll CallbackList responses and
//! reconciles the local directory against each one; the [`WatcherAdapter`]
//! funnels local-change events through the same mutual exclusion so the two
//! drivers never interleave.
//!
//! # Design
//!
//! A reconciliation pass compares the server listing with a fresh snapshot
//! of the local mount, per file and by mtime alone: the side with the newer
//! copy wins, equal times mean no work, and files only one side knows about
//! travel toward the other. Tombstones delivered with the listing unlink
//! local copies and are never echoed back to the server.
//!
//! The engine and the watcher share one **sync mutex**. Every pass and every
//! watcher-driven action holds it for its full duration; individual RPCs
//! inside a pass may block, which is acceptable because the mutex is
//! per-client and only serialises local orchestration.
//!
//! Per-file failures are that file's own problem: the pass logs them and
//! continues with the rest of the batch.
//!
//! # Invariants
//!
//! - A pass over an unchanged pair of directories performs zero transfers.
//! - Tombstone handling never issues server-side deletes.
//! - The watcher callback runs entirely under the sync mutex.

mod sync;
mod watcher;

pub use sync::{PassSummary, SyncEngine, SyncError};
pub use watcher::{LocalChange, WatcherAdapter, spawn_poll_producer};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

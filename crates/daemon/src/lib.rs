#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `daemon` implements the authoritative side of the DFS: the per-file write
//! lock manager, the tombstone set for propagating deletions, the file
//! service that answers every RPC, and the TCP server that dispatches
//! sessions onto worker threads.
//!
//! # Design
//!
//! - [`LockManager`] is a mutex-protected map from file name to holder
//!   identity. Acquisition is idempotent for the current holder and is never
//!   queued; the manager's mutex is held only across map updates, never
//!   across I/O.
//! - [`TombstoneSet`] records deleted names until a callback-list reply
//!   carrying them has been written, at which point exactly those names are
//!   removed.
//! - [`FileService`] owns the mount, the lock manager, the tombstone set,
//!   and the server-wide file-access mutex that serialises every operation
//!   touching file contents.
//! - [`Daemon`] binds a listener and fans sessions out to a fixed pool of
//!   worker threads over a crossbeam channel. Long-poll callback requests
//!   are not answered inline: the session worker parks the connection on the
//!   [`callback::CallbackQueue`], transferring ownership to the queue
//!   workers that later fulfil it.
//!
//! # Invariants
//!
//! - At most one lock entry exists per file name.
//! - Every mutating operation releases any lock it observed on all exit
//!   paths, success or failure.
//! - Tombstones only ever name files that existed on the server.

pub mod callback;
mod config;
mod lock;
mod server;
mod service;
mod tombstone;

pub use config::DaemonConfig;
pub use lock::{LockManager, LockOutcome};
pub use server::{BoundDaemon, Daemon};
pub use service::{FileService, ServiceError, SessionVerdict};
pub use tombstone::TombstoneSet;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

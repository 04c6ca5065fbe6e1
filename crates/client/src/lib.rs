#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `client` implements the client side of the DFS: deadline-bounded Store,
//! Fetch, Delete, List, Stat, and lock operations against a daemon, plus the
//! long-poll CallbackList used by the sync engine.
//!
//! # Design
//!
//! Every operation opens a fresh connection whose connect, read, and write
//! timeouts derive from the configured deadline, so a stalled daemon
//! surfaces as [`ClientError::DeadlineExceeded`] rather than a hung thread.
//! The long-poll CallbackList is the one exception: its read side waits
//! indefinitely, because the daemon fulfils it from a queue worker at its
//! own pace.
//!
//! Store and Fetch return outcome enums rather than overloading errors:
//! an up-to-date target is [`StoreOutcome::AlreadyCurrent`] /
//! [`FetchOutcome::AlreadyCurrent`], a no-op success.
//!
//! # Invariants
//!
//! - Store never opens an upload stream when the server copy is already at
//!   least as new as the local file.
//! - A failed Fetch never leaves a partial file behind.
//! - A fetched file's mtime equals the server's, so the next comparison is
//!   stable.

mod config;
mod connection;
mod error;
mod node;

pub use config::ClientConfig;
pub use error::ClientError;
pub use node::{DfsClient, FetchOutcome, StoreOutcome};

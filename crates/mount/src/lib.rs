#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `mount` provides the file-system primitives shared by the DFS daemon and
//! client: mount-relative name resolution, stat triples, CRC-32 checksums,
//! and enumeration of the regular files inside a mount directory.
//!
//! # Design
//!
//! The crate is intentionally small so the workspace can enforce strict
//! layering:
//!
//! - [`MountPath`] owns the mount root and is the single place where bare
//!   file names are validated and joined onto it. Names never carry path
//!   separators across the wire; [`MountPath::wrap`] is where that invariant
//!   is enforced.
//! - [`FileStat`] captures the `(mtime, ctime, size)` triple both sides use
//!   for synchronisation decisions.
//! - [`file_crc32`] streams a file through `crc32fast` for the on-demand
//!   content checksum.
//! - [`list_regular`] snapshots the regular files inside a mount directory,
//!   skipping everything a transfer must never touch.
//!
//! # Invariants
//!
//! - A name accepted by [`MountPath::wrap`] resolves to a direct child of the
//!   mount root; rejected names never reach the file system.
//! - [`list_regular`] only reports regular files, so callers can transfer
//!   every returned entry without re-checking file types.
//!
//! # Errors
//!
//! [`NameError`] reports names that would escape the mount directory.
//! [`StatError`] distinguishes missing files from other I/O failures so the
//! service layer can map them to distinct wire statuses.

mod checksum;
mod list;
mod path;
mod stat;

pub use checksum::file_crc32;
pub use list::list_regular;
pub use path::{MountPath, NameError};
pub use stat::{FileStat, StatError};

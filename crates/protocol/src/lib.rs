#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `protocol` defines the wire surface shared by the DFS daemon and client:
//! status codes, the frame envelope, and the message payload codecs for the
//! eight logical methods.
//!
//! # Design
//!
//! Every exchange is a sequence of frames. A frame is a one-byte
//! [`FrameKind`] tag followed by a big-endian `u32` payload length and the
//! payload itself; [`read_frame`] rejects lengths above [`MAX_FRAME_LEN`] so
//! a hostile peer cannot force unbounded allocation. Payloads are encoded
//! with hand-rolled big-endian codecs (length-prefixed strings, fixed-width
//! integers) rather than a serialisation framework, keeping the wire format
//! explicit and independently parseable.
//!
//! Streaming transfers are sequences of [`Chunk`] frames terminated by a
//! `Done` frame (uploads) or a `Reply` frame (downloads). Only the first
//! chunk of a stream populates the file name, client identity, and
//! modification time; receivers must ignore those fields on later chunks.
//!
//! # Invariants
//!
//! - A chunk payload never exceeds [`Chunk::MAX_PAYLOAD`] bytes; encoding a
//!   larger one fails rather than producing an oversized frame.
//! - Decoding consumes the entire payload; trailing bytes are a
//!   [`ProtocolError::TrailingBytes`] error, not silently ignored data.
//! - Status bytes round-trip exactly; unknown values are rejected.
//!
//! # Errors
//!
//! All decode and I/O failures surface as [`ProtocolError`]. Transport-level
//! timeouts remain visible through [`ProtocolError::Io`] so callers can map
//! them to their own deadline handling.

mod error;
mod frame;
mod message;
mod status;
mod wire;

pub use error::ProtocolError;
pub use frame::{FrameKind, MAX_FRAME_LEN, read_frame, write_frame};
pub use message::{Chunk, FileList, FileMeta, LockReply, LockRequest, NameRequest, Reply};
pub use status::Status;

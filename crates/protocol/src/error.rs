use std::io;

use thiserror::Error;

/// Errors produced while encoding, decoding, or transporting frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying transport I/O failed.
    #[error("transport I/O failed: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// A frame carried an unknown kind tag.
    #[error("unknown frame kind {0:#04x}")]
    UnknownFrameKind(u8),
    /// A reply carried an unknown status byte.
    #[error("unknown status byte {0:#04x}")]
    UnknownStatus(u8),
    /// A frame length exceeded the permitted maximum.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Length advertised by the frame header.
        len: usize,
        /// Maximum length accepted by this implementation.
        max: usize,
    },
    /// A chunk payload exceeded the permitted maximum.
    #[error("chunk payload of {len} bytes exceeds the {max} byte limit")]
    ChunkTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Maximum payload accepted by the chunk codec.
        max: usize,
    },
    /// A payload ended before the expected field was complete.
    #[error("payload truncated while reading {0}")]
    Truncated(&'static str),
    /// A payload contained bytes past the last expected field.
    #[error("payload carries {0} trailing bytes")]
    TrailingBytes(usize),
    /// A string field was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    /// The peer sent a frame that is not valid at this point in the exchange.
    #[error("unexpected {0:?} frame")]
    UnexpectedFrame(crate::FrameKind),
}

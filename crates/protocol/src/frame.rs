use std::io::{Read, Write};

use crate::ProtocolError;

/// Maximum frame payload accepted from the wire.
///
/// Listings grow with the mount directory, so the cap is generous; chunk
/// frames are additionally bounded by [`crate::Chunk::MAX_PAYLOAD`].
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Tag identifying the meaning of a frame's payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FrameKind {
    /// Opens a chunked upload; chunk frames follow.
    StoreFile,
    /// Requests a chunked download; payload is a [`crate::NameRequest`].
    GetFile,
    /// Requests a deletion; payload is a [`crate::NameRequest`].
    DeleteFile,
    /// Requests file metadata; payload is a [`crate::NameRequest`].
    GetFileStatus,
    /// Requests the full mount listing; empty payload.
    ListAllFiles,
    /// Requests a write lock; payload is a [`crate::LockRequest`].
    AcquireWriteLock,
    /// Parks a long-poll listing request; empty payload.
    CallbackList,
    /// One slice of a streamed file; payload is a [`crate::Chunk`].
    Chunk,
    /// Terminates an upload stream; empty payload.
    Done,
    /// Carries a [`crate::Reply`] with the final status of an exchange.
    Reply,
}

impl FrameKind {
    const fn as_u8(self) -> u8 {
        match self {
            FrameKind::StoreFile => 1,
            FrameKind::GetFile => 2,
            FrameKind::DeleteFile => 3,
            FrameKind::GetFileStatus => 4,
            FrameKind::ListAllFiles => 5,
            FrameKind::AcquireWriteLock => 6,
            FrameKind::CallbackList => 7,
            FrameKind::Chunk => 8,
            FrameKind::Done => 9,
            FrameKind::Reply => 10,
        }
    }

    fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            1 => Ok(FrameKind::StoreFile),
            2 => Ok(FrameKind::GetFile),
            3 => Ok(FrameKind::DeleteFile),
            4 => Ok(FrameKind::GetFileStatus),
            5 => Ok(FrameKind::ListAllFiles),
            6 => Ok(FrameKind::AcquireWriteLock),
            7 => Ok(FrameKind::CallbackList),
            8 => Ok(FrameKind::Chunk),
            9 => Ok(FrameKind::Done),
            10 => Ok(FrameKind::Reply),
            other => Err(ProtocolError::UnknownFrameKind(other)),
        }
    }
}

/// Writes one frame and flushes the transport.
pub fn write_frame(
    writer: &mut impl Write,
    kind: FrameKind,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut header = [0u8; 5];
    header[0] = kind.as_u8();
    header[1..].copy_from_slice(&(payload.len() as u32).to_be_bytes());
    writer.write_all(&header)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame, rejecting oversized payloads before allocating.
pub fn read_frame(reader: &mut impl Read) -> Result<(FrameKind, Vec<u8>), ProtocolError> {
    let mut header = [0u8; 5];
    reader.read_exact(&mut header)?;
    let kind = FrameKind::from_u8(header[0])?;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, FrameKind::GetFile, b"payload").expect("write");
        write_frame(&mut buf, FrameKind::Done, b"").expect("write");

        let mut cursor = Cursor::new(buf);
        let (kind, payload) = read_frame(&mut cursor).expect("read");
        assert_eq!(kind, FrameKind::GetFile);
        assert_eq!(payload, b"payload");
        let (kind, payload) = read_frame(&mut cursor).expect("read");
        assert_eq!(kind, FrameKind::Done);
        assert!(payload.is_empty());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut raw = vec![0x7fu8];
        raw.extend_from_slice(&0u32.to_be_bytes());
        let mut cursor = Cursor::new(raw);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::UnknownFrameKind(0x7f))
        ));
    }

    #[test]
    fn oversized_length_is_rejected_before_allocation() {
        let mut raw = vec![FrameKind::Chunk.as_u8()];
        raw.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut cursor = Cursor::new(raw);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn truncated_stream_surfaces_io_error() {
        let mut raw = vec![FrameKind::Chunk.as_u8()];
        raw.extend_from_slice(&8u32.to_be_bytes());
        raw.extend_from_slice(b"shor");
        let mut cursor = Cursor::new(raw);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::Io(_))
        ));
    }
}

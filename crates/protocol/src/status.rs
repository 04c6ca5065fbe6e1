use std::fmt;

use crate::ProtocolError;

/// Result code attached to every reply frame.
///
/// The taxonomy is deliberately small: anything that is not one of the named
/// conditions is reported as [`Status::Cancelled`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Status {
    /// The operation completed.
    Ok,
    /// The named file does not exist at the resolving party.
    NotFound,
    /// The target is already synchronised; the operation is a no-op success.
    AlreadyExists,
    /// A required write lock is held by a different client.
    ResourceExhausted,
    /// The caller's deadline expired before the operation completed.
    DeadlineExceeded,
    /// Any other failure.
    Cancelled,
}

impl Status {
    /// Returns `true` for [`Status::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Returns the wire byte for this status.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::NotFound => 1,
            Status::AlreadyExists => 2,
            Status::ResourceExhausted => 3,
            Status::DeadlineExceeded => 4,
            Status::Cancelled => 5,
        }
    }

    /// Decodes a wire byte into a status.
    pub fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(Status::Ok),
            1 => Ok(Status::NotFound),
            2 => Ok(Status::AlreadyExists),
            3 => Ok(Status::ResourceExhausted),
            4 => Ok(Status::DeadlineExceeded),
            5 => Ok(Status::Cancelled),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Ok => "ok",
            Status::NotFound => "not found",
            Status::AlreadyExists => "already exists",
            Status::ResourceExhausted => "resource exhausted",
            Status::DeadlineExceeded => "deadline exceeded",
            Status::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bytes_round_trip() {
        for status in [
            Status::Ok,
            Status::NotFound,
            Status::AlreadyExists,
            Status::ResourceExhausted,
            Status::DeadlineExceeded,
            Status::Cancelled,
        ] {
            assert_eq!(Status::from_u8(status.as_u8()).expect("decode"), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(matches!(
            Status::from_u8(0xff),
            Err(ProtocolError::UnknownStatus(0xff))
        ));
    }
}

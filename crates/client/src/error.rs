use std::io;
use std::time::Duration;

use mount::NameError;
use protocol::{ProtocolError, Status};
use thiserror::Error;

/// Errors surfaced by client operations.
///
/// The variants mirror the wire status taxonomy so every error maps to
/// exactly one [`Status`]; anything that is not one of the named conditions
/// collapses into [`ClientError::Cancelled`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The named file does not exist at the resolving party.
    #[error("file '{0}' was not found")]
    NotFound(String),
    /// The write lock is held by a different client.
    #[error("write lock on '{name}' is held by another client{}", holder_suffix(.holder))]
    LockHeld {
        /// File whose lock was refused.
        name: String,
        /// Holder identity, when the daemon reported one.
        holder: Option<String>,
    },
    /// The RPC deadline expired.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    /// A file name was rejected before reaching the wire.
    #[error(transparent)]
    Name(#[from] NameError),
    /// Any other failure.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

fn holder_suffix(holder: &Option<String>) -> String {
    match holder {
        Some(holder) if !holder.is_empty() => format!(" ('{holder}')"),
        _ => String::new(),
    }
}

impl ClientError {
    /// Returns the wire status this error corresponds to.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            ClientError::NotFound(_) => Status::NotFound,
            ClientError::LockHeld { .. } => Status::ResourceExhausted,
            ClientError::DeadlineExceeded(_) => Status::DeadlineExceeded,
            ClientError::Name(_) | ClientError::Cancelled(_) => Status::Cancelled,
        }
    }

    /// Maps a transport-layer failure, distinguishing deadline expiry.
    pub(crate) fn from_protocol(error: ProtocolError, deadline: Duration) -> Self {
        match error {
            ProtocolError::Io(io_error) => Self::from_io(io_error, deadline),
            other => ClientError::Cancelled(other.to_string()),
        }
    }

    /// Maps a raw I/O failure, distinguishing deadline expiry.
    pub(crate) fn from_io(error: io::Error, deadline: Duration) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                ClientError::DeadlineExceeded(deadline)
            }
            _ => ClientError::Cancelled(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_one_status() {
        assert_eq!(
            ClientError::NotFound("f".into()).status(),
            Status::NotFound
        );
        assert_eq!(
            ClientError::LockHeld {
                name: "f".into(),
                holder: Some("other".into()),
            }
            .status(),
            Status::ResourceExhausted
        );
        assert_eq!(
            ClientError::DeadlineExceeded(Duration::from_millis(100)).status(),
            Status::DeadlineExceeded
        );
        assert_eq!(
            ClientError::Cancelled("boom".into()).status(),
            Status::Cancelled
        );
    }

    #[test]
    fn timeouts_become_deadline_exceeded() {
        let deadline = Duration::from_millis(100);
        let error = ClientError::from_io(
            io::Error::new(io::ErrorKind::TimedOut, "slow"),
            deadline,
        );
        assert!(matches!(error, ClientError::DeadlineExceeded(_)));

        let error = ClientError::from_io(
            io::Error::new(io::ErrorKind::WouldBlock, "slow"),
            deadline,
        );
        assert!(matches!(error, ClientError::DeadlineExceeded(_)));
    }

    #[test]
    fn other_io_errors_become_cancelled() {
        let error = ClientError::from_io(
            io::Error::new(io::ErrorKind::ConnectionReset, "gone"),
            Duration::from_millis(100),
        );
        assert!(matches!(error, ClientError::Cancelled(_)));
    }
}

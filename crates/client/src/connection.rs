use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use protocol::{FrameKind, Reply, read_frame, write_frame};
use tracing::trace;

use crate::error::ClientError;

/// One RPC exchange over a fresh TCP connection.
///
/// Connect, read, and write timeouts all derive from the caller's deadline,
/// so no single blocking step can exceed it. Long-poll exchanges disable
/// the read timeout instead.
#[derive(Debug)]
pub(crate) struct Connection {
    stream: TcpStream,
    deadline: Duration,
}

impl Connection {
    /// Connects with every timeout bound to `deadline`.
    pub(crate) fn connect(addr: &str, deadline: Duration) -> Result<Self, ClientError> {
        Self::connect_with_read_timeout(addr, deadline, Some(deadline))
    }

    /// Connects for a long poll: the read side waits indefinitely.
    pub(crate) fn connect_long_poll(addr: &str, deadline: Duration) -> Result<Self, ClientError> {
        Self::connect_with_read_timeout(addr, deadline, None)
    }

    fn connect_with_read_timeout(
        addr: &str,
        deadline: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let candidates = resolve(addr, deadline)?;
        let mut last_error: Option<(SocketAddr, std::io::Error)> = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, deadline) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(read_timeout)
                        .map_err(|error| ClientError::from_io(error, deadline))?;
                    stream
                        .set_write_timeout(Some(deadline))
                        .map_err(|error| ClientError::from_io(error, deadline))?;
                    trace!(%candidate, "connected");
                    return Ok(Self { stream, deadline });
                }
                Err(error) => last_error = Some((candidate, error)),
            }
        }
        match last_error {
            Some((candidate, error)) => Err(match ClientError::from_io(error, deadline) {
                ClientError::Cancelled(detail) => {
                    ClientError::Cancelled(format!("failed to connect to {candidate}: {detail}"))
                }
                other => other,
            }),
            None => Err(ClientError::Cancelled(format!(
                "'{addr}' did not resolve to any address"
            ))),
        }
    }

    /// Sends one frame.
    pub(crate) fn send(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), ClientError> {
        write_frame(&mut self.stream, kind, payload)
            .map_err(|error| ClientError::from_protocol(error, self.deadline))
    }

    /// Receives one frame.
    pub(crate) fn recv(&mut self) -> Result<(FrameKind, Vec<u8>), ClientError> {
        read_frame(&mut self.stream).map_err(|error| ClientError::from_protocol(error, self.deadline))
    }

    /// Receives a frame that must be a reply.
    pub(crate) fn recv_reply(&mut self) -> Result<Reply, ClientError> {
        match self.recv()? {
            (FrameKind::Reply, payload) => Reply::decode(&payload)
                .map_err(|error| ClientError::from_protocol(error, self.deadline)),
            (other, _) => Err(ClientError::Cancelled(format!(
                "expected a reply frame, received {other:?}"
            ))),
        }
    }
}

fn resolve(addr: &str, deadline: Duration) -> Result<Vec<SocketAddr>, ClientError> {
    addr.to_socket_addrs()
        .map(Iterator::collect)
        .map_err(|error| match ClientError::from_io(error, deadline) {
            ClientError::Cancelled(detail) => {
                ClientError::Cancelled(format!("failed to resolve '{addr}': {detail}"))
            }
            other => other,
        })
}

//! Long-poll callback queue.
//!
//! A session worker that receives a `CallbackList` frame does not answer it.
//! Instead it parks the connection here, transferring ownership of the
//! socket into the queue. Queue workers drain parked requests, re-list the
//! mount, attach the pending tombstones, and send the reply from their own
//! thread. The parked connection is owned by exactly one place at any time:
//! the channel while parked, then the worker that dequeued it.

use std::net::{SocketAddr, TcpStream};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::service::FileService;

/// A long-poll request waiting for fulfilment.
#[derive(Debug)]
pub struct ParkedCallback {
    stream: TcpStream,
    peer: Option<SocketAddr>,
}

impl ParkedCallback {
    /// Parks the supplied connection.
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self { stream, peer }
    }
}

/// Hand-off channel between session workers and callback workers.
#[derive(Clone, Debug)]
pub struct CallbackQueue {
    tx: Sender<ParkedCallback>,
    rx: Receiver<ParkedCallback>,
}

impl CallbackQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Parks a request for later fulfilment.
    pub fn park(&self, parked: ParkedCallback) {
        debug!(peer = ?parked.peer, "callback request parked");
        // Send fails only when every receiver is gone, which means the
        // daemon is shutting down; the connection is dropped either way.
        if self.tx.send(parked).is_err() {
            warn!("callback queue has no workers; dropping parked request");
        }
    }

    /// Runs a worker loop until the queue is closed.
    pub fn run_worker(&self, service: &FileService) {
        while let Ok(mut parked) = self.rx.recv() {
            if let Err(error) = service.fulfill_callback(&mut parked.stream) {
                warn!(peer = ?parked.peer, %error, "callback fulfilment failed");
            }
        }
    }
}

impl Default for CallbackQueue {
    fn default() -> Self {
        Self::new()
    }
}

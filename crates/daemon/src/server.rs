use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, unbounded};
use mount::MountPath;
use tracing::{info, warn};

use crate::callback::{CallbackQueue, ParkedCallback};
use crate::config::DaemonConfig;
use crate::service::{FileService, SessionVerdict};

/// The DFS daemon entry point.
#[derive(Debug)]
pub struct Daemon {
    config: DaemonConfig,
}

impl Daemon {
    /// Creates a daemon from its configuration.
    #[must_use]
    pub fn new(config: DaemonConfig) -> Self {
        Self { config }
    }

    /// Binds the listener without serving yet.
    ///
    /// Binding separately lets callers (tests in particular) learn the
    /// ephemeral port before the accept loop starts.
    pub fn bind(self) -> io::Result<BoundDaemon> {
        let listener = TcpListener::bind(&self.config.listen_addr)?;
        let service = Arc::new(FileService::new(MountPath::new(
            self.config.mount_path.clone(),
        )));
        Ok(BoundDaemon {
            listener,
            service,
            config: self.config,
        })
    }
}

/// A daemon whose listener is bound and ready to serve.
#[derive(Debug)]
pub struct BoundDaemon {
    listener: TcpListener,
    service: Arc<FileService>,
    config: DaemonConfig,
}

impl BoundDaemon {
    /// Returns the bound listen address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves sessions until the listener fails.
    ///
    /// Sessions are handed to `num_workers` worker threads over a channel;
    /// parked callback requests move onward to `num_async_threads` queue
    /// workers.
    pub fn run(self) -> io::Result<()> {
        let queue = CallbackQueue::new();
        for index in 0..self.config.num_async_threads {
            let queue = queue.clone();
            let service = Arc::clone(&self.service);
            thread::Builder::new()
                .name(format!("dfsd-callback-{index}"))
                .spawn(move || queue.run_worker(&service))?;
        }

        let (session_tx, session_rx) = unbounded::<TcpStream>();
        for index in 0..self.config.num_workers {
            let rx = session_rx.clone();
            let service = Arc::clone(&self.service);
            let queue = queue.clone();
            thread::Builder::new()
                .name(format!("dfsd-session-{index}"))
                .spawn(move || session_worker(&rx, &service, &queue))?;
        }
        drop(session_rx);

        info!(
            addr = %self.listener.local_addr()?,
            mount = %self.config.mount_path.display(),
            "daemon serving"
        );
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    // Send fails only if every worker died; surface that as
                    // a fatal condition instead of spinning.
                    if session_tx.send(stream).is_err() {
                        return Err(io::Error::other("all session workers exited"));
                    }
                }
                Err(error) => warn!(%error, "accept failed"),
            }
        }
        Ok(())
    }
}

fn session_worker(rx: &Receiver<TcpStream>, service: &FileService, queue: &CallbackQueue) {
    while let Ok(stream) = rx.recv() {
        let peer = stream.peer_addr().ok();
        match service.serve_session(stream) {
            Ok(SessionVerdict::Completed) => {}
            Ok(SessionVerdict::Parked(stream)) => queue.park(ParkedCallback::new(stream)),
            Err(error) => warn!(?peer, %error, "session aborted"),
        }
    }
}

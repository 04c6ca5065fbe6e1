//! Shared fixtures for the daemon/client integration suites.

use std::net::SocketAddr;
use std::path::Path;
use std::thread;
use std::time::Duration;

use client::{ClientConfig, DfsClient};
use daemon::{Daemon, DaemonConfig};

/// Deadline generous enough for loopback traffic while keeping hung tests
/// short.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Starts a daemon on an ephemeral port serving `mount`, returning its
/// address. The daemon thread serves until the test process exits.
pub fn start_daemon(mount: &Path) -> SocketAddr {
    let config = DaemonConfig::new("127.0.0.1:0", mount)
        .with_num_workers(4)
        .with_num_async_threads(1);
    let bound = Daemon::new(config).bind().expect("bind daemon");
    let addr = bound.local_addr().expect("local addr");
    thread::spawn(move || bound.run());
    addr
}

/// Builds a client with the test deadline and a short callback back-off.
pub fn client_for(addr: SocketAddr, mount: &Path, client_id: &str) -> DfsClient {
    let config = ClientConfig::new(addr.to_string(), mount, client_id)
        .with_deadline_timeout(TEST_DEADLINE)
        .with_reset_timeout(Duration::from_millis(50));
    DfsClient::new(config).expect("client")
}

//! Deadline behaviour against a daemon that never answers.

use std::fs;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use client::{ClientConfig, ClientError, DfsClient};
use tempfile::tempdir;

const SHORT_DEADLINE: Duration = Duration::from_millis(100);

/// Accepts connections and parks them forever, so every read stalls.
fn start_black_hole() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (keep_tx, keep_rx) = mpsc::channel::<TcpStream>();
    thread::spawn(move || {
        // Holding the receiver keeps accepted sockets open without replying.
        let _parked: Vec<TcpStream> = keep_rx.iter().collect();
    });
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            if keep_tx.send(stream).is_err() {
                break;
            }
        }
    });
    addr
}

fn assert_deadline<T: std::fmt::Debug>(
    operation: &str,
    started: Instant,
    result: Result<T, ClientError>,
) {
    let elapsed = started.elapsed();
    let error = result.expect_err("operation should time out");
    assert!(
        matches!(error, ClientError::DeadlineExceeded(_)),
        "{operation} returned {error:?} instead of a deadline"
    );
    assert!(
        elapsed < Duration::from_millis(500),
        "{operation} took {elapsed:?} to observe a {SHORT_DEADLINE:?} deadline"
    );
}

#[test]
fn every_operation_observes_the_deadline() {
    let addr = start_black_hole();
    let mount = tempdir().expect("mount");
    fs::write(mount.path().join("present.txt"), b"data").expect("write");

    let config = ClientConfig::new(addr.to_string(), mount.path(), "client-a")
        .with_deadline_timeout(SHORT_DEADLINE);
    let client = DfsClient::new(config).expect("client");

    let started = Instant::now();
    assert_deadline("stat", started, client.stat("present.txt"));

    let started = Instant::now();
    assert_deadline("store", started, client.store("present.txt"));

    let started = Instant::now();
    assert_deadline("fetch", started, client.fetch("present.txt"));

    let started = Instant::now();
    assert_deadline("delete", started, client.delete("present.txt"));

    let started = Instant::now();
    assert_deadline("list", started, client.list());

    let started = Instant::now();
    assert_deadline("lock", started, client.acquire_write_lock("present.txt"));
}

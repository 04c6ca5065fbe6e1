//! Write-lock contention and release behaviour across clients.

mod common;

use std::fs;
use std::io::Write as _;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use client::ClientError;
use common::{client_for, start_daemon};
use protocol::{Chunk, FrameKind, Reply, Status, read_frame, write_frame};
use tempfile::tempdir;

#[test]
fn contended_lock_reports_holder_and_frees_after_store() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount_a = tempdir().expect("mount a");
    let mount_b = tempdir().expect("mount b");
    let client_a = client_for(addr, mount_a.path(), "client-a");
    let client_b = client_for(addr, mount_b.path(), "client-b");

    client_a.acquire_write_lock("x").expect("a acquires");

    let error = client_b.acquire_write_lock("x").expect_err("b is refused");
    let ClientError::LockHeld { holder, .. } = &error else {
        panic!("expected a lock refusal, got {error:?}");
    };
    assert_eq!(holder.as_deref(), Some("client-a"));

    // Storing under the held lock releases it on completion.
    fs::write(mount_a.path().join("x"), b"1").expect("write");
    client_a.store("x").expect("store");

    client_b.acquire_write_lock("x").expect("b acquires after release");
}

#[test]
fn reacquisition_by_holder_is_idempotent() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount = tempdir().expect("mount");
    let client = client_for(addr, mount.path(), "client-a");

    let first = client.acquire_write_lock("f").expect("first");
    assert!(first.granted);
    let second = client.acquire_write_lock("f").expect("second");
    assert!(second.granted);
    assert_eq!(second.holder, "client-a");
}

#[test]
fn store_without_lock_is_resource_exhausted() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    // Speak the wire protocol directly so no lock is ever acquired.
    let mut stream = TcpStream::connect(addr).expect("connect");
    write_frame(&mut stream, FrameKind::StoreFile, &[]).expect("open upload");
    let header = Chunk::upload_header("unlocked.txt", "intruder", b"data".to_vec());
    write_frame(
        &mut stream,
        FrameKind::Chunk,
        &header.encode().expect("encode"),
    )
    .expect("send chunk");
    write_frame(&mut stream, FrameKind::Done, &[]).expect("finish upload");

    let (kind, payload) = read_frame(&mut stream).expect("reply");
    assert_eq!(kind, FrameKind::Reply);
    let reply = Reply::decode(&payload).expect("decode");
    assert_eq!(reply.status, Status::ResourceExhausted);
    assert!(!server_mount.path().join("unlocked.txt").exists());
}

#[test]
fn abandoned_upload_releases_the_lock() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount_a = tempdir().expect("mount a");
    let client_a = client_for(addr, mount_a.path(), "client-a");
    client_a.acquire_write_lock("wedge.txt").expect("a acquires");

    // Open an upload as client-a and vanish mid-stream; the daemon must
    // release the lock when the stream dies.
    {
        let mut stream = TcpStream::connect(addr).expect("connect");
        write_frame(&mut stream, FrameKind::StoreFile, &[]).expect("open upload");
        let header = Chunk::upload_header("wedge.txt", "client-a", b"partial".to_vec());
        write_frame(
            &mut stream,
            FrameKind::Chunk,
            &header.encode().expect("encode"),
        )
        .expect("send chunk");
        stream.flush().expect("flush");
        // Dropped here without a Done frame.
    }

    let mount_b = tempdir().expect("mount b");
    let client_b = client_for(addr, mount_b.path(), "client-b");
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match client_b.acquire_write_lock("wedge.txt") {
            Ok(_) => break,
            Err(ClientError::LockHeld { .. }) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(error) => panic!("lock never released: {error:?}"),
        }
    }
}

#[test]
fn empty_name_lock_request_is_cancelled() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount = tempdir().expect("mount");
    let client = client_for(addr, mount.path(), "client-a");

    let error = client.acquire_write_lock("").expect_err("empty name");
    assert!(matches!(error, ClientError::Cancelled(_)));
}

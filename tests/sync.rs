//! Sync-engine reconciliation, tombstone propagation, and fixed points.

mod common;

use std::fs;
use std::sync::Arc;

use common::{client_for, start_daemon};
use engine::SyncEngine;
use filetime::{FileTime, set_file_mtime};
use tempfile::tempdir;

#[test]
fn missing_files_are_fetched_and_pass_reaches_a_fixed_point() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount_a = tempdir().expect("mount a");
    let mount_b = tempdir().expect("mount b");
    let client_a = client_for(addr, mount_a.path(), "client-a");
    let client_b = Arc::new(client_for(addr, mount_b.path(), "client-b"));

    for (name, contents) in [("one.txt", "1"), ("two.txt", "22"), ("three.txt", "333")] {
        fs::write(mount_a.path().join(name), contents).expect("write");
        client_a.store(name).expect("store");
    }

    let engine = SyncEngine::new(Arc::clone(&client_b));
    let first = engine.run_once().expect("first pass");
    assert_eq!(first.fetched, 3);
    assert_eq!(first.failed, 0);
    for (name, contents) in [("one.txt", "1"), ("two.txt", "22"), ("three.txt", "333")] {
        assert_eq!(
            fs::read(mount_b.path().join(name)).expect("read"),
            contents.as_bytes()
        );
    }

    // With no concurrent changes the next pass performs zero transfers.
    let second = engine.run_once().expect("second pass");
    assert_eq!(second.transfers(), 0);
    assert_eq!(second.failed, 0);
}

#[test]
fn local_only_files_are_stored_to_the_server() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount = tempdir().expect("mount");
    let client = Arc::new(client_for(addr, mount.path(), "client-a"));
    fs::write(mount.path().join("fresh.txt"), b"local data").expect("write");

    let engine = SyncEngine::new(Arc::clone(&client));
    let summary = engine.run_once().expect("pass");
    assert_eq!(summary.stored, 1);
    assert_eq!(
        fs::read(server_mount.path().join("fresh.txt")).expect("read"),
        b"local data"
    );
}

#[test]
fn tombstones_are_delivered_once_and_applied_locally() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount_a = tempdir().expect("mount a");
    let mount_b = tempdir().expect("mount b");
    let client_a = client_for(addr, mount_a.path(), "client-a");
    let client_b = Arc::new(client_for(addr, mount_b.path(), "client-b"));

    fs::write(mount_a.path().join("doc"), b"shared").expect("write");
    client_a.store("doc").expect("store");

    let engine = SyncEngine::new(Arc::clone(&client_b));
    engine.run_once().expect("b holds a copy");
    assert!(mount_b.path().join("doc").exists());

    client_a.delete("doc").expect("a deletes");

    let pass = engine.run_once().expect("tombstone pass");
    assert_eq!(pass.removed, 1);
    assert!(!mount_b.path().join("doc").exists());

    // The tombstone was consumed by its delivery; the next pass is a no-op.
    let quiet = engine.run_once().expect("quiet pass");
    assert_eq!(quiet.transfers(), 0);
}

#[test]
fn tombstone_appears_in_exactly_one_callback_listing() {
    let server_mount = tempdir().expect("server mount");
    let addr = start_daemon(server_mount.path());

    let mount = tempdir().expect("mount");
    let client = client_for(addr, mount.path(), "client-a");

    fs::write(mount.path().join("gone.txt"), b"x").expect("write");
    client.store("gone.txt").expect("store");
    client.delete("gone.txt").expect("delete");

    let listing = client.callback_list().expect("first listing");
    assert_eq!(listing.tombstones, ["gone.txt"]);

    let listing = client.callback_list().expect("second listing");
    assert!(listing.tombstones.is_empty());
}

#[test]
fn newer_local_copy_wins_the_conflict() {
    let server_mount = tempdir().expect("server mount");

    // Seed the authoritative mount directly with an old copy, so both
    // mtimes sit safely in the past.
    let now = FileTime::now().unix_seconds();
    fs::write(server_mount.path().join("z"), b"server version").expect("write");
    set_file_mtime(
        server_mount.path().join("z"),
        FileTime::from_unix_time(now - 100, 0),
    )
    .expect("age server copy");

    let addr = start_daemon(server_mount.path());
    let mount = tempdir().expect("mount");
    let client = Arc::new(client_for(addr, mount.path(), "client-b"));

    fs::write(mount.path().join("z"), b"local version").expect("write");
    set_file_mtime(
        mount.path().join("z"),
        FileTime::from_unix_time(now - 90, 0),
    )
    .expect("age local copy");

    let engine = SyncEngine::new(Arc::clone(&client));
    let summary = engine.run_once().expect("pass");
    assert_eq!(summary.stored, 1);

    assert_eq!(
        fs::read(server_mount.path().join("z")).expect("read"),
        b"local version"
    );
    let server_stat = mount::FileStat::read(&server_mount.path().join("z")).expect("stat");
    assert!(server_stat.mtime >= now - 90);
}

#[test]
fn newer_server_copy_wins_the_conflict() {
    let server_mount = tempdir().expect("server mount");
    let now = FileTime::now().unix_seconds();
    fs::write(server_mount.path().join("w"), b"server newer").expect("write");

    let addr = start_daemon(server_mount.path());
    let mount = tempdir().expect("mount");
    let client = Arc::new(client_for(addr, mount.path(), "client-b"));

    fs::write(mount.path().join("w"), b"local older").expect("write");
    set_file_mtime(
        mount.path().join("w"),
        FileTime::from_unix_time(now - 100, 0),
    )
    .expect("age local copy");

    let engine = SyncEngine::new(Arc::clone(&client));
    let summary = engine.run_once().expect("pass");
    assert_eq!(summary.fetched, 1);
    assert_eq!(
        fs::read(mount.path().join("w")).expect("read"),
        b"server newer"
    );
}

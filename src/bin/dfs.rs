#![deny(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command, value_parser};
use client::{ClientConfig, ClientError, DfsClient, FetchOutcome, StoreOutcome};
use crossbeam_channel::unbounded;
use engine::{SyncEngine, WatcherAdapter, spawn_poll_producer};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let matches = cli().get_matches();
    let client = match build_client(&matches) {
        Ok(client) => client,
        Err(message) => {
            eprintln!("dfs: {message}");
            return ExitCode::FAILURE;
        }
    };

    let result = match matches.subcommand() {
        Some(("store", sub)) => run_store(&client, name_arg(sub)),
        Some(("fetch", sub)) => run_fetch(&client, name_arg(sub)),
        Some(("delete", sub)) => run_delete(&client, name_arg(sub)),
        Some(("stat", sub)) => run_stat(&client, name_arg(sub)),
        Some(("list", _)) => run_list(&client),
        Some(("lock", sub)) => run_lock(&client, name_arg(sub)),
        Some(("sync", sub)) => run_sync(client, sub),
        _ => {
            eprintln!("dfs: a subcommand is required");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("dfs: {error} (status: {})", error.status());
            ExitCode::FAILURE
        }
    }
}

fn cli() -> Command {
    Command::new("dfs")
        .about("DFS client: one-shot operations and continuous sync")
        .subcommand_required(true)
        .arg(
            Arg::new("server")
                .long("server")
                .value_name("ADDR")
                .default_value("127.0.0.1:7530")
                .help("Daemon address"),
        )
        .arg(
            Arg::new("mount-path")
                .long("mount-path")
                .value_name("DIR")
                .required(true)
                .help("Local mount directory"),
        )
        .arg(
            Arg::new("client-id")
                .long("client-id")
                .value_name("ID")
                .help("Stable client identity; defaults to dfs-<pid>"),
        )
        .arg(
            Arg::new("deadline-ms")
                .long("deadline-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .default_value("5000")
                .help("Deadline applied to every RPC"),
        )
        .arg(
            Arg::new("chunk-size")
                .long("chunk-size")
                .value_name("BYTES")
                .value_parser(value_parser!(usize))
                .default_value("4096")
                .help("Upload chunk payload size (at most 4096)"),
        )
        .arg(
            Arg::new("reset-ms")
                .long("reset-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .default_value("3000")
                .help("Back-off after a failed callback listing"),
        )
        .subcommand(named("store", "Upload a file to the server"))
        .subcommand(named("fetch", "Download a file from the server"))
        .subcommand(named("delete", "Delete a file on the server"))
        .subcommand(named("stat", "Show server metadata for a file"))
        .subcommand(Command::new("list").about("List every file on the server"))
        .subcommand(named("lock", "Acquire the write lock for a file"))
        .subcommand(
            Command::new("sync")
                .about("Continuously synchronise the mount with the server")
                .arg(
                    Arg::new("poll-ms")
                        .long("poll-ms")
                        .value_name("MS")
                        .value_parser(value_parser!(u64))
                        .default_value("500")
                        .help("Local change poll interval"),
                ),
        )
}

fn named(name: &'static str, about: &'static str) -> Command {
    Command::new(name).about(about).arg(
        Arg::new("name")
            .value_name("NAME")
            .required(true)
            .help("Bare file name inside the mount"),
    )
}

fn name_arg(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("name")
        .map(String::as_str)
        .unwrap_or_default()
}

fn build_client(matches: &ArgMatches) -> Result<Arc<DfsClient>, String> {
    let server = matches
        .get_one::<String>("server")
        .map(String::as_str)
        .unwrap_or("127.0.0.1:7530");
    let mount_path = matches
        .get_one::<String>("mount-path")
        .ok_or("--mount-path is required")?;
    let client_id = matches
        .get_one::<String>("client-id")
        .cloned()
        .unwrap_or_else(|| format!("dfs-{}", std::process::id()));
    let deadline = matches.get_one::<u64>("deadline-ms").copied().unwrap_or(5000);
    let chunk_size = matches
        .get_one::<usize>("chunk-size")
        .copied()
        .unwrap_or(4096);
    let reset = matches.get_one::<u64>("reset-ms").copied().unwrap_or(3000);

    let config = ClientConfig::new(server, mount_path, client_id)
        .with_deadline_timeout(Duration::from_millis(deadline))
        .with_chunk_size(chunk_size)
        .with_reset_timeout(Duration::from_millis(reset));
    DfsClient::new(config)
        .map(Arc::new)
        .map_err(|error| error.to_string())
}

fn run_store(client: &DfsClient, name: &str) -> Result<(), ClientError> {
    match client.store(name)? {
        StoreOutcome::Stored(meta) => {
            println!("stored {name} ({} bytes, mtime {})", meta.size, meta.mtime);
        }
        StoreOutcome::AlreadyCurrent => println!("{name} is already current on the server"),
    }
    Ok(())
}

fn run_fetch(client: &DfsClient, name: &str) -> Result<(), ClientError> {
    match client.fetch(name)? {
        FetchOutcome::Fetched(meta) => {
            println!("fetched {name} ({} bytes, mtime {})", meta.size, meta.mtime);
        }
        FetchOutcome::AlreadyCurrent => println!("{name} is already current locally"),
    }
    Ok(())
}

fn run_delete(client: &DfsClient, name: &str) -> Result<(), ClientError> {
    match client.delete(name)? {
        Some(meta) => println!("deleted {name} ({} bytes)", meta.size),
        None => println!("deleted {name} (was already absent on the server)"),
    }
    Ok(())
}

fn run_stat(client: &DfsClient, name: &str) -> Result<(), ClientError> {
    let meta = client.stat(name)?;
    match meta.crc32 {
        Some(crc) => println!(
            "{name}: {} bytes, mtime {}, ctime {}, crc32 {crc:#010x}",
            meta.size, meta.mtime, meta.ctime
        ),
        None => println!(
            "{name}: {} bytes, mtime {}, ctime {}",
            meta.size, meta.mtime, meta.ctime
        ),
    }
    Ok(())
}

fn run_list(client: &DfsClient) -> Result<(), ClientError> {
    let mut entries: Vec<(String, i64)> = client.list()?.into_iter().collect();
    entries.sort();
    for (name, mtime) in entries {
        println!("{name}\tmtime {mtime}");
    }
    Ok(())
}

fn run_lock(client: &DfsClient, name: &str) -> Result<(), ClientError> {
    let reply = client.acquire_write_lock(name)?;
    println!("lock on {name} held by {}: {}", reply.holder, reply.message);
    Ok(())
}

fn run_sync(client: Arc<DfsClient>, matches: &ArgMatches) -> Result<(), ClientError> {
    let poll = matches.get_one::<u64>("poll-ms").copied().unwrap_or(500);
    let engine = Arc::new(SyncEngine::new(Arc::clone(&client)));

    let (events_tx, events_rx) = unbounded();
    let _producer = spawn_poll_producer(
        client.config().mount_path.clone(),
        Duration::from_millis(poll),
        events_tx,
    );
    let adapter = WatcherAdapter::new(engine.sync_mutex(), SyncEngine::watcher_callback(&engine));
    thread::spawn(move || adapter.run(&events_rx));

    println!(
        "syncing {} with {} as {}",
        client.config().mount_path.display(),
        client.config().server_addr,
        client.config().client_id
    );
    engine.run();
    Ok(())
}

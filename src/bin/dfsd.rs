#![deny(unsafe_code)]

use std::process::ExitCode;

use clap::{Arg, Command, value_parser};
use daemon::{Daemon, DaemonConfig};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("dfsd")
        .about("Serves a mount directory as the authoritative DFS copy")
        .arg(
            Arg::new("listen")
                .long("listen")
                .value_name("ADDR")
                .default_value("127.0.0.1:7530")
                .help("Address the daemon listens on"),
        )
        .arg(
            Arg::new("mount-path")
                .long("mount-path")
                .value_name("DIR")
                .required(true)
                .help("Directory served as the authoritative mount"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("4")
                .help("Session worker threads"),
        )
        .arg(
            Arg::new("async-threads")
                .long("async-threads")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Callback-queue worker threads"),
        )
        .get_matches();

    let listen = matches
        .get_one::<String>("listen")
        .map(String::as_str)
        .unwrap_or("127.0.0.1:7530");
    let Some(mount_path) = matches.get_one::<String>("mount-path") else {
        eprintln!("dfsd: --mount-path is required");
        return ExitCode::FAILURE;
    };
    let workers = matches.get_one::<usize>("workers").copied().unwrap_or(4);
    let async_threads = matches
        .get_one::<usize>("async-threads")
        .copied()
        .unwrap_or(1);

    let config = DaemonConfig::new(listen, mount_path)
        .with_num_workers(workers)
        .with_num_async_threads(async_threads);

    let bound = match Daemon::new(config).bind() {
        Ok(bound) => bound,
        Err(error) => {
            eprintln!("dfsd: failed to bind {listen}: {error}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = bound.run() {
        eprintln!("dfsd: serving failed: {error}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

use std::path::PathBuf;

/// Configuration for a [`crate::Daemon`].
#[derive(Clone, Debug)]
pub struct DaemonConfig {
    /// Address the listener binds to, e.g. `127.0.0.1:7530`.
    pub listen_addr: String,
    /// Directory served as the authoritative mount.
    pub mount_path: PathBuf,
    /// Number of session worker threads.
    pub num_workers: usize,
    /// Number of callback-queue worker threads.
    pub num_async_threads: usize,
}

impl DaemonConfig {
    /// Default session worker count.
    pub const DEFAULT_WORKERS: usize = 4;
    /// Default callback-queue worker count.
    pub const DEFAULT_ASYNC_THREADS: usize = 1;

    /// Builds a configuration with default worker counts.
    pub fn new(listen_addr: impl Into<String>, mount_path: impl Into<PathBuf>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            mount_path: mount_path.into(),
            num_workers: Self::DEFAULT_WORKERS,
            num_async_threads: Self::DEFAULT_ASYNC_THREADS,
        }
    }

    /// Overrides the session worker count; zero is clamped to one.
    #[must_use]
    pub fn with_num_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers.max(1);
        self
    }

    /// Overrides the callback-queue worker count; zero is clamped to one.
    #[must_use]
    pub fn with_num_async_threads(mut self, threads: usize) -> Self {
        self.num_async_threads = threads.max(1);
        self
    }
}

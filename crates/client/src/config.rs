use std::path::PathBuf;
use std::time::Duration;

use protocol::Chunk;

/// Configuration for a [`crate::DfsClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Daemon address, e.g. `127.0.0.1:7530`.
    pub server_addr: String,
    /// Local directory kept in sync with the daemon's mount.
    pub mount_path: PathBuf,
    /// Stable identity of this client; must be unique among concurrent
    /// clients of the same daemon and non-empty.
    pub client_id: String,
    /// Deadline applied to every RPC.
    pub deadline_timeout: Duration,
    /// Payload size for upload chunks.
    pub chunk_size: usize,
    /// Back-off applied after a failed CallbackList before re-arming.
    pub reset_timeout: Duration,
}

impl ClientConfig {
    /// Default RPC deadline.
    pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(5_000);
    /// Default CallbackList back-off.
    pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(3_000);

    /// Builds a configuration with default timeouts and chunk size.
    pub fn new(
        server_addr: impl Into<String>,
        mount_path: impl Into<PathBuf>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            server_addr: server_addr.into(),
            mount_path: mount_path.into(),
            client_id: client_id.into(),
            deadline_timeout: Self::DEFAULT_DEADLINE,
            chunk_size: Chunk::MAX_PAYLOAD,
            reset_timeout: Self::DEFAULT_RESET_TIMEOUT,
        }
    }

    /// Overrides the RPC deadline.
    #[must_use]
    pub fn with_deadline_timeout(mut self, deadline: Duration) -> Self {
        self.deadline_timeout = deadline;
        self
    }

    /// Overrides the upload chunk size, clamped to `1..=`
    /// [`Chunk::MAX_PAYLOAD`].
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, Chunk::MAX_PAYLOAD);
        self
    }

    /// Overrides the CallbackList back-off.
    #[must_use]
    pub fn with_reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = ClientConfig::new("127.0.0.1:7530", "/tmp/mnt", "client-1");
        assert_eq!(config.deadline_timeout, ClientConfig::DEFAULT_DEADLINE);
        assert_eq!(config.chunk_size, Chunk::MAX_PAYLOAD);
    }

    #[test]
    fn chunk_size_is_clamped() {
        let config = ClientConfig::new("127.0.0.1:7530", "/tmp/mnt", "client-1");
        assert_eq!(config.clone().with_chunk_size(0).chunk_size, 1);
        assert_eq!(
            config.with_chunk_size(1 << 20).chunk_size,
            Chunk::MAX_PAYLOAD
        );
    }
}

use std::fs::File;
use std::io::{Read, Write};

use filetime::FileTime;
use mount::{FileStat, MountPath, StatError};
use protocol::{
    Chunk, FileList, FileMeta, FrameKind, LockReply, NameRequest, Reply, Status,
};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;

/// Result of a Store operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreOutcome {
    /// The file was uploaded; the server's resulting metadata is attached.
    Stored(FileMeta),
    /// The server copy is at least as new; no upload stream was opened.
    AlreadyCurrent,
}

/// Result of a Fetch operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FetchOutcome {
    /// The file was downloaded; the server metadata is attached.
    Fetched(FileMeta),
    /// The local copy is at least as new; nothing was transferred.
    AlreadyCurrent,
}

/// A DFS client node.
///
/// Operations are independent RPCs over fresh connections; the node itself
/// holds no connection state and is freely shareable across threads.
#[derive(Debug)]
pub struct DfsClient {
    config: ClientConfig,
    mount: MountPath,
}

impl DfsClient {
    /// Creates a client node, validating the configured identity.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.client_id.is_empty() {
            return Err(ClientError::Cancelled(
                "client id must not be empty".to_owned(),
            ));
        }
        let mount = MountPath::new(config.mount_path.clone());
        Ok(Self { config, mount })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the local mount.
    #[must_use]
    pub fn mount(&self) -> &MountPath {
        &self.mount
    }

    /// Uploads a local file to the server.
    ///
    /// The upload is skipped when the server copy is already at least as
    /// new, and requires the write lock, which the server releases when the
    /// upload ends.
    pub fn store(&self, name: &str) -> Result<StoreOutcome, ClientError> {
        let path = self.mount.wrap(name)?;
        let local = match FileStat::read(&path) {
            Ok(stat) => stat,
            Err(StatError::NotFound(_)) => return Err(ClientError::NotFound(name.to_owned())),
            Err(error) => return Err(ClientError::Cancelled(error.to_string())),
        };

        if let Some(server) = self.stat_remote(name)? {
            if local.mtime <= server.mtime {
                debug!(name, "server copy is current; skipping upload");
                return Ok(StoreOutcome::AlreadyCurrent);
            }
        }

        self.acquire_write_lock(name)?;

        let mut file = File::open(&path)
            .map_err(|error| ClientError::Cancelled(format!("failed to reopen '{name}': {error}")))?;
        let mut connection = self.connect()?;
        connection.send(FrameKind::StoreFile, &[])?;

        let mut block = vec![0u8; self.config.chunk_size];
        let mut first = true;
        loop {
            let read = file
                .read(&mut block)
                .map_err(|error| ClientError::Cancelled(format!("failed to read '{name}': {error}")))?;
            if read == 0 && !first {
                break;
            }
            // The header chunk always goes out, so empty files still reach
            // the server as a header-only chunk.
            let chunk = if first {
                Chunk::upload_header(name, &self.config.client_id, block[..read].to_vec())
            } else {
                Chunk::payload(block[..read].to_vec())
            };
            first = false;
            let encoded = chunk
                .encode()
                .map_err(|error| ClientError::from_protocol(error, self.config.deadline_timeout))?;
            connection.send(FrameKind::Chunk, &encoded)?;
            if read < block.len() {
                break;
            }
        }
        connection.send(FrameKind::Done, &[])?;

        let reply = connection.recv_reply()?;
        match reply.status {
            Status::Ok => {
                let meta = FileMeta::decode(&reply.body).map_err(|error| {
                    ClientError::from_protocol(error, self.config.deadline_timeout)
                })?;
                info!(name, size = local.size, "stored");
                Ok(StoreOutcome::Stored(meta))
            }
            other => Err(self.reply_error(other, &reply, name)),
        }
    }

    /// Downloads a file from the server into the local mount.
    ///
    /// A failed download removes the partial local file before returning.
    /// On success the local mtime is pinned to the server's.
    pub fn fetch(&self, name: &str) -> Result<FetchOutcome, ClientError> {
        let server = self
            .stat_remote(name)?
            .ok_or_else(|| ClientError::NotFound(name.to_owned()))?;

        let path = self.mount.wrap(name)?;
        match FileStat::read_if_exists(&path) {
            Ok(Some(local)) if local.mtime >= server.mtime => {
                debug!(name, "local copy is current; skipping download");
                return Ok(FetchOutcome::AlreadyCurrent);
            }
            Ok(_) => {}
            Err(error) => return Err(ClientError::Cancelled(error.to_string())),
        }

        let mut connection = self.connect()?;
        let request = NameRequest {
            name: name.to_owned(),
            client_id: self.config.client_id.clone(),
        };
        connection.send(FrameKind::GetFile, &request.encode())?;

        // The first frame decides whether a stream follows at all: a missing
        // file arrives as a bare reply before anything is created locally.
        let header = match connection.recv()? {
            (FrameKind::Chunk, payload) => Chunk::decode(&payload)
                .map_err(|error| ClientError::from_protocol(error, self.config.deadline_timeout))?,
            (FrameKind::Reply, payload) => {
                let reply = Reply::decode(&payload).map_err(|error| {
                    ClientError::from_protocol(error, self.config.deadline_timeout)
                })?;
                return Err(self.reply_error(reply.status, &reply, name));
            }
            (other, _) => {
                return Err(ClientError::Cancelled(format!(
                    "unexpected {other:?} frame in download stream"
                )));
            }
        };

        // If the truncating create itself fails, the previous local copy is
        // still intact and must not be cleaned up.
        let file = File::create(&path)
            .map_err(|error| ClientError::Cancelled(format!("failed to create '{name}': {error}")))?;

        match self.write_download(file, name, &header, &mut connection) {
            Ok(()) => {
                if let Err(error) =
                    filetime::set_file_mtime(&path, FileTime::from_unix_time(server.mtime, 0))
                {
                    warn!(name, %error, "failed to pin fetched mtime");
                }
                info!(name, size = server.size, "fetched");
                Ok(FetchOutcome::Fetched(server))
            }
            Err(error) => {
                if let Err(cleanup) = std::fs::remove_file(&path) {
                    warn!(name, %cleanup, "failed to remove partial download");
                }
                Err(error)
            }
        }
    }

    /// Writes the download body, consuming chunk frames until the final
    /// reply. The caller removes the partial file when this fails.
    fn write_download(
        &self,
        mut file: File,
        name: &str,
        header: &Chunk,
        connection: &mut Connection,
    ) -> Result<(), ClientError> {
        file.write_all(&header.content)
            .map_err(|error| ClientError::Cancelled(format!("failed to write '{name}': {error}")))?;
        loop {
            match connection.recv()? {
                (FrameKind::Chunk, payload) => {
                    let chunk = Chunk::decode(&payload).map_err(|error| {
                        ClientError::from_protocol(error, self.config.deadline_timeout)
                    })?;
                    file.write_all(&chunk.content).map_err(|error| {
                        ClientError::Cancelled(format!("failed to write '{name}': {error}"))
                    })?;
                }
                (FrameKind::Reply, payload) => {
                    let reply = Reply::decode(&payload).map_err(|error| {
                        ClientError::from_protocol(error, self.config.deadline_timeout)
                    })?;
                    if reply.status.is_ok() {
                        return Ok(());
                    }
                    return Err(self.reply_error(reply.status, &reply, name));
                }
                (other, _) => {
                    return Err(ClientError::Cancelled(format!(
                        "unexpected {other:?} frame in download stream"
                    )));
                }
            }
        }
    }

    /// Deletes a file on the server, then mirrors the deletion locally.
    ///
    /// The server is the source of truth: a server-side `NotFound` still
    /// removes any stale local copy and reports success with no metadata.
    pub fn delete(&self, name: &str) -> Result<Option<FileMeta>, ClientError> {
        let path = self.mount.wrap(name)?;
        self.acquire_write_lock(name)?;

        let mut connection = self.connect()?;
        let request = NameRequest {
            name: name.to_owned(),
            client_id: self.config.client_id.clone(),
        };
        connection.send(FrameKind::DeleteFile, &request.encode())?;
        let reply = connection.recv_reply()?;

        let meta = match reply.status {
            Status::Ok => {
                let meta = FileMeta::decode(&reply.body).map_err(|error| {
                    ClientError::from_protocol(error, self.config.deadline_timeout)
                })?;
                info!(name, "deleted on server");
                Some(meta)
            }
            Status::NotFound => {
                debug!(name, "server had no such file; cleaning up locally");
                None
            }
            other => return Err(self.reply_error(other, &reply, name)),
        };

        if std::fs::metadata(&path).is_ok() {
            std::fs::remove_file(&path).map_err(|error| {
                ClientError::Cancelled(format!("failed to remove local '{name}': {error}"))
            })?;
            debug!(name, "removed local copy");
        }
        Ok(meta)
    }

    /// Returns the server listing as a `name → mtime` map.
    pub fn list(&self) -> Result<FxHashMap<String, i64>, ClientError> {
        let list = self.list_all()?;
        Ok(list
            .files
            .into_iter()
            .map(|meta| (meta.name, meta.mtime))
            .collect())
    }

    /// Returns the full server listing.
    pub fn list_all(&self) -> Result<FileList, ClientError> {
        let mut connection = self.connect()?;
        connection.send(FrameKind::ListAllFiles, &[])?;
        let reply = connection.recv_reply()?;
        if !reply.status.is_ok() {
            return Err(self.reply_error(reply.status, &reply, ""));
        }
        FileList::decode(&reply.body)
            .map_err(|error| ClientError::from_protocol(error, self.config.deadline_timeout))
    }

    /// Returns the server metadata for one file.
    pub fn stat(&self, name: &str) -> Result<FileMeta, ClientError> {
        self.stat_remote(name)?
            .ok_or_else(|| ClientError::NotFound(name.to_owned()))
    }

    /// Requests the write lock for `name`.
    ///
    /// Granted and already-held-by-self both succeed; a refusal carries the
    /// holder reported by the daemon.
    pub fn acquire_write_lock(&self, name: &str) -> Result<LockReply, ClientError> {
        let mut connection = self.connect()?;
        let request = NameRequest {
            name: name.to_owned(),
            client_id: self.config.client_id.clone(),
        };
        connection.send(FrameKind::AcquireWriteLock, &request.encode())?;
        let reply = connection.recv_reply()?;
        match reply.status {
            Status::Ok => LockReply::decode(&reply.body)
                .map_err(|error| ClientError::from_protocol(error, self.config.deadline_timeout)),
            other => Err(self.reply_error(other, &reply, name)),
        }
    }

    /// Parks a CallbackList request and blocks until the daemon fulfils it.
    pub fn callback_list(&self) -> Result<FileList, ClientError> {
        let mut connection =
            Connection::connect_long_poll(&self.config.server_addr, self.config.deadline_timeout)?;
        connection.send(FrameKind::CallbackList, &[])?;
        let reply = connection.recv_reply()?;
        if !reply.status.is_ok() {
            return Err(self.reply_error(reply.status, &reply, ""));
        }
        FileList::decode(&reply.body)
            .map_err(|error| ClientError::from_protocol(error, self.config.deadline_timeout))
    }

    /// Stats a file on the server, mapping `NotFound` to `None`.
    fn stat_remote(&self, name: &str) -> Result<Option<FileMeta>, ClientError> {
        let mut connection = self.connect()?;
        let request = NameRequest {
            name: name.to_owned(),
            client_id: self.config.client_id.clone(),
        };
        connection.send(FrameKind::GetFileStatus, &request.encode())?;
        let reply = connection.recv_reply()?;
        match reply.status {
            Status::Ok => {
                let meta = FileMeta::decode(&reply.body).map_err(|error| {
                    ClientError::from_protocol(error, self.config.deadline_timeout)
                })?;
                Ok(Some(meta))
            }
            Status::NotFound => Ok(None),
            other => Err(self.reply_error(other, &reply, name)),
        }
    }

    fn connect(&self) -> Result<Connection, ClientError> {
        Connection::connect(&self.config.server_addr, self.config.deadline_timeout)
    }

    /// Maps a non-OK reply onto the client error taxonomy.
    fn reply_error(&self, status: Status, reply: &Reply, name: &str) -> ClientError {
        match status {
            Status::NotFound => ClientError::NotFound(name.to_owned()),
            Status::ResourceExhausted => {
                let holder = LockReply::decode(&reply.body)
                    .ok()
                    .map(|lock| lock.holder)
                    .filter(|holder| !holder.is_empty());
                ClientError::LockHeld {
                    name: name.to_owned(),
                    holder,
                }
            }
            Status::DeadlineExceeded => {
                ClientError::DeadlineExceeded(self.config.deadline_timeout)
            }
            Status::Ok | Status::AlreadyExists | Status::Cancelled => {
                let detail = LockReply::decode(&reply.body)
                    .ok()
                    .map(|lock| lock.message)
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| format!("server reported {status}"));
                ClientError::Cancelled(detail)
            }
        }
    }
}

use std::fs::File;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Mutex;

use mount::{FileStat, MountPath, StatError, file_crc32, list_regular};
use protocol::{
    Chunk, FileList, FileMeta, FrameKind, LockReply, NameRequest, ProtocolError, Reply, Status,
    read_frame, write_frame,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::guard;
use crate::lock::{LockManager, LockOutcome};
use crate::tombstone::TombstoneSet;

/// Errors that abort a session before a reply can be written.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The peer violated the wire protocol or the transport failed.
    #[error("session failed: {0}")]
    Protocol(
        #[from]
        #[source]
        ProtocolError,
    ),
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionVerdict {
    /// The exchange ran to completion and the connection can be dropped.
    Completed,
    /// The connection carries a parked long-poll request; ownership moves to
    /// the callback queue.
    Parked(TcpStream),
}

/// The authoritative file service.
///
/// One instance serves every session. All operations that touch file
/// contents run under the service-wide file mutex; the lock manager and the
/// tombstone set carry their own internal mutexes.
#[derive(Debug)]
pub struct FileService {
    mount: MountPath,
    locks: LockManager,
    tombstones: TombstoneSet,
    file_mutex: Mutex<()>,
}

impl FileService {
    /// Creates a service exposing `mount`.
    #[must_use]
    pub fn new(mount: MountPath) -> Self {
        Self {
            mount,
            locks: LockManager::new(),
            tombstones: TombstoneSet::new(),
            file_mutex: Mutex::new(()),
        }
    }

    /// Returns the lock manager.
    #[must_use]
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Returns the tombstone set.
    #[must_use]
    pub fn tombstones(&self) -> &TombstoneSet {
        &self.tombstones
    }

    /// Serves one session: reads the request frame and dispatches it.
    pub fn serve_session(&self, mut stream: TcpStream) -> Result<SessionVerdict, ServiceError> {
        let (kind, payload) = read_frame(&mut stream)?;
        match kind {
            FrameKind::StoreFile => self.store_file(&mut stream)?,
            FrameKind::GetFile => self.get_file(&mut stream, &payload)?,
            FrameKind::DeleteFile => self.delete_file(&mut stream, &payload)?,
            FrameKind::GetFileStatus => self.get_file_status(&mut stream, &payload)?,
            FrameKind::ListAllFiles => self.list_all_files(&mut stream)?,
            FrameKind::AcquireWriteLock => self.acquire_write_lock(&mut stream, &payload)?,
            FrameKind::CallbackList => return Ok(SessionVerdict::Parked(stream)),
            other => {
                warn!(?other, "unexpected opening frame");
                send_reply(&mut stream, &Reply::bare(Status::Cancelled))?;
            }
        }
        Ok(SessionVerdict::Completed)
    }

    /// Receives a chunked upload.
    ///
    /// The first chunk names the target and identifies the uploader, which
    /// must already hold the write lock. The lock is released on every exit
    /// path once the upload has been attributed.
    fn store_file(&self, stream: &mut TcpStream) -> Result<(), ServiceError> {
        // Identify the upload from the first chunk before touching the disk.
        let first = match read_frame(stream)? {
            (FrameKind::Chunk, payload) => Chunk::decode(&payload)?,
            (FrameKind::Done, _) => {
                warn!("upload stream ended before the header chunk");
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
            (other, _) => return Err(ProtocolError::UnexpectedFrame(other).into()),
        };

        let name = first.name.clone();
        let path = match self.mount.wrap(&name) {
            Ok(path) => path,
            Err(error) => {
                warn!(%error, "store rejected");
                drain_upload(stream)?;
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
        };
        if !self.locks.has_lock(&name, &first.client_id) {
            warn!(
                %name,
                client_id = %first.client_id,
                "store without write lock refused"
            );
            drain_upload(stream)?;
            return send_reply(stream, &Reply::bare(Status::ResourceExhausted));
        }

        info!(%name, client_id = %first.client_id, "receiving upload");
        let result = {
            let _file_guard = guard(&self.file_mutex);
            self.write_upload(stream, &path, first.content)
        };
        self.locks.release(&name);

        match result {
            Ok(()) => {
                // Failing to read the times back is not fatal; the write
                // itself succeeded.
                let meta = match FileStat::read(&path) {
                    Ok(stat) => file_meta(&name, stat, None),
                    Err(error) => {
                        warn!(%name, %error, "stat after store failed");
                        FileMeta {
                            name: name.clone(),
                            ..FileMeta::default()
                        }
                    }
                };
                info!(%name, size = meta.size, "upload stored");
                send_reply(stream, &Reply::with_body(Status::Ok, meta.encode()))
            }
            Err(UploadError::Disk(error)) => {
                warn!(%name, %error, "upload failed; removing partial file");
                if let Err(cleanup) = std::fs::remove_file(&path) {
                    debug!(%name, %cleanup, "partial file cleanup failed");
                }
                send_reply(stream, &Reply::bare(Status::Cancelled))
            }
            Err(UploadError::Wire(error)) => {
                // The transport is gone; no reply can be delivered.
                if let Err(cleanup) = std::fs::remove_file(&path) {
                    debug!(%name, %cleanup, "partial file cleanup failed");
                }
                Err(error.into())
            }
        }
    }

    /// Writes the upload body, consuming chunk frames until `Done`.
    fn write_upload(
        &self,
        stream: &mut TcpStream,
        path: &std::path::Path,
        first_content: Vec<u8>,
    ) -> Result<(), UploadError> {
        let mut file = File::create(path).map_err(UploadError::Disk)?;
        file.write_all(&first_content).map_err(UploadError::Disk)?;
        loop {
            match read_frame(stream).map_err(UploadError::Wire)? {
                (FrameKind::Chunk, payload) => {
                    let chunk = Chunk::decode(&payload).map_err(UploadError::Wire)?;
                    file.write_all(&chunk.content).map_err(UploadError::Disk)?;
                }
                (FrameKind::Done, _) => break,
                (other, _) => {
                    return Err(UploadError::Wire(ProtocolError::UnexpectedFrame(other)));
                }
            }
        }
        file.sync_all().map_err(UploadError::Disk)?;
        Ok(())
    }

    /// Streams a file to the client in bounded chunks.
    ///
    /// Downloads are not gated on the write lock; a concurrent writer is
    /// serialised by the file mutex instead.
    fn get_file(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<(), ServiceError> {
        let request = NameRequest::decode(payload)?;
        let path = match self.mount.wrap(&request.name) {
            Ok(path) => path,
            Err(error) => {
                warn!(%error, "fetch rejected");
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
        };

        let _file_guard = guard(&self.file_mutex);
        let stat = match FileStat::read(&path) {
            Ok(stat) => stat,
            Err(StatError::NotFound(_)) => {
                debug!(name = %request.name, "fetch of missing file");
                return send_reply(stream, &Reply::bare(Status::NotFound));
            }
            Err(error) => {
                warn!(name = %request.name, %error, "fetch failed to stat");
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
        };
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(error) => {
                warn!(name = %request.name, %error, "fetch failed to open");
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
        };

        info!(name = %request.name, size = stat.size, "streaming download");
        let mut block = vec![0u8; Chunk::MAX_PAYLOAD];
        let mut first = true;
        loop {
            let read = match file.read(&mut block) {
                Ok(read) => read,
                Err(error) => {
                    warn!(name = %request.name, %error, "read failed mid-download");
                    return send_reply(stream, &Reply::bare(Status::Cancelled));
                }
            };
            if read == 0 && !first {
                break;
            }
            let chunk = if first {
                Chunk::download_header(&request.name, stat.mtime, block[..read].to_vec())
            } else {
                Chunk::payload(block[..read].to_vec())
            };
            first = false;
            let encoded = chunk.encode()?;
            write_frame(stream, FrameKind::Chunk, &encoded)?;
            if read < block.len() {
                break;
            }
        }
        send_reply(stream, &Reply::bare(Status::Ok))
    }

    /// Unlinks a file and records a tombstone for it.
    fn delete_file(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<(), ServiceError> {
        let request = NameRequest::decode(payload)?;
        let path = match self.mount.wrap(&request.name) {
            Ok(path) => path,
            Err(error) => {
                warn!(%error, "delete rejected");
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
        };
        if !self.locks.has_lock(&request.name, &request.client_id) {
            warn!(
                name = %request.name,
                client_id = %request.client_id,
                "delete without write lock refused"
            );
            return send_reply(stream, &Reply::bare(Status::ResourceExhausted));
        }

        let reply = {
            let _file_guard = guard(&self.file_mutex);
            match FileStat::read(&path) {
                Err(StatError::NotFound(_)) => Reply::bare(Status::NotFound),
                Err(error) => {
                    warn!(name = %request.name, %error, "delete failed to stat");
                    Reply::bare(Status::Cancelled)
                }
                Ok(stat) => match std::fs::remove_file(&path) {
                    Ok(()) => {
                        self.tombstones.record(&request.name);
                        info!(name = %request.name, "file deleted");
                        Reply::with_body(Status::Ok, file_meta(&request.name, stat, None).encode())
                    }
                    Err(error) => {
                        warn!(name = %request.name, %error, "unlink failed");
                        Reply::bare(Status::Cancelled)
                    }
                },
            }
        };
        self.locks.release(&request.name);
        send_reply(stream, &reply)
    }

    /// Answers a metadata query, attaching the content checksum.
    fn get_file_status(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<(), ServiceError> {
        let request = NameRequest::decode(payload)?;
        let path = match self.mount.wrap(&request.name) {
            Ok(path) => path,
            Err(error) => {
                warn!(%error, "stat rejected");
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
        };
        let reply = match FileStat::read(&path) {
            Ok(stat) => {
                let crc32 = match file_crc32(&path) {
                    Ok(crc) => Some(crc),
                    Err(error) => {
                        debug!(name = %request.name, %error, "checksum unavailable");
                        None
                    }
                };
                Reply::with_body(Status::Ok, file_meta(&request.name, stat, crc32).encode())
            }
            Err(StatError::NotFound(_)) => Reply::bare(Status::NotFound),
            Err(error) => {
                warn!(name = %request.name, %error, "stat failed");
                Reply::bare(Status::Cancelled)
            }
        };
        send_reply(stream, &reply)
    }

    /// Returns the full mount listing.
    fn list_all_files(&self, stream: &mut TcpStream) -> Result<(), ServiceError> {
        let reply = match self.snapshot_listing() {
            Ok(files) => Reply::with_body(
                Status::Ok,
                FileList {
                    files,
                    tombstones: Vec::new(),
                }
                .encode(),
            ),
            Err(error) => {
                warn!(%error, "listing failed");
                Reply::bare(Status::Cancelled)
            }
        };
        send_reply(stream, &reply)
    }

    /// Grants or refuses the write lock for a file.
    ///
    /// Locks never time out: a holder that neither stores nor deletes leaves
    /// the file locked indefinitely.
    fn acquire_write_lock(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<(), ServiceError> {
        let request = NameRequest::decode(payload)?;
        let reply = match self.locks.acquire(&request.name, &request.client_id) {
            LockOutcome::Granted => Reply::with_body(
                Status::Ok,
                LockReply {
                    granted: true,
                    holder: request.client_id.clone(),
                    message: "lock acquired".to_owned(),
                }
                .encode(),
            ),
            LockOutcome::AlreadyHeldBySelf => Reply::with_body(
                Status::Ok,
                LockReply {
                    granted: true,
                    holder: request.client_id.clone(),
                    message: "lock already held".to_owned(),
                }
                .encode(),
            ),
            LockOutcome::HeldByOther(holder) => Reply::with_body(
                Status::ResourceExhausted,
                LockReply {
                    granted: false,
                    holder,
                    message: "lock is held by another client".to_owned(),
                }
                .encode(),
            ),
            LockOutcome::Rejected(reason) => Reply::with_body(
                Status::Cancelled,
                LockReply {
                    granted: false,
                    holder: String::new(),
                    message: reason.to_owned(),
                }
                .encode(),
            ),
        };
        send_reply(stream, &reply)
    }

    /// Fulfils a parked callback-list request.
    ///
    /// The listing is re-taken at fulfilment time and the tombstone snapshot
    /// is removed only after the reply has been written.
    pub fn fulfill_callback(&self, stream: &mut TcpStream) -> Result<(), ServiceError> {
        let files = match self.snapshot_listing() {
            Ok(files) => files,
            Err(error) => {
                warn!(%error, "callback listing failed");
                return send_reply(stream, &Reply::bare(Status::Cancelled));
            }
        };
        let tombstones = self.tombstones.snapshot();
        let list = FileList {
            files,
            tombstones: tombstones.clone(),
        };
        send_reply(stream, &Reply::with_body(Status::Ok, list.encode()))?;
        self.tombstones.remove_delivered(&tombstones);
        debug!(
            files = list.files.len(),
            tombstones = list.tombstones.len(),
            "callback fulfilled"
        );
        Ok(())
    }

    fn snapshot_listing(&self) -> std::io::Result<Vec<FileMeta>> {
        let _file_guard = guard(&self.file_mutex);
        let entries = list_regular(self.mount.root())?;
        Ok(entries
            .into_iter()
            .map(|(name, stat)| file_meta(&name, stat, None))
            .collect())
    }
}

enum UploadError {
    /// Writing the local file failed; the transport is still usable.
    Disk(std::io::Error),
    /// The transport itself failed; no reply can be delivered.
    Wire(ProtocolError),
}

fn file_meta(name: &str, stat: FileStat, crc32: Option<u32>) -> FileMeta {
    FileMeta {
        name: name.to_owned(),
        mtime: stat.mtime,
        ctime: stat.ctime,
        size: stat.size,
        crc32,
    }
}

fn send_reply(stream: &mut TcpStream, reply: &Reply) -> Result<(), ServiceError> {
    write_frame(stream, FrameKind::Reply, &reply.encode())?;
    Ok(())
}

/// Consumes the rest of a refused upload so the reply is not interleaved
/// with in-flight chunk frames.
fn drain_upload(stream: &mut TcpStream) -> Result<(), ServiceError> {
    loop {
        match read_frame(stream)? {
            (FrameKind::Chunk, _) => {}
            (FrameKind::Done, _) => return Ok(()),
            (other, _) => return Err(ProtocolError::UnexpectedFrame(other).into()),
        }
    }
}

use crate::wire::{WireReader, put_bytes, put_i64, put_str, put_u8, put_u32, put_u64};
use crate::{ProtocolError, Status};

/// One slice of a streamed file.
///
/// Only the first chunk of a stream carries `name`, `client_id`, and
/// `mtime`; the fields are empty or zero on every later chunk and receivers
/// must ignore them there. An empty `content` is legal and represents a
/// header-only chunk, which is how empty files travel.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Chunk {
    /// Target file name; populated only on the first chunk.
    pub name: String,
    /// Uploading client identity; populated only on the first chunk of an
    /// upload.
    pub client_id: String,
    /// Server-side mtime; populated only on the first chunk of a download.
    pub mtime: i64,
    /// Payload bytes.
    pub content: Vec<u8>,
}

impl Chunk {
    /// Largest payload a single chunk may carry.
    pub const MAX_PAYLOAD: usize = 4096;

    /// Builds the leading chunk of an upload stream.
    #[must_use]
    pub fn upload_header(name: &str, client_id: &str, content: Vec<u8>) -> Self {
        Self {
            name: name.to_owned(),
            client_id: client_id.to_owned(),
            mtime: 0,
            content,
        }
    }

    /// Builds the leading chunk of a download stream.
    #[must_use]
    pub fn download_header(name: &str, mtime: i64, content: Vec<u8>) -> Self {
        Self {
            name: name.to_owned(),
            client_id: String::new(),
            mtime,
            content,
        }
    }

    /// Builds a follow-up chunk carrying only payload bytes.
    #[must_use]
    pub fn payload(content: Vec<u8>) -> Self {
        Self {
            name: String::new(),
            client_id: String::new(),
            mtime: 0,
            content,
        }
    }

    /// Encodes the chunk, rejecting oversized payloads.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.content.len() > Self::MAX_PAYLOAD {
            return Err(ProtocolError::ChunkTooLarge {
                len: self.content.len(),
                max: Self::MAX_PAYLOAD,
            });
        }
        let mut buf = Vec::with_capacity(self.content.len() + 64);
        put_str(&mut buf, &self.name);
        put_str(&mut buf, &self.client_id);
        put_i64(&mut buf, self.mtime);
        put_bytes(&mut buf, &self.content);
        Ok(buf)
    }

    /// Decodes a chunk payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(payload);
        let name = reader.take_str("chunk name")?;
        let client_id = reader.take_str("chunk client id")?;
        let mtime = reader.take_i64("chunk mtime")?;
        let content = reader.take_bytes("chunk content")?.to_vec();
        reader.finish()?;
        if content.len() > Self::MAX_PAYLOAD {
            return Err(ProtocolError::ChunkTooLarge {
                len: content.len(),
                max: Self::MAX_PAYLOAD,
            });
        }
        Ok(Self {
            name,
            client_id,
            mtime,
            content,
        })
    }
}

/// Metadata describing one file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileMeta {
    /// Bare file name.
    pub name: String,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: i64,
    /// Change time in seconds since the Unix epoch.
    pub ctime: i64,
    /// Size in bytes.
    pub size: u64,
    /// CRC-32 of the contents, when the responder computed one.
    pub crc32: Option<u32>,
}

impl FileMeta {
    /// Encodes the metadata record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.name.len() + 32);
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        put_str(buf, &self.name);
        put_i64(buf, self.mtime);
        put_i64(buf, self.ctime);
        put_u64(buf, self.size);
        match self.crc32 {
            Some(crc) => {
                put_u8(buf, 1);
                put_u32(buf, crc);
            }
            None => put_u8(buf, 0),
        }
    }

    /// Decodes a metadata record.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(payload);
        let meta = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(meta)
    }

    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let name = reader.take_str("meta name")?;
        let mtime = reader.take_i64("meta mtime")?;
        let ctime = reader.take_i64("meta ctime")?;
        let size = reader.take_u64("meta size")?;
        let crc32 = match reader.take_u8("meta crc flag")? {
            0 => None,
            _ => Some(reader.take_u32("meta crc32")?),
        };
        Ok(Self {
            name,
            mtime,
            ctime,
            size,
            crc32,
        })
    }
}

/// Snapshot of the server mount plus pending tombstones.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileList {
    /// Every regular file in the mount.
    pub files: Vec<FileMeta>,
    /// Names deleted on the server since the previous delivery.
    pub tombstones: Vec<String>,
}

impl FileList {
    /// Encodes the listing.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, u32::try_from(self.files.len()).unwrap_or(u32::MAX));
        for file in &self.files {
            file.encode_into(&mut buf);
        }
        put_u32(
            &mut buf,
            u32::try_from(self.tombstones.len()).unwrap_or(u32::MAX),
        );
        for name in &self.tombstones {
            put_str(&mut buf, name);
        }
        buf
    }

    /// Decodes a listing.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(payload);
        let file_count = reader.take_u32("file count")?;
        let mut files = Vec::with_capacity(file_count.min(1024) as usize);
        for _ in 0..file_count {
            files.push(FileMeta::decode_from(&mut reader)?);
        }
        let tombstone_count = reader.take_u32("tombstone count")?;
        let mut tombstones = Vec::with_capacity(tombstone_count.min(1024) as usize);
        for _ in 0..tombstone_count {
            tombstones.push(reader.take_str("tombstone name")?);
        }
        reader.finish()?;
        Ok(Self { files, tombstones })
    }
}

/// Names a file on behalf of a client.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NameRequest {
    /// Bare file name.
    pub name: String,
    /// Requesting client identity.
    pub client_id: String,
}

impl NameRequest {
    /// Encodes the request.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.name.len() + self.client_id.len() + 8);
        put_str(&mut buf, &self.name);
        put_str(&mut buf, &self.client_id);
        buf
    }

    /// Decodes a request.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(payload);
        let name = reader.take_str("request name")?;
        let client_id = reader.take_str("request client id")?;
        reader.finish()?;
        Ok(Self { name, client_id })
    }
}

/// Requests the write lock for a file.
pub type LockRequest = NameRequest;

/// Outcome of a lock request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LockReply {
    /// Whether the requesting client now holds the lock.
    pub granted: bool,
    /// Current holder, when one exists.
    pub holder: String,
    /// Human-readable diagnostic.
    pub message: String,
}

impl LockReply {
    /// Encodes the reply.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.holder.len() + self.message.len() + 16);
        put_u8(&mut buf, u8::from(self.granted));
        put_str(&mut buf, &self.holder);
        put_str(&mut buf, &self.message);
        buf
    }

    /// Decodes a reply.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(payload);
        let granted = reader.take_u8("lock granted")? != 0;
        let holder = reader.take_str("lock holder")?;
        let message = reader.take_str("lock message")?;
        reader.finish()?;
        Ok(Self {
            granted,
            holder,
            message,
        })
    }
}

/// Final status of an exchange plus an operation-specific body.
///
/// The body is interpreted by the caller according to the method it invoked:
/// [`FileMeta`] for Store/Delete/Stat, [`FileList`] for listings,
/// [`LockReply`] for lock requests, empty otherwise.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    /// Result code.
    pub status: Status,
    /// Encoded operation-specific body; may be empty.
    pub body: Vec<u8>,
}

impl Reply {
    /// Builds a reply with an empty body.
    #[must_use]
    pub fn bare(status: Status) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// Builds a reply carrying an encoded body.
    #[must_use]
    pub fn with_body(status: Status, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Encodes the reply.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.body.len() + 1);
        put_u8(&mut buf, self.status.as_u8());
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Decodes a reply.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(payload);
        let status = Status::from_u8(reader.take_u8("reply status")?)?;
        Ok(Self {
            status,
            body: payload[1..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_round_trips_with_header_fields() {
        let chunk = Chunk::upload_header("report.txt", "client-1", b"body".to_vec());
        let decoded = Chunk::decode(&chunk.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn header_only_chunk_is_legal() {
        let chunk = Chunk::upload_header("empty.bin", "client-1", Vec::new());
        let decoded = Chunk::decode(&chunk.encode().expect("encode")).expect("decode");
        assert!(decoded.content.is_empty());
        assert_eq!(decoded.name, "empty.bin");
    }

    #[test]
    fn oversized_chunk_is_rejected_at_encode() {
        let chunk = Chunk::payload(vec![0u8; Chunk::MAX_PAYLOAD + 1]);
        assert!(matches!(
            chunk.encode(),
            Err(ProtocolError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn file_meta_round_trips_with_and_without_crc() {
        let with_crc = FileMeta {
            name: "a".to_owned(),
            mtime: 1_700_000_000,
            ctime: 1_700_000_001,
            size: 42,
            crc32: Some(0xCBF4_3926),
        };
        assert_eq!(FileMeta::decode(&with_crc.encode()).expect("decode"), with_crc);

        let without_crc = FileMeta {
            crc32: None,
            ..with_crc
        };
        assert_eq!(
            FileMeta::decode(&without_crc.encode()).expect("decode"),
            without_crc
        );
    }

    #[test]
    fn file_list_round_trips() {
        let list = FileList {
            files: vec![
                FileMeta {
                    name: "a".to_owned(),
                    mtime: 1,
                    ctime: 2,
                    size: 3,
                    crc32: None,
                },
                FileMeta {
                    name: "b".to_owned(),
                    mtime: 4,
                    ctime: 5,
                    size: 6,
                    crc32: Some(7),
                },
            ],
            tombstones: vec!["gone.txt".to_owned()],
        };
        assert_eq!(FileList::decode(&list.encode()).expect("decode"), list);
    }

    #[test]
    fn empty_file_list_round_trips() {
        let list = FileList::default();
        assert_eq!(FileList::decode(&list.encode()).expect("decode"), list);
    }

    #[test]
    fn lock_reply_round_trips() {
        let reply = LockReply {
            granted: false,
            holder: "client-2".to_owned(),
            message: "lock is held by another client".to_owned(),
        };
        assert_eq!(LockReply::decode(&reply.encode()).expect("decode"), reply);
    }

    #[test]
    fn reply_carries_status_and_body() {
        let meta = FileMeta {
            name: "x".to_owned(),
            mtime: 9,
            ctime: 9,
            size: 1,
            crc32: None,
        };
        let reply = Reply::with_body(Status::Ok, meta.encode());
        let decoded = Reply::decode(&reply.encode()).expect("decode");
        assert_eq!(decoded.status, Status::Ok);
        assert_eq!(FileMeta::decode(&decoded.body).expect("meta"), meta);
    }

    #[test]
    fn truncated_name_request_is_rejected() {
        let request = NameRequest {
            name: "file".to_owned(),
            client_id: "client".to_owned(),
        };
        let encoded = request.encode();
        assert!(NameRequest::decode(&encoded[..encoded.len() - 2]).is_err());
    }
}

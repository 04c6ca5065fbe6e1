use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_BLOCK: usize = 64 * 1024;

/// Computes the CRC-32 checksum of a file's contents.
///
/// The file is streamed in fixed-size blocks so arbitrarily large files never
/// occupy more than one block of memory.
pub fn file_crc32(path: &Path) -> io::Result<u32> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut block = vec![0u8; READ_BLOCK];
    loop {
        let read = file.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_has_zero_crc() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("empty");
        std::fs::write(&path, b"").expect("write");
        assert_eq!(file_crc32(&path).expect("crc"), 0);
    }

    #[test]
    fn known_vector_matches() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("vector");
        std::fs::write(&path, b"123456789").expect("write");
        // Standard CRC-32 check value for the ASCII digits 1-9.
        assert_eq!(file_crc32(&path).expect("crc"), 0xCBF4_3926);
    }

    #[test]
    fn missing_file_surfaces_not_found() {
        let temp = tempdir().expect("tempdir");
        let error = file_crc32(&temp.path().join("ghost")).expect_err("missing");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn checksum_changes_with_content() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("data");
        std::fs::write(&path, b"aaaa").expect("write");
        let first = file_crc32(&path).expect("crc");
        std::fs::write(&path, b"aaab").expect("write");
        let second = file_crc32(&path).expect("crc");
        assert_ne!(first, second);
    }
}

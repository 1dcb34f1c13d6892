//! Streaming content hashing for local files.
//!
//! Produces the MD5 hex digest a storage backend reports as an object's
//! etag, so local files can be diffed against remote state without a
//! second read.

use crate::{Error, Result};
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 256 * 1024;

/// Compute the lowercase MD5 hex digest of a local file.
///
/// The file is streamed in chunks; it is never held in memory whole. The
/// blocking read runs off the async runtime.
pub async fn hash_file(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file_sync(&path))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn hash_file_sync(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_hash_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, b"").unwrap();

        let hash = hash_file(&path).await.unwrap();
        assert_eq!(hash, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn test_hash_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello world").unwrap();

        let hash = hash_file(&path).await.unwrap();
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[tokio::test]
    async fn test_hash_spans_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        fs::write(&path, vec![0xABu8; CHUNK_SIZE + 17]).unwrap();

        let streamed = hash_file(&path).await.unwrap();
        let whole = format!("{:x}", md5::compute(vec![0xABu8; CHUNK_SIZE + 17]));
        assert_eq!(streamed, whole);
    }

    #[tokio::test]
    async fn test_hash_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

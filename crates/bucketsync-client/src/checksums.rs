//! Content checksums in the object store's entity-tag conventions.
//!
//! - Objects uploaded in one request have `hex(md5(content))` as their ETag.
//! - Multipart objects have `hex(md5(md5(part_1) || ... || md5(part_n)))-n`,
//!   where each `md5(part_i)` is the raw 16-byte digest.

use std::path::Path;

use digest::Digest;
use md5::Md5;
use tokio::io::AsyncReadExt;

/// Files larger than this are uploaded with the multipart sub-protocol.
pub const MULTIPART_CUTOFF: u64 = 5 * 1024 * 1024;

/// Size of every multipart part except possibly the last.
pub const MULTIPART_PART_SIZE: u64 = 5 * 1024 * 1024;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Hex-encoded MD5 digest of `data`.
///
/// # Examples
///
/// ```
/// use bucketsync_client::checksums::md5_hex;
///
/// assert_eq!(md5_hex(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Number of parts a multipart upload of `size` bytes uses.
#[must_use]
pub fn part_count(size: u64, part_size: u64) -> u64 {
    size.div_ceil(part_size)
}

/// Composite ETag from the raw MD5 digests of each part.
fn composite_etag(part_digests: &[u8], parts: usize) -> String {
    format!("{}-{parts}", hex::encode(Md5::digest(part_digests)))
}

/// Multipart ETag of an in-memory buffer split into `part_size` chunks.
///
/// # Examples
///
/// ```
/// use bucketsync_client::checksums::multipart_etag;
///
/// let etag = multipart_etag(b"hello world", 6);
/// assert!(etag.ends_with("-2"));
/// ```
#[must_use]
pub fn multipart_etag(data: &[u8], part_size: usize) -> String {
    let mut digests = Vec::with_capacity(data.len().div_ceil(part_size.max(1)) * 16);
    let mut parts = 0;
    for chunk in data.chunks(part_size.max(1)) {
        digests.extend_from_slice(&Md5::digest(chunk));
        parts += 1;
    }
    composite_etag(&digests, parts)
}

/// Hex MD5 of a file's content, read in fixed-size buffers.
pub async fn file_md5_hex(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Multipart ETag of a file split into `part_size` chunks.
///
/// Produces the value the object store reports for the same file uploaded
/// with [`MULTIPART_PART_SIZE`] parts when `part_size` matches.
pub async fn file_multipart_etag(path: &Path, part_size: u64) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let part_size = part_size.max(1);
    let mut digests = Vec::new();
    let mut parts = 0;
    let mut hasher = Md5::new();
    let mut in_part: u64 = 0;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let want = usize::try_from(part_size - in_part)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        in_part += n as u64;
        if in_part == part_size {
            digests.extend_from_slice(&std::mem::take(&mut hasher).finalize());
            parts += 1;
            in_part = 0;
        }
    }
    if in_part > 0 {
        digests.extend_from_slice(&hasher.finalize());
        parts += 1;
    }
    Ok(composite_etag(&digests, parts))
}

/// Hash a local file in the same convention as `remote_etag`.
///
/// A remote tag of the form `<hex>-<n>` selects the multipart convention
/// with [`MULTIPART_PART_SIZE`] parts; anything else selects plain MD5.
pub async fn file_etag_like(path: &Path, remote_etag: &str) -> std::io::Result<String> {
    let multipart = remote_etag
        .rsplit_once('-')
        .is_some_and(|(_, n)| n.parse::<u64>().is_ok());
    if multipart {
        file_multipart_etag(path, MULTIPART_PART_SIZE).await
    } else {
        file_md5_hex(path).await
    }
}

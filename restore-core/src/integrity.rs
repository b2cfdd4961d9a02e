//! Snapshot Integrity Reader: buffers a fetched blob fully, optionally
//! decompresses it, and validates the trailing SHA-256 that delta snapshots
//! carry.

use crate::{
    compression::{read_to_end, Compressor},
    error::{RestoreError, RestoreResult},
};
use sha2::{Digest, Sha256};
use tokio::io::AsyncRead;

const HASH_LEN: usize = 32;

/// Reads `stream` fully, decompressing it first if `suffix` names a known
/// codec, and returns the raw buffer with no further interpretation.
///
/// Used for base snapshots, which skip the trailing-hash check performed by
/// [`read_and_verify`] — integrity of the base bbolt file is instead checked
/// by the etcd snapshot-restore primitive itself.
pub async fn read(
    stream: impl AsyncRead + Unpin,
    suffix: &str,
    compressor: &dyn Compressor,
) -> RestoreResult<Vec<u8>> {
    let raw = read_to_end(stream).await?;
    match compressor.is_compressed(suffix) {
        Some(codec) => {
            log::debug!("decompressing {} bytes with {codec:?}", raw.len());
            compressor.decompress(codec, raw).await
        }
        None => Ok(raw),
    }
}

/// Reads `stream` fully and validates the trailing 32-byte SHA-256, returning
/// only the payload that preceded it. Used for delta snapshots.
pub async fn read_and_verify(
    stream: impl AsyncRead + Unpin,
    suffix: &str,
    compressor: &dyn Compressor,
) -> RestoreResult<Vec<u8>> {
    let buf = read_to_end(stream).await?;
    verify_buf(buf, suffix, compressor).await
}

/// Decompresses an already-buffered blob (if `suffix` names a known codec)
/// and validates its trailing 32-byte SHA-256, returning the payload that
/// preceded it.
///
/// Used by the applier, which reads a fetched delta back off disk as a
/// buffer rather than a live stream — the fetcher persists each delta
/// exactly as fetched, compression and trailing hash intact, and defers both
/// decompression and verification to whichever code path later decodes it
/// (the synchronous first-delta path, or the steady-state pipeline).
pub async fn verify_buf(
    buf: Vec<u8>,
    suffix: &str,
    compressor: &dyn Compressor,
) -> RestoreResult<Vec<u8>> {
    let buf = match compressor.is_compressed(suffix) {
        Some(codec) => {
            log::debug!("decompressing {} bytes with {codec:?}", buf.len());
            compressor.decompress(codec, buf).await?
        }
        None => buf,
    };
    verify(buf)
}

/// Split an already-buffered blob into payload/hash and verify it. Exposed
/// separately so the applier can re-verify blobs it reads back off disk
/// without re-fetching or re-decompressing them.
pub fn verify(buf: Vec<u8>) -> RestoreResult<Vec<u8>> {
    if buf.len() <= HASH_LEN {
        log::warn!(
            "snapshot blob too short to carry a trailing hash ({} bytes)",
            buf.len()
        );
        return Err(RestoreError::Integrity(format!(
            "blob is {} bytes, need more than {HASH_LEN}",
            buf.len()
        )));
    }
    let split_at = buf.len() - HASH_LEN;
    let (payload, expected_hash) = buf.split_at(split_at);

    let mut hasher = Sha256::new();
    hasher.update(payload);
    let actual_hash = hasher.finalize();

    if actual_hash.as_slice() != expected_hash {
        log::warn!("snapshot blob failed integrity check: SHA-256 mismatch");
        return Err(RestoreError::Integrity(
            "trailing SHA-256 does not match payload".to_owned(),
        ));
    }

    Ok(payload.to_vec())
}

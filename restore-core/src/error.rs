//! Error types for the restore engine
//!
//! Mirrors the plain-enum-plus-manual-`From`-impls style used elsewhere in this
//! codebase rather than a derive-macro based error type: every variant maps to
//! exactly one failure domain named in the restore design (fetch, codec,
//! integrity, ordering, etcd RPCs, ...).

use std::{fmt, io::Error as IoError};

pub type RestoreResult<T> = Result<T, RestoreError>;

#[derive(Debug)]
pub enum RestoreError {
    /// object store fetch failed
    Fetch(String),
    /// local filesystem I/O failed
    Io(IoError),
    /// decompression failed
    Codec(String),
    /// trailing SHA-256 missing or mismatched
    Integrity(String),
    /// a JSON-decoded event carried an unrecognised kind
    EventKind(String),
    /// a delta arrived out of the index order the applier expects
    Ordering { got: i64, expected: i64 },
    /// the transient etcd's reported revision did not match the expected one
    RevisionMismatch { expected: i64, got: i64 },
    /// compaction of the transient etcd failed or timed out
    Compact(String),
    /// maintenance status query failed or timed out
    Status(String),
    /// defragmentation failed or timed out
    Defrag(String),
    /// the etcd snapshot-restore primitive failed
    EtcdRestore(String),
    /// configuration is invalid; carries every offending field
    Config(Vec<String>),
    /// generic catch-all for conditions with no dedicated variant
    Other(String),
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(m) => write!(f, "fetch error: {m}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Codec(m) => write!(f, "codec error: {m}"),
            Self::Integrity(m) => write!(f, "integrity error: {m}"),
            Self::EventKind(m) => write!(f, "unexpected event kind: {m}"),
            Self::Ordering { got, expected } => {
                write!(f, "ordering error: got index {got}, expected {expected}")
            }
            Self::RevisionMismatch { expected, got } => write!(
                f,
                "revision mismatch: expected {expected}, transient etcd reports {got}"
            ),
            Self::Compact(m) => write!(f, "compaction error: {m}"),
            Self::Status(m) => write!(f, "status query error: {m}"),
            Self::Defrag(m) => write!(f, "defragmentation failed: {m}"),
            Self::EtcdRestore(m) => write!(f, "etcd snapshot restore failed: {m}"),
            Self::Config(fields) => write!(f, "invalid configuration: {}", fields.join("; ")),
            Self::Other(m) => write!(f, "error: {m}"),
        }
    }
}

impl std::error::Error for RestoreError {}

impl From<IoError> for RestoreError {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for RestoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

impl From<base64::DecodeError> for RestoreError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Codec(e.to_string())
    }
}

//! Core data types shared across the restore pipeline.

use crate::config::RestorationConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which family of snapshot a [`SnapshotHandle`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Full,
    Delta,
}

/// Opaque descriptor of a blob in the object store.
///
/// Two handles are equal iff `(directory, name)` match; `startRevision` and
/// `lastRevision` are carried for planning purposes only and are not part of
/// identity.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    pub kind: SnapshotKind,
    pub directory: String,
    pub name: String,
    pub start_revision: i64,
    pub last_revision: i64,
    pub compression_suffix: String,
}

impl PartialEq for SnapshotHandle {
    fn eq(&self, other: &Self) -> bool {
        self.directory == other.directory && self.name == other.name
    }
}
impl Eq for SnapshotHandle {}

impl SnapshotHandle {
    pub fn is_compressed(&self) -> bool {
        !self.compression_suffix.is_empty()
    }
}

/// The kind of mutation an [`Event`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Put,
    Delete,
}

/// A single replayable etcd mutation, decoded from a delta snapshot.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub mod_revision: i64,
    pub ingested_at: DateTime<Utc>,
}

/// Wire shape of one event inside a delta blob's JSON array.
///
/// Grounded on the wire format described for the backup subsystem: a nested
/// `etcdEvent` object carrying a base64 key/value pair, wrapped with an
/// ingestion timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "etcdEvent")]
    pub etcd_event: WireEtcdEvent,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireEtcdEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub kv: WireKv,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireKv {
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "base64_bytes", default)]
    pub value: Vec<u8>,
    pub mod_revision: i64,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(D::Error::custom)
    }
}

impl From<WireEvent> for Event {
    fn from(w: WireEvent) -> Self {
        Self {
            kind: w.etcd_event.kind,
            key: w.etcd_event.kv.key,
            value: w.etcd_event.kv.value,
            mod_revision: w.etcd_event.kv.mod_revision,
            ingested_at: w.time,
        }
    }
}

/// A fetched-and-verified delta payload: a sequence of events.
///
/// Invariant upheld by [`crate::integrity`]: the wire buffer this was decoded
/// from was longer than 32 bytes and its trailing SHA-256 matched the prefix.
pub struct DeltaBatch {
    pub events: Vec<Event>,
}

/// Work item handed to a fetcher: which snapshot, and its position in
/// `deltas[1:]`.
#[derive(Debug, Clone)]
pub struct FetcherInfo {
    pub handle: SnapshotHandle,
    pub index: i64,
}

/// Result handed from a fetcher to the applier.
///
/// `index == -1` is the poison value signalling pipeline failure; in that
/// case `path` is `None`.
#[derive(Debug, Clone)]
pub struct ApplierInfo {
    pub path: Option<std::path::PathBuf>,
    pub index: i64,
}

impl ApplierInfo {
    pub const SENTINEL_INDEX: i64 = -1;

    pub fn sentinel() -> Self {
        Self {
            path: None,
            index: Self::SENTINEL_INDEX,
        }
    }
}

/// Everything the orchestrator needs to perform one restore.
pub struct RestoreRequest {
    pub config: RestorationConfig,
    pub base_snapshot: SnapshotHandle,
    pub delta_list: Vec<SnapshotHandle>,
    pub peer_urls: Vec<String>,
    pub cluster_urls: std::collections::HashMap<String, String>,
    pub client_factory_builder: Arc<dyn crate::etcd_client::ClientFactoryBuilder>,
}

/// Summary returned to callers on a successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub final_revision: i64,
    pub deltas_applied: usize,
    pub first_delta_skipped: bool,
}

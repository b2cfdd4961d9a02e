//! Narrow client interfaces the restore engine consumes against a transient
//! etcd instance, plus the collaborators that launch it and rewrite its
//! membership once restored. None of these are implemented here: a real
//! binary wires them to an actual etcd client crate; tests wire them to
//! in-memory fakes (see `restore-core/tests`).

use crate::error::RestoreResult;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ResponseHeader {
    pub revision: i64,
}

#[derive(Debug, Clone)]
pub struct GetResponse {
    pub header: ResponseHeader,
}

#[derive(Debug, Clone)]
pub enum TxnOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct TxnResponse {
    pub header: ResponseHeader,
}

#[async_trait]
pub trait KvClient: Send + Sync {
    /// `Get("") WithLastRev` style call: empty-key range query used only to
    /// read the latest committed revision from the header.
    async fn get_last_revision(&self) -> RestoreResult<GetResponse>;

    /// `Get("foo")`-style probe used purely for its response header's
    /// revision, after applying a delta.
    async fn get_probe(&self) -> RestoreResult<GetResponse>;

    async fn txn(&self, ops: Vec<TxnOp>) -> RestoreResult<TxnResponse>;
}

#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub db_size: u64,
    pub db_size_in_use: u64,
}

#[async_trait]
pub trait MaintenanceClient: Send + Sync {
    async fn compact(&self, revision: i64, physical: bool, timeout: Duration) -> RestoreResult<()>;

    async fn status(&self, endpoint: &str, timeout: Duration) -> RestoreResult<StatusResponse>;

    async fn defragment(&self, endpoint: &str, timeout: Duration) -> RestoreResult<()>;
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn member_list(&self) -> RestoreResult<Vec<String>>;
}

/// Bundled clients pointed at one transient etcd, owned exclusively by the
/// orchestrator for the lifetime of one restore.
///
/// Fields are `Arc`-wrapped rather than boxed: the alarm handler runs as an
/// independent background task and needs its own owned handle to the
/// maintenance client for as long as the restore's pipeline is running,
/// alongside the applier's own reference.
pub struct EtcdClients {
    pub kv: std::sync::Arc<dyn KvClient>,
    pub maintenance: std::sync::Arc<dyn MaintenanceClient>,
    pub cluster: std::sync::Arc<dyn ClusterClient>,
    pub endpoints: Vec<String>,
}

/// Builds a fresh [`EtcdClients`] bundle pointed at a set of endpoints.
/// Analogous to the distilled design's `ClientFactory`; the `Builder` suffix
/// distinguishes the long-lived factory-of-factories passed in on a
/// [`crate::model::RestoreRequest`] from the per-restore bundle it produces.
#[async_trait]
pub trait ClientFactoryBuilder: Send + Sync {
    async fn build(&self, endpoints: &[String]) -> RestoreResult<EtcdClients>;
}

#[async_trait]
pub trait MemberControl: Send + Sync {
    async fn update_member_peer_url(&self, cluster: &dyn ClusterClient) -> RestoreResult<()>;
}

/// A running transient etcd process/handle. Owned exclusively by the
/// orchestrator; callers of [`crate::orchestrator::restore`] are responsible
/// for stopping it (or use the `_and_stop` variant, which stops it for you).
#[async_trait]
pub trait EtcdHandle: Send + Sync {
    fn endpoints(&self) -> Vec<String>;
    async fn stop(self: Box<Self>) -> RestoreResult<()>;
}

#[async_trait]
pub trait EmbeddedEtcdLauncher: Send + Sync {
    async fn start(&self, config: &crate::config::RestorationConfig) -> RestoreResult<Box<dyn EtcdHandle>>;
}

/// Parameters for the etcd snapshot-restore primitive: turns a standalone
/// bbolt database file into a fresh single-member data directory.
pub struct SnapshotRestoreParams<'a> {
    pub snapshot_db_path: &'a std::path::Path,
    pub member_name: &'a str,
    pub peer_urls: &'a [String],
    pub initial_cluster: &'a str,
    pub initial_cluster_token: &'a str,
    pub data_dir: &'a str,
    pub skip_hash_check: bool,
}

/// The `etcdutl snapshot restore`-equivalent primitive. External collaborator:
/// the restore engine only calls it with the parameters above.
#[async_trait]
pub trait EtcdSnapshotRestorer: Send + Sync {
    async fn restore(&self, params: SnapshotRestoreParams<'_>) -> RestoreResult<()>;
}

//! Concrete collaborators backed by a real `etcd`/`etcdutl` installation and
//! the `etcd-client` gRPC client. The restore engine only ever sees these
//! through the narrow traits in `restore_core::etcd_client`; everything
//! process- and wire-protocol-specific lives here, behind the binary.

use async_trait::async_trait;
use restore_core::{
    config::RestorationConfig,
    error::{RestoreError, RestoreResult},
    etcd_client::{
        ClientFactoryBuilder, ClusterClient, EmbeddedEtcdLauncher, EtcdClients, EtcdHandle,
        EtcdSnapshotRestorer, GetResponse, KvClient, MaintenanceClient, MemberControl,
        ResponseHeader, SnapshotRestoreParams, StatusResponse, TxnOp, TxnResponse,
    },
};
use std::{process::Stdio, time::Duration};
use tokio::{process::Command, sync::Mutex, time::timeout};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);
const READY_TIMEOUT: Duration = Duration::from_secs(30);

fn to_other(e: impl std::fmt::Display) -> RestoreError {
    RestoreError::Other(e.to_string())
}

/// Invokes `etcdutl snapshot restore` as a subprocess — the real analogue
/// of the Go restore engine's in-process call into etcd's own snapshot
/// package, which isn't reachable from Rust.
pub struct EtcdutlSnapshotRestorer {
    pub etcdutl_binary: String,
}

#[async_trait]
impl EtcdSnapshotRestorer for EtcdutlSnapshotRestorer {
    async fn restore(&self, params: SnapshotRestoreParams<'_>) -> RestoreResult<()> {
        let mut cmd = Command::new(&self.etcdutl_binary);
        cmd.arg("snapshot")
            .arg("restore")
            .arg(params.snapshot_db_path)
            .arg("--name")
            .arg(params.member_name)
            .arg("--initial-cluster")
            .arg(params.initial_cluster)
            .arg("--initial-cluster-token")
            .arg(params.initial_cluster_token)
            .arg("--initial-advertise-peer-urls")
            .arg(params.peer_urls.join(","))
            .arg("--data-dir")
            .arg(params.data_dir);
        if params.skip_hash_check {
            cmd.arg("--skip-hash-check");
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = cmd.output().await.map_err(to_other)?;
        if !output.status.success() {
            return Err(RestoreError::EtcdRestore(format!(
                "etcdutl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

/// Launches a transient, single-member `etcd` process against the data
/// directory the base restore already populated.
pub struct SubprocessEtcdLauncher {
    pub etcd_binary: String,
    pub client_url: String,
}

#[async_trait]
impl EmbeddedEtcdLauncher for SubprocessEtcdLauncher {
    async fn start(&self, config: &RestorationConfig) -> RestoreResult<Box<dyn EtcdHandle>> {
        let peer_urls = config.initial_advertise_peer_urls.join(",");
        let mut cmd = Command::new(&self.etcd_binary);
        cmd.arg("--name")
            .arg(&config.name)
            .arg("--data-dir")
            .arg(&config.data_dir)
            .arg("--initial-cluster")
            .arg(&config.initial_cluster)
            .arg("--initial-cluster-token")
            .arg(&config.initial_cluster_token)
            .arg("--initial-advertise-peer-urls")
            .arg(&peer_urls)
            .arg("--listen-peer-urls")
            .arg(&peer_urls)
            .arg("--listen-client-urls")
            .arg(&self.client_url)
            .arg("--advertise-client-urls")
            .arg(&self.client_url)
            .arg("--quota-backend-bytes")
            .arg(config.embedded_etcd_quota_bytes.to_string())
            .arg("--max-request-bytes")
            .arg(config.max_request_bytes.to_string())
            .arg("--auto-compaction-mode")
            .arg(auto_compaction_mode_str(config))
            .arg("--auto-compaction-retention")
            .arg(&config.auto_compaction_retention)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        log::info!("launching transient etcd at {}", self.client_url);
        let child = cmd.spawn().map_err(to_other)?;

        wait_until_ready(&self.client_url).await?;

        Ok(Box::new(SubprocessEtcdHandle {
            child: Mutex::new(Some(child)),
            endpoint: self.client_url.clone(),
        }))
    }
}

fn auto_compaction_mode_str(config: &RestorationConfig) -> &str {
    config.auto_compaction_mode.as_str()
}

async fn wait_until_ready(endpoint: &str) -> RestoreResult<()> {
    timeout(READY_TIMEOUT, async {
        loop {
            if etcd_client::Client::connect([endpoint], None).await.is_ok() {
                return;
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    })
    .await
    .map_err(|_| RestoreError::Other(format!("transient etcd at {endpoint} never became ready")))
}

struct SubprocessEtcdHandle {
    child: Mutex<Option<tokio::process::Child>>,
    endpoint: String,
}

#[async_trait]
impl EtcdHandle for SubprocessEtcdHandle {
    fn endpoints(&self) -> Vec<String> {
        vec![self.endpoint.clone()]
    }

    async fn stop(self: Box<Self>) -> RestoreResult<()> {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            if let Err(e) = child.start_kill() {
                log::warn!("failed to signal transient etcd to stop: {e}");
            }
            let _ = child.wait().await;
        }
        Ok(())
    }
}

/// Builds [`EtcdClients`] backed by real `etcd-client` connections.
pub struct RealClientFactory;

#[async_trait]
impl ClientFactoryBuilder for RealClientFactory {
    async fn build(&self, endpoints: &[String]) -> RestoreResult<EtcdClients> {
        let client = etcd_client::Client::connect(endpoints, None)
            .await
            .map_err(to_other)?;
        Ok(EtcdClients {
            kv: std::sync::Arc::new(RealKv {
                client: client.clone(),
            }),
            maintenance: std::sync::Arc::new(RealMaintenance {
                client: client.clone(),
            }),
            cluster: std::sync::Arc::new(RealCluster { client }),
            endpoints: endpoints.to_vec(),
        })
    }
}

struct RealKv {
    client: etcd_client::Client,
}

#[async_trait]
impl KvClient for RealKv {
    async fn get_last_revision(&self) -> RestoreResult<GetResponse> {
        let mut client = self.client.clone();
        let opts = etcd_client::GetOptions::new()
            .with_sort(etcd_client::SortTarget::Mod, etcd_client::SortOrder::Descend)
            .with_limit(1);
        let resp = client.get("", Some(opts)).await.map_err(to_other)?;
        let revision = resp.header().map(|h| h.revision()).unwrap_or(0);
        Ok(GetResponse {
            header: ResponseHeader { revision },
        })
    }

    async fn get_probe(&self) -> RestoreResult<GetResponse> {
        let mut client = self.client.clone();
        let resp = client.get("foo", None).await.map_err(to_other)?;
        let revision = resp.header().map(|h| h.revision()).unwrap_or(0);
        Ok(GetResponse {
            header: ResponseHeader { revision },
        })
    }

    async fn txn(&self, ops: Vec<TxnOp>) -> RestoreResult<TxnResponse> {
        let mut client = self.client.clone();
        let txn_ops: Vec<etcd_client::TxnOp> = ops
            .into_iter()
            .map(|op| match op {
                TxnOp::Put { key, value } => etcd_client::TxnOp::put(key, value, None),
                TxnOp::Delete { key } => etcd_client::TxnOp::delete(key, None),
            })
            .collect();
        let resp = client
            .txn(etcd_client::Txn::new().and_then(txn_ops))
            .await
            .map_err(to_other)?;
        let revision = resp.header().map(|h| h.revision()).unwrap_or(0);
        Ok(TxnResponse {
            header: ResponseHeader { revision },
        })
    }
}

struct RealMaintenance {
    client: etcd_client::Client,
}

#[async_trait]
impl MaintenanceClient for RealMaintenance {
    async fn compact(&self, revision: i64, physical: bool, op_timeout: Duration) -> RestoreResult<()> {
        let mut client = self.client.clone();
        let mut opts = etcd_client::CompactionOptions::new();
        if physical {
            opts = opts.with_physical();
        }
        timeout(op_timeout, client.compact(revision, Some(opts)))
            .await
            .map_err(|_| RestoreError::Compact("compaction timed out".into()))?
            .map_err(|e| RestoreError::Compact(e.to_string()))?;
        Ok(())
    }

    async fn status(&self, endpoint: &str, op_timeout: Duration) -> RestoreResult<StatusResponse> {
        let connect = etcd_client::Client::connect([endpoint], None);
        let mut client = timeout(op_timeout, connect)
            .await
            .map_err(|_| RestoreError::Status("connect to endpoint timed out".into()))?
            .map_err(|e| RestoreError::Status(e.to_string()))?;
        let resp = timeout(op_timeout, client.status())
            .await
            .map_err(|_| RestoreError::Status("status query timed out".into()))?
            .map_err(|e| RestoreError::Status(e.to_string()))?;
        Ok(StatusResponse {
            db_size: resp.db_size() as u64,
            db_size_in_use: resp.db_size_in_use() as u64,
        })
    }

    async fn defragment(&self, endpoint: &str, op_timeout: Duration) -> RestoreResult<()> {
        let connect = etcd_client::Client::connect([endpoint], None);
        let mut client = timeout(op_timeout, connect)
            .await
            .map_err(|_| RestoreError::Defrag("connect to endpoint timed out".into()))?
            .map_err(|e| RestoreError::Defrag(e.to_string()))?;
        timeout(op_timeout, client.defragment())
            .await
            .map_err(|_| RestoreError::Defrag("defragment timed out".into()))?
            .map_err(|e| RestoreError::Defrag(e.to_string()))?;
        Ok(())
    }
}

struct RealCluster {
    client: etcd_client::Client,
}

#[async_trait]
impl ClusterClient for RealCluster {
    async fn member_list(&self) -> RestoreResult<Vec<String>> {
        let mut client = self.client.clone();
        let resp = client.member_list().await.map_err(to_other)?;
        Ok(resp
            .members()
            .iter()
            .flat_map(|m| m.peer_urls().iter().cloned())
            .collect())
    }
}

/// Rewrites the transient cluster's lone member's peer URL to the real
/// advertised peer URL the restored data dir will run as once handed back
/// to the real cluster. Connects to the transient etcd lazily, by endpoint,
/// rather than sharing the orchestrator's own client: `member_update` needs
/// the member's numeric ID, which the narrow [`ClusterClient`] interface
/// deliberately doesn't expose, and the transient etcd isn't listening yet
/// at the time this collaborator is constructed in `main`.
pub struct EtcdMemberControl {
    pub endpoint: String,
    pub peer_url: String,
}

#[async_trait]
impl MemberControl for EtcdMemberControl {
    async fn update_member_peer_url(&self, _cluster: &dyn ClusterClient) -> RestoreResult<()> {
        let mut client = etcd_client::Client::connect([&self.endpoint], None)
            .await
            .map_err(to_other)?;
        let resp = client.member_list().await.map_err(to_other)?;
        let Some(member) = resp.members().first() else {
            return Err(RestoreError::Other("transient cluster has no members".into()));
        };
        log::info!(
            "rewriting member {} peer URL to {}",
            member.id(),
            self.peer_url
        );
        client
            .member_update(member.id(), vec![self.peer_url.clone()])
            .await
            .map_err(to_other)?;
        Ok(())
    }
}

//! Base Restorer: materialises the full snapshot into a fresh etcd data
//! directory.

use crate::{
    compression::Compressor,
    config::RestorationConfig,
    error::{RestoreError, RestoreResult},
    etcd_client::{EtcdSnapshotRestorer, SnapshotRestoreParams},
    integrity,
    model::SnapshotHandle,
    store::SnapStore,
    tempdir::TempDirectory,
};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fetch the base snapshot, decompress it if needed, and invoke the etcd
/// snapshot-restore primitive against it.
///
/// The trailing-hash integrity check applied to delta snapshots is skipped
/// for the base: its bbolt contents are validated by the restore primitive
/// itself.
pub async fn restore_base(
    config: &RestorationConfig,
    base: &SnapshotHandle,
    store: &dyn SnapStore,
    compressor: &dyn Compressor,
    restorer: &dyn EtcdSnapshotRestorer,
    temp_dir: &TempDirectory,
) -> RestoreResult<()> {
    log::info!(
        "restoring base snapshot {:?} (revision {})",
        base.name,
        base.last_revision
    );

    let stream = store
        .fetch(base)
        .await
        .map_err(|e| RestoreError::Fetch(e.to_string()))?;

    let payload = integrity::read(stream, &base.compression_suffix, compressor).await?;

    let n = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let snapshot_path = temp_dir.join(format!("snapshot-{n}.db"));
    tokio::fs::write(&snapshot_path, &payload).await?;

    let result = restorer
        .restore(SnapshotRestoreParams {
            snapshot_db_path: &snapshot_path,
            member_name: &config.name,
            peer_urls: &config.initial_advertise_peer_urls,
            initial_cluster: &config.initial_cluster,
            initial_cluster_token: &config.initial_cluster_token,
            data_dir: &config.data_dir,
            skip_hash_check: config.skip_hash_check,
        })
        .await;

    if let Err(e) = tokio::fs::remove_file(&snapshot_path).await {
        log::warn!("failed to remove staged base snapshot file {snapshot_path:?}: {e}");
    }

    result?;

    log::info!("base snapshot restored into {:?}", config.data_dir);
    Ok(())
}

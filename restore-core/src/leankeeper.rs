//! Lean-Keeper / Alarm Handler: keeps the transient etcd's backend within
//! quota by compacting at the latest applied revision and, when the backend
//! crosses 80% of quota, handing off to a long-running defragmentation
//! worker over a small set of unbuffered channels.
//!
//! The handoff shape (one side posts work, blocks on a reply channel, a
//! single long-running worker drains a queue and always replies) mirrors the
//! dispatch-and-await pattern this codebase's own background task manager
//! uses for its high-priority queue, generalised here from a retry counter to
//! an explicit alarm/disarm handshake.

use crate::{
    config::RestorationConfig,
    error::RestoreResult,
    etcd_client::MaintenanceClient,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const COMPACT_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);
const DEFRAG_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// One alarm: an endpoint whose backend crossed the quota threshold, plus a
/// channel to report back whether defragmentation succeeded.
pub struct Alarm {
    pub endpoint: String,
    pub reply: oneshot::Sender<bool>,
}

/// Runs the lean-keep step for one applied revision: compact, check status,
/// and raise an alarm per endpoint if the backend is over threshold.
///
/// Called synchronously by the applier; blocks until every alarm it raises
/// has been answered, so compaction and defragmentation are never concurrent
/// and the applier never races ahead of a defrag in progress.
pub async fn lean_keep(
    config: &RestorationConfig,
    maintenance: &dyn MaintenanceClient,
    endpoints: &[String],
    revision: i64,
    alarm_tx: &mpsc::Sender<Alarm>,
) -> RestoreResult<()> {
    log::info!("lean-keep: compacting transient etcd at revision {revision}");
    maintenance.compact(revision, true, COMPACT_TIMEOUT).await?;

    let primary = endpoints
        .first()
        .ok_or_else(|| crate::error::RestoreError::Status("no endpoints configured".into()))?;
    let status = maintenance.status(primary, STATUS_TIMEOUT).await?;

    let threshold = config.lean_keep_threshold();
    if status.db_size_in_use > threshold || status.db_size > threshold {
        log::warn!(
            "transient etcd backend at {} bytes (in-use {}), threshold {threshold}: raising defrag alarm",
            status.db_size,
            status.db_size_in_use
        );
        for endpoint in endpoints {
            let (reply, recv) = oneshot::channel();
            if alarm_tx
                .send(Alarm {
                    endpoint: endpoint.clone(),
                    reply,
                })
                .await
                .is_err()
            {
                return Err(crate::error::RestoreError::Defrag(
                    "alarm handler has shut down".into(),
                ));
            }
            let ok = recv.await.unwrap_or(false);
            if !ok {
                return Err(crate::error::RestoreError::Defrag(format!(
                    "defragmentation failed on endpoint {endpoint}"
                )));
            }
        }
    }

    Ok(())
}

/// Long-running worker: the only task allowed to call `Defragment`. Drains
/// `alarm_rx` until `stop` fires, always replying on the alarm's own
/// one-shot channel so the lean-keep caller never blocks forever.
pub async fn alarm_handler_loop(
    maintenance: std::sync::Arc<dyn MaintenanceClient>,
    mut alarm_rx: mpsc::Receiver<Alarm>,
    mut stop: tokio::sync::watch::Receiver<bool>,
) {
    log::info!("alarm handler starting");
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            alarm = alarm_rx.recv() => {
                let Some(alarm) = alarm else { break };
                let result = maintenance.defragment(&alarm.endpoint, DEFRAG_TIMEOUT).await;
                let ok = match &result {
                    Ok(()) => true,
                    Err(e) => {
                        log::error!("defragmentation of {} failed: {e}", alarm.endpoint);
                        false
                    }
                };
                let _ = alarm.reply.send(ok);
            }
        }
    }
    log::info!("alarm handler stopping");
}

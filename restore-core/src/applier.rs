//! Ordered Applier: reassembles fetched deltas in index order and replays
//! their events against the transient etcd, interleaving periodic
//! lean-keeping. Grounded on this codebase's own batch-journal restore
//! driver: both replay an ordered sequence of checksummed batches, both
//! resolve same-key write races by grouping writes that share a commit
//! marker into a single applied unit, and both tolerate a "reopen" /
//! overlap at the seam between two logs.

use crate::{
    compression::Compressor,
    error::{RestoreError, RestoreResult},
    etcd_client::{EtcdClients, TxnOp},
    integrity,
    leankeeper::{self, Alarm},
    model::{ApplierInfo, Event, EventKind, WireEvent},
};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Decompress (if `suffix` names a codec) and verify a fetched delta blob,
/// then decode its JSON event sequence. This is the delta-side counterpart
/// of [`crate::integrity::read`] used for the base snapshot: the fetcher
/// persists each delta exactly as fetched — compressed, trailing hash intact
/// — so both the first-delta path and the steady-state pipeline decode
/// through here rather than assuming the bytes are already plain JSON.
pub async fn decode_events(
    raw: Vec<u8>,
    compression_suffix: &str,
    compressor: &dyn Compressor,
) -> RestoreResult<Vec<Event>> {
    let payload = integrity::verify_buf(raw, compression_suffix, compressor).await?;
    let wire: Vec<WireEvent> = serde_json::from_slice(&payload)?;
    Ok(wire.into_iter().map(Event::from).collect())
}

/// Apply `events` to the transient etcd, batching consecutive events that
/// share a `modRevision` into one transaction. Returns the `modRevision` of
/// the last event applied, or `None` if `events` was empty.
pub async fn apply_events(
    clients: &EtcdClients,
    events: &[Event],
) -> RestoreResult<Option<i64>> {
    let mut pending: Vec<TxnOp> = Vec::new();
    let mut last_seen_mod_revision: i64 = 0;
    let mut last_applied = None;

    for event in events {
        if event.mod_revision > last_seen_mod_revision && last_seen_mod_revision != 0 {
            commit(clients, &mut pending).await?;
        }
        let op = match event.kind {
            EventKind::Put => TxnOp::Put {
                key: event.key.clone(),
                value: event.value.clone(),
            },
            EventKind::Delete => TxnOp::Delete {
                key: event.key.clone(),
            },
        };
        pending.push(op);
        last_seen_mod_revision = event.mod_revision;
        last_applied = Some(event.mod_revision);
    }

    if !pending.is_empty() {
        commit(clients, &mut pending).await?;
    }

    Ok(last_applied)
}

async fn commit(clients: &EtcdClients, pending: &mut Vec<TxnOp>) -> RestoreResult<()> {
    let ops = std::mem::take(pending);
    clients.kv.txn(ops).await?;
    Ok(())
}

/// Apply the first delta synchronously, handling the revision-overlap
/// special case: if the transient etcd's latest revision already equals the
/// first delta's recorded `lastRevision`, the base snapshot already reflects
/// its effect and it is skipped outright. Otherwise only the events whose
/// `modRevision` exceeds the current revision are replayed.
///
/// Returns `(skipped, last_applied_revision)`.
pub async fn apply_first_delta(
    clients: &EtcdClients,
    first_delta_last_revision: i64,
    events: &[Event],
) -> RestoreResult<(bool, i64)> {
    let current = clients.kv.get_last_revision().await?.header.revision;

    if current == first_delta_last_revision {
        log::info!(
            "first delta already reflected by base snapshot at revision {current}; skipping"
        );
        return Ok((true, current));
    }

    let start = events
        .iter()
        .position(|e| e.mod_revision > current)
        .unwrap_or(events.len());
    let applied = apply_events(clients, &events[start..]).await?;
    Ok((false, applied.unwrap_or(current)))
}

/// Assert that the transient etcd reports the expected revision after
/// applying a delta.
pub async fn verify_revision(clients: &EtcdClients, expected: i64) -> RestoreResult<()> {
    let got = clients.kv.get_probe().await?.header.revision;
    if got != expected {
        return Err(RestoreError::RevisionMismatch { expected, got });
    }
    Ok(())
}

/// How often (in applied-deltas) to run a lean-keep pass.
const LEAN_KEEP_PERIOD: u64 = 10;

/// Drives the steady-state pipeline after the first delta has been applied:
/// consumes `ApplierInfo` off `in_q`, reassembles by index, and replays each
/// delta in turn.
///
/// `deltas_after_first` is the ordered list of remaining delta handles
/// (`deltaList[1:]`), used only to know each one's declared `lastRevision`
/// for post-apply verification and to know when the pipeline is complete.
pub async fn run(
    clients: &EtcdClients,
    config: &crate::config::RestorationConfig,
    endpoints: &[String],
    deltas_after_first: &[crate::model::SnapshotHandle],
    compressor: &dyn Compressor,
    mut in_q: mpsc::UnboundedReceiver<ApplierInfo>,
    alarm_tx: mpsc::Sender<Alarm>,
    err_tx: mpsc::UnboundedSender<Option<RestoreError>>,
    mut delta_applied_counter: u64,
) -> RestoreResult<i64> {
    let mut path_by_index: HashMap<i64, std::path::PathBuf> = HashMap::new();
    let mut next_index: i64 = 0;
    let total = deltas_after_first.len() as i64;
    let mut last_revision = 0i64;
    let mut lean_keep_failed = false;

    while next_index < total {
        let Some(info) = in_q.recv().await else {
            return Err(RestoreError::Other(
                "applier input channel closed before pipeline completed".into(),
            ));
        };

        if info.index == ApplierInfo::SENTINEL_INDEX {
            let msg = "a fetcher reported failure; terminating restore".to_owned();
            log::error!("{msg}");
            return Err(RestoreError::Fetch(msg));
        }

        if info.index < next_index {
            return Err(RestoreError::Ordering {
                got: info.index,
                expected: next_index,
            });
        }

        let path = info
            .path
            .ok_or_else(|| RestoreError::Other("fetcher reported success with no path".into()))?;
        path_by_index.insert(info.index, path);

        while let Some(path) = path_by_index.remove(&next_index) {
            let handle = &deltas_after_first[next_index as usize];
            log::info!("applying delta index {next_index} ({})", handle.name);

            let raw = tokio::fs::read(&path).await?;
            let events = decode_events(raw, &handle.compression_suffix, compressor).await?;
            let applied = apply_events(clients, &events).await?;
            let expected = applied.unwrap_or(handle.last_revision);
            verify_revision(clients, expected).await?;

            if let Err(e) = tokio::fs::remove_file(&path).await {
                log::warn!("failed to remove applied temp file {path:?}: {e}");
            }

            last_revision = expected;
            next_index += 1;
            delta_applied_counter += 1;

            if delta_applied_counter % LEAN_KEEP_PERIOD == 0 || lean_keep_failed {
                match leankeeper::lean_keep(config, clients.maintenance.as_ref(), endpoints, last_revision, &alarm_tx)
                    .await
                {
                    Ok(()) => lean_keep_failed = false,
                    Err(e) => {
                        log::warn!("lean-keep pass failed, will retry next delta: {e}");
                        lean_keep_failed = true;
                    }
                }
            }
        }
    }

    let _ = err_tx.send(None);
    Ok(last_revision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventKind, WireEtcdEvent, WireKv};
    use chrono::Utc;

    fn wire(kind: EventKind, key: &str, value: &str, rev: i64) -> WireEvent {
        WireEvent {
            etcd_event: WireEtcdEvent {
                kind,
                kv: WireKv {
                    key: key.as_bytes().to_vec(),
                    value: value.as_bytes().to_vec(),
                    mod_revision: rev,
                },
            },
            time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn decode_events_round_trips_through_json_and_hash() {
        let events = vec![wire(EventKind::Put, "a", "1", 6), wire(EventKind::Delete, "b", "", 7)];
        let json = serde_json::to_vec(&events).unwrap();
        let mut buf = json;
        let mut hasher = sha2::Sha256::new();
        use sha2::Digest;
        hasher.update(&buf);
        buf.extend_from_slice(&hasher.finalize());

        let decoded = decode_events(buf, "", &crate::compression::DefaultCompressor)
            .await
            .unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].mod_revision, 6);
        assert_eq!(decoded[1].kind, EventKind::Delete);
    }

    #[tokio::test]
    async fn decode_events_decompresses_gzip_before_verifying() {
        use flate2::{write::GzEncoder, Compression};
        use std::io::Write;

        let events = vec![wire(EventKind::Put, "a", "1", 6)];
        let json = serde_json::to_vec(&events).unwrap();
        let mut buf = json;
        let mut hasher = sha2::Sha256::new();
        use sha2::Digest;
        hasher.update(&buf);
        buf.extend_from_slice(&hasher.finalize());

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&buf).unwrap();
        let gzipped = encoder.finish().unwrap();

        let decoded = decode_events(gzipped, "gz", &crate::compression::DefaultCompressor)
            .await
            .unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].mod_revision, 6);
    }
}

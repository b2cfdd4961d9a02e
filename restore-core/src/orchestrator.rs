//! Restore Orchestrator: sequences base restoration, first-delta replay,
//! and the steady-state fetcher/applier/alarm-handler pipeline, guaranteeing
//! cleanup of the transient etcd's resources on every exit path.

use crate::{
    applier,
    base_restore::restore_base,
    compression::{read_to_end, Compressor},
    error::{RestoreError, RestoreResult},
    etcd_client::{
        ClientFactoryBuilder, EmbeddedEtcdLauncher, EtcdHandle, EtcdSnapshotRestorer, MemberControl,
    },
    fetcher,
    integrity,
    leankeeper,
    model::{ApplierInfo, FetcherInfo, RestoreOutcome, RestoreRequest},
    store::SnapStore,
    tempdir::TempDirectory,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

/// External collaborators the orchestrator drives beyond what travels on a
/// [`RestoreRequest`] — each corresponds to one row of this engine's
/// consumed-interfaces table.
pub struct Collaborators {
    pub store: Arc<dyn SnapStore>,
    pub compressor: Arc<dyn Compressor>,
    pub snapshot_restorer: Arc<dyn EtcdSnapshotRestorer>,
    pub etcd_launcher: Arc<dyn EmbeddedEtcdLauncher>,
}

/// Run a restore to completion, returning the still-running transient etcd
/// handle on success (`None` if the request had no deltas to apply, in
/// which case no transient etcd was ever started). The caller owns the
/// handle from here — stop and close it once done, or call
/// [`restore_and_stop_etcd`] to have this done automatically.
pub async fn restore(
    req: &RestoreRequest,
    collaborators: &Collaborators,
    member_ctl: Option<&dyn MemberControl>,
) -> RestoreResult<(Option<Box<dyn EtcdHandle>>, RestoreOutcome)> {
    req.config.validate()?;
    log::info!(
        "restore starting: base={:?} deltas={}",
        req.base_snapshot.name,
        req.delta_list.len()
    );

    if req.config.dry_run {
        return dry_run(req, collaborators).await.map(|outcome| (None, outcome));
    }

    let temp_dir = Arc::new(TempDirectory::create_at(&req.config.temp_dir)?);

    restore_base(
        &req.config,
        &req.base_snapshot,
        collaborators.store.as_ref(),
        collaborators.compressor.as_ref(),
        collaborators.snapshot_restorer.as_ref(),
        &temp_dir,
    )
    .await?;

    if req.delta_list.is_empty() {
        log::info!(
            "no deltas to apply; restore complete at base revision {}",
            req.base_snapshot.last_revision
        );
        return Ok((
            None,
            RestoreOutcome {
                final_revision: req.base_snapshot.last_revision,
                deltas_applied: 0,
                first_delta_skipped: false,
            },
        ));
    }

    let etcd_handle = collaborators.etcd_launcher.start(&req.config).await?;
    let endpoints = etcd_handle.endpoints();
    let clients = req.client_factory_builder.build(&endpoints).await?;

    let result = run_pipeline(req, collaborators, &clients, &endpoints, &temp_dir).await;

    match result {
        Ok((skipped, final_revision)) => {
            if let Some(ctl) = member_ctl {
                ctl.update_member_peer_url(clients.cluster.as_ref()).await?;
            }
            log::info!("restore complete at revision {final_revision}");
            Ok((
                Some(etcd_handle),
                RestoreOutcome {
                    final_revision,
                    deltas_applied: req.delta_list.len(),
                    first_delta_skipped: skipped,
                },
            ))
        }
        Err(e) => {
            log::error!("restore failed: {e}");
            if let Err(stop_err) = etcd_handle.stop().await {
                log::error!("failed to stop transient etcd after restore failure: {stop_err}");
            }
            Err(e)
        }
    }
}

/// Convenience wrapper that stops the transient etcd itself on success.
pub async fn restore_and_stop_etcd(
    req: &RestoreRequest,
    collaborators: &Collaborators,
    member_ctl: Option<&dyn MemberControl>,
) -> RestoreResult<RestoreOutcome> {
    let (handle, outcome) = restore(req, collaborators, member_ctl).await?;
    if let Some(handle) = handle {
        handle.stop().await?;
    }
    Ok(outcome)
}

/// Exercises the fetch/verify/decode path for the base snapshot and every
/// delta without ever starting a transient etcd or touching the target data
/// directory — a smoke test of the object-store and integrity-checking half
/// of the pipeline cheap enough to run in CI on every manifest.
async fn dry_run(req: &RestoreRequest, collaborators: &Collaborators) -> RestoreResult<RestoreOutcome> {
    log::info!(
        "dry run: fetching base snapshot {:?} (no data dir will be written)",
        req.base_snapshot.name
    );
    let base_stream = collaborators
        .store
        .fetch(&req.base_snapshot)
        .await
        .map_err(|e| RestoreError::Fetch(e.to_string()))?;
    let _ = integrity::read(
        base_stream,
        &req.base_snapshot.compression_suffix,
        collaborators.compressor.as_ref(),
    )
    .await?;

    for (idx, delta) in req.delta_list.iter().enumerate() {
        log::info!("dry run: fetching and verifying delta {idx} ({})", delta.name);
        let stream = collaborators
            .store
            .fetch(delta)
            .await
            .map_err(|e| RestoreError::Fetch(e.to_string()))?;
        let raw = read_to_end(stream).await?;
        let events =
            applier::decode_events(raw, &delta.compression_suffix, collaborators.compressor.as_ref())
                .await?;
        log::debug!("dry run: delta {idx} decoded {} events", events.len());
    }

    let final_revision = req
        .delta_list
        .last()
        .map(|d| d.last_revision)
        .unwrap_or(req.base_snapshot.last_revision);
    log::info!("dry run complete: would reach revision {final_revision}, no transient etcd started");
    Ok(RestoreOutcome {
        final_revision,
        deltas_applied: req.delta_list.len(),
        first_delta_skipped: false,
    })
}

/// Applies the first delta synchronously, then — if more than one delta was
/// requested — runs the fetcher pool, ordered applier, and alarm handler
/// concurrently until every remaining delta has been applied. Returns
/// whether the first delta was skipped (overlap with the base) and the
/// final applied revision.
async fn run_pipeline(
    req: &RestoreRequest,
    collaborators: &Collaborators,
    clients: &crate::etcd_client::EtcdClients,
    endpoints: &[String],
    temp_dir: &Arc<TempDirectory>,
) -> RestoreResult<(bool, i64)> {
    let deltas = &req.delta_list;
    let first = &deltas[0];

    let first_stream = collaborators
        .store
        .fetch(first)
        .await
        .map_err(|e| RestoreError::Fetch(e.to_string()))?;
    let first_raw = read_to_end(first_stream).await?;
    let first_events =
        applier::decode_events(first_raw, &first.compression_suffix, collaborators.compressor.as_ref())
            .await?;

    let (skipped, mut last_revision) =
        applier::apply_first_delta(clients, first.last_revision, &first_events).await?;
    if !skipped {
        applier::verify_revision(clients, last_revision).await?;
    }
    log::info!(
        "first delta {}; revision now {last_revision}",
        if skipped { "already reflected by base, skipped" } else { "applied" }
    );

    let remaining = &deltas[1..];
    if remaining.is_empty() {
        return Ok((skipped, last_revision));
    }

    let (in_tx, in_rx) = mpsc::unbounded_channel::<FetcherInfo>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<ApplierInfo>();
    let (loc_tx, mut loc_rx) = mpsc::unbounded_channel::<std::path::PathBuf>();
    let (fetch_err_tx, _fetch_err_rx) = mpsc::unbounded_channel::<RestoreError>();
    let (applier_done_tx, _applier_done_rx) = mpsc::unbounded_channel::<Option<RestoreError>>();
    let (stop_tx, stop_rx) = watch::channel(false);
    let (alarm_tx, alarm_rx) = mpsc::channel(1);

    let in_rx = Arc::new(Mutex::new(in_rx));
    let n_fetchers = fetcher::num_fetchers(req.config.max_fetchers, remaining.len()).max(1);

    let mut fetcher_handles = Vec::with_capacity(n_fetchers);
    for id in 0..n_fetchers {
        fetcher_handles.push(tokio::spawn(fetcher::fetch_loop(
            id,
            in_rx.clone(),
            out_tx.clone(),
            loc_tx.clone(),
            fetch_err_tx.clone(),
            stop_rx.clone(),
            collaborators.store.clone(),
            temp_dir.clone(),
        )));
    }
    drop(out_tx);

    for (idx, handle) in remaining.iter().enumerate() {
        if in_tx
            .send(FetcherInfo {
                handle: handle.clone(),
                index: idx as i64,
            })
            .is_err()
        {
            break;
        }
    }
    drop(in_tx);

    let alarm_handle = tokio::spawn(leankeeper::alarm_handler_loop(
        clients.maintenance.clone(),
        alarm_rx,
        stop_rx.clone(),
    ));

    let applier_result = applier::run(
        clients,
        &req.config,
        endpoints,
        remaining,
        collaborators.compressor.as_ref(),
        out_rx,
        alarm_tx,
        applier_done_tx,
        1,
    )
    .await;

    let _ = stop_tx.send(true);
    for handle in fetcher_handles {
        let _ = handle.await;
    }
    let _ = alarm_handle.await;

    loc_rx.close();
    while let Ok(path) = loc_rx.try_recv() {
        if path.exists() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                log::warn!("cleanup: failed to remove leftover temp file {path:?}: {e}");
            }
        }
    }

    last_revision = applier_result?;
    Ok(last_revision)
}

//! Fetcher Pool: N concurrent workers draining a shared work queue of delta
//! handles, persisting each blob to the temp directory and announcing it to
//! the applier. Grounded on the bounded-concurrency fetch-and-forward
//! pattern used elsewhere for object-store-backed restores, adapted here to
//! an explicit worker-pool-over-channels shape to match this codebase's own
//! task-manager idiom (dispatch loop + `tokio::select!`) rather than a
//! combinator-based `try_for_each_spawned`.

use crate::{
    error::RestoreError,
    model::{ApplierInfo, FetcherInfo},
    store::SnapStore,
    tempdir::TempDirectory,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default maximum fetcher concurrency when a request doesn't override it.
pub const DEFAULT_MAX_FETCHERS: usize = 6;

/// Runs one fetcher worker until `in_q` is exhausted or `stop` fires.
///
/// On success for an item, persists the raw fetched bytes exactly as
/// returned by the store — still compressed if the handle names a codec,
/// trailing hash included; decompression and integrity verification are the
/// applier's job — to `temp_dir/<handle.name>`, then emits the path on
/// `loc_q` (for later cleanup bookkeeping) and an `ApplierInfo` on `out_q`.
///
/// On failure for an item, emits the error on `err_q` and a sentinel
/// `ApplierInfo` on `out_q`, then stops: the applier treats the sentinel as
/// fatal, so this worker has nothing useful left to fetch. Other fetchers
/// keep draining the queue until they either finish it or hit the `stop`
/// signal the orchestrator raises once the applier reports the pipeline
/// dead.
pub async fn fetch_loop(
    id: usize,
    in_q: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<FetcherInfo>>>,
    out_q: mpsc::UnboundedSender<ApplierInfo>,
    loc_q: mpsc::UnboundedSender<std::path::PathBuf>,
    err_q: mpsc::UnboundedSender<RestoreError>,
    mut stop: tokio::sync::watch::Receiver<bool>,
    store: Arc<dyn SnapStore>,
    temp_dir: Arc<TempDirectory>,
) {
    log::info!("fetcher {id} starting");
    loop {
        let item = {
            let mut guard = in_q.lock().await;
            tokio::select! {
                biased;
                _ = stop.changed() => None,
                item = guard.recv() => item,
            }
        };
        let Some(item) = item else {
            break;
        };

        match fetch_one(&item, &*store, &temp_dir).await {
            Ok(path) => {
                if loc_q.send(path.clone()).is_err() {
                    break;
                }
                if out_q
                    .send(ApplierInfo {
                        path: Some(path),
                        index: item.index,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                log::warn!("fetcher {id} failed on delta index {}: {e}", item.index);
                let _ = err_q.send(e);
                let _ = out_q.send(ApplierInfo::sentinel());
                break;
            }
        }
    }
    log::info!("fetcher {id} stopping");
}

async fn fetch_one(
    item: &FetcherInfo,
    store: &dyn SnapStore,
    temp_dir: &TempDirectory,
) -> Result<std::path::PathBuf, RestoreError> {
    use tokio::io::AsyncReadExt;

    let mut stream = store
        .fetch(&item.handle)
        .await
        .map_err(|e| RestoreError::Fetch(e.to_string()))?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;

    let path = temp_dir.join(&item.handle.name);
    tokio::fs::write(&path, &buf).await?;
    Ok(path)
}

/// How many fetcher workers to spawn for `remaining` queued deltas.
pub fn num_fetchers(max_fetchers: usize, remaining: usize) -> usize {
    max_fetchers.min(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_fetchers_is_bounded_by_remaining_work() {
        assert_eq!(num_fetchers(6, 3), 3);
        assert_eq!(num_fetchers(6, 20), 6);
        assert_eq!(num_fetchers(6, 0), 0);
    }
}

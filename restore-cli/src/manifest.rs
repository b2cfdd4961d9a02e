//! The object store listing itself is an external collaborator (see
//! `SPEC_FULL.md` §4.8); this binary instead reads the ordered list of base
//! and delta snapshot handles to restore from a small JSON manifest,
//! produced by whatever process enumerates the backup bucket.

use crate::error::{CliError, CliResult};
use restore_core::model::{SnapshotHandle, SnapshotKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ManifestHandle {
    pub directory: String,
    pub name: String,
    #[serde(rename = "startRevision")]
    pub start_revision: i64,
    #[serde(rename = "lastRevision")]
    pub last_revision: i64,
    #[serde(rename = "compressionSuffix", default)]
    pub compression_suffix: String,
}

impl ManifestHandle {
    fn into_handle(self, kind: SnapshotKind) -> SnapshotHandle {
        SnapshotHandle {
            kind,
            directory: self.directory,
            name: self.name,
            start_revision: self.start_revision,
            last_revision: self.last_revision,
            compression_suffix: self.compression_suffix,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub base: ManifestHandle,
    #[serde(default)]
    pub deltas: Vec<ManifestHandle>,
}

/// Load and validate a manifest: every delta must be contiguous with the one
/// before it, and the first delta must not start more than one revision
/// past the base (see `SnapshotHandle`'s contiguity invariant).
pub async fn load(path: &str) -> CliResult<(SnapshotHandle, Vec<SnapshotHandle>)> {
    let raw = tokio::fs::read(path).await?;
    let manifest: Manifest =
        serde_json::from_slice(&raw).map_err(|e| CliError::Manifest(e.to_string()))?;

    let base = manifest.base.into_handle(SnapshotKind::Full);
    let deltas: Vec<SnapshotHandle> = manifest
        .deltas
        .into_iter()
        .map(|d| d.into_handle(SnapshotKind::Delta))
        .collect();

    if let Some(first) = deltas.first() {
        if first.start_revision > base.last_revision + 1 {
            return Err(CliError::Manifest(format!(
                "first delta startRevision {} leaves a gap after base lastRevision {}",
                first.start_revision, base.last_revision
            )));
        }
    }
    for pair in deltas.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start_revision != prev.last_revision + 1 {
            return Err(CliError::Manifest(format!(
                "delta {:?} does not start immediately after delta {:?} ({} != {} + 1)",
                next.name, prev.name, next.start_revision, prev.last_revision
            )));
        }
    }

    Ok((base, deltas))
}

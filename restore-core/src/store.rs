//! Object store access. The actual object store client is an external
//! collaborator; this module only defines the narrow interface the restore
//! engine consumes, plus the boxed async-read type every fetch returns.

use crate::model::SnapshotHandle;
use async_trait::async_trait;
use std::io;
use tokio::io::AsyncRead;

/// A fetched but not-yet-buffered blob.
pub type ReadStream = std::pin::Pin<Box<dyn AsyncRead + Send + Unpin>>;

#[async_trait]
pub trait SnapStore: Send + Sync {
    async fn fetch(&self, handle: &SnapshotHandle) -> io::Result<ReadStream>;
}

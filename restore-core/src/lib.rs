//! restore-core: rebuilds an etcd data directory from a base snapshot and an
//! ordered chain of delta snapshots.
//!
//! The crate is organised leaf-first, the way the rest of this codebase's
//! storage-engine crates are laid out: integrity checking and compression at
//! the bottom, the base restorer and fetcher pool above that, the ordered
//! applier and lean-keeper above that, and the orchestrator tying all of it
//! together behind a single [`orchestrator::restore`] entry point.
//!
//! None of the external collaborators this engine drives — the object store,
//! the etcd wire client, the embedded etcd process, member-control — are
//! implemented here. A caller supplies concrete implementations of the
//! traits in [`store`] and [`etcd_client`] (see [`orchestrator::Collaborators`]).

pub mod applier;
pub mod base_restore;
pub mod compression;
pub mod config;
pub mod error;
pub mod etcd_client;
pub mod fetcher;
pub mod integrity;
pub mod leankeeper;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod tempdir;

pub use config::RestorationConfig;
pub use error::{RestoreError, RestoreResult};
pub use model::{Event, EventKind, RestoreOutcome, RestoreRequest, SnapshotHandle, SnapshotKind};
pub use orchestrator::{restore, restore_and_stop_etcd, Collaborators};

//! Turns parsed CLI flags (with a handful of environment-variable overrides
//! a sidecar container is typically configured through) into a validated
//! [`RestorationConfig`], the way the rest of this codebase's bench and
//! harness tools convert a `clap::Parser` struct into their own internal
//! config type via `From`/`TryFrom` rather than threading `Cli` everywhere.

use crate::cli::Cli;
use restore_core::config::RestorationConfig;

impl From<&Cli> for RestorationConfig {
    fn from(cli: &Cli) -> Self {
        let initial_cluster = std::env::var("ETCD_RESTORE_INITIAL_CLUSTER")
            .unwrap_or_else(|_| cli.initial_cluster.clone());
        let log_level = std::env::var("ETCD_RESTORE_LOG").unwrap_or_else(|_| cli.log_level.clone());

        RestorationConfig {
            initial_cluster,
            initial_cluster_token: cli.initial_cluster_token.clone(),
            data_dir: cli.data_dir.clone(),
            temp_dir: cli.temp_dir.clone(),
            initial_advertise_peer_urls: cli
                .initial_advertise_peer_urls
                .split(',')
                .map(str::to_owned)
                .collect(),
            name: cli.name.clone(),
            skip_hash_check: cli.skip_hash_check,
            max_fetchers: cli.max_fetchers,
            max_call_send_msg_size: cli.max_call_send_msg_size,
            max_request_bytes: cli.max_request_bytes,
            max_txn_ops: cli.max_txn_ops,
            embedded_etcd_quota_bytes: cli.embedded_etcd_quota_bytes,
            auto_compaction_mode: cli.auto_compaction_mode.clone(),
            auto_compaction_retention: cli.auto_compaction_retention.clone(),
            log_level,
            dry_run: cli.dry_run,
        }
    }
}

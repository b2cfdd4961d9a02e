use clap::Parser;

const HELP_TEMPLATE: &str = r#"
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
"#;

/// `etcd-restore` rebuilds an etcd data directory from a base snapshot and an
/// ordered chain of delta snapshots described by a manifest file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, help_template = HELP_TEMPLATE)]
pub struct Cli {
    #[arg(long, help = "Path to the JSON manifest describing the base and delta snapshots", value_name = "FILE")]
    pub manifest: String,

    #[arg(long, help = "Initial cluster URL map for the transient etcd", default_value = "default=http://localhost:2380")]
    pub initial_cluster: String,

    #[arg(long, help = "Cluster token for the transient etcd", default_value = "etcd-cluster")]
    pub initial_cluster_token: String,

    #[arg(long, help = "Output data directory", default_value = "default.etcd", value_name = "DIR")]
    pub data_dir: String,

    #[arg(long, help = "Scratch directory for intermediate files", default_value = "default.restoration.tmp", value_name = "DIR")]
    pub temp_dir: String,

    #[arg(long, help = "Advertised peer URL for the restored member", default_value = "http://localhost:2380", value_name = "URL")]
    pub initial_advertise_peer_urls: String,

    #[arg(long, help = "Member name for the restored member", default_value = "default")]
    pub name: String,

    #[arg(long, help = "Bypass the base snapshot's bbolt integrity check", default_value_t = false)]
    pub skip_hash_check: bool,

    #[arg(long, help = "Maximum number of concurrent delta fetchers", default_value_t = 6, value_name = "N")]
    pub max_fetchers: usize,

    #[arg(long, help = "Maximum RPC send size in bytes", default_value_t = 10 * 1024 * 1024, value_name = "BYTES")]
    pub max_call_send_msg_size: u64,

    #[arg(long, help = "Maximum RPC accept size in bytes", default_value_t = 10 * 1024 * 1024, value_name = "BYTES")]
    pub max_request_bytes: u64,

    #[arg(long, help = "Maximum operations in one transaction", default_value_t = 10_240, value_name = "N")]
    pub max_txn_ops: u64,

    #[arg(long, help = "Transient etcd backend quota in bytes", default_value_t = 8 * 1024 * 1024 * 1024, value_name = "BYTES")]
    pub embedded_etcd_quota_bytes: u64,

    #[arg(long, help = "Auto-compaction mode (periodic|revision)", default_value = "periodic")]
    pub auto_compaction_mode: String,

    #[arg(long, help = "Auto-compaction retention", default_value = "30m")]
    pub auto_compaction_retention: String,

    #[arg(long, help = "Log filter string; overridden by ETCD_RESTORE_LOG if set", default_value = "info")]
    pub log_level: String,

    #[arg(long, help = "Fetch, verify and decode every snapshot without starting a transient etcd", default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, help = "Path to the etcd binary used to launch the transient server", default_value = "etcd")]
    pub etcd_binary: String,

    #[arg(long, help = "Path to the etcdutl binary used to restore the base snapshot", default_value = "etcdutl")]
    pub etcdutl_binary: String,
}

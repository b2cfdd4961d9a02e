//! Thin CLI entrypoint: parse flags, load the snapshot manifest, wire the
//! restore engine to a real object store and a real `etcd`/`etcdutl`
//! installation, run the restore, and report a process exit code.

use clap::Parser;
use error::CliResult;
use restore_core::{
    model::RestoreRequest,
    orchestrator::{self, Collaborators},
};
use std::{process, sync::Arc};

mod cli;
mod config;
mod error;
mod etcdproc;
mod manifest;
mod objectstore;

fn init_logging(cfg: &restore_core::config::RestorationConfig) {
    env_logger::Builder::new()
        .parse_filters(&std::env::var("ETCD_RESTORE_LOG").unwrap_or_else(|_| cfg.log_level.clone()))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    let config: restore_core::config::RestorationConfig = (&cli).into();
    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        let _ = libsky::util::terminal::write_error(format!("etcd-restore failed: {e}\n"));
        process::exit(1);
    }
}

async fn run(cli: cli::Cli, config: restore_core::config::RestorationConfig) -> CliResult<()> {
    config.validate()?;

    let (base, deltas) = manifest::load(&cli.manifest).await?;
    log::info!(
        "loaded manifest: base revision {} with {} deltas",
        base.last_revision,
        deltas.len()
    );

    let store_url = format!("file://{}", base.directory);
    let store = objectstore::ObjectStoreSnapStore::from_url(&store_url)?;

    let client_url = config
        .initial_advertise_peer_urls
        .first()
        .map(|u| u.replace("2380", "2379"))
        .unwrap_or_else(|| "http://127.0.0.1:2379".to_owned());

    let req = RestoreRequest {
        config: config.clone(),
        base_snapshot: base,
        delta_list: deltas,
        peer_urls: config.initial_advertise_peer_urls.clone(),
        cluster_urls: Default::default(),
        client_factory_builder: Arc::new(etcdproc::RealClientFactory),
    };

    let collaborators = Collaborators {
        store: Arc::new(store),
        compressor: Arc::new(restore_core::compression::DefaultCompressor),
        snapshot_restorer: Arc::new(etcdproc::EtcdutlSnapshotRestorer {
            etcdutl_binary: cli.etcdutl_binary.clone(),
        }),
        etcd_launcher: Arc::new(etcdproc::SubprocessEtcdLauncher {
            etcd_binary: cli.etcd_binary.clone(),
            client_url: client_url.clone(),
        }),
    };

    let member_ctl = req.peer_urls.first().map(|peer_url| etcdproc::EtcdMemberControl {
        endpoint: client_url,
        peer_url: peer_url.clone(),
    });

    let outcome = orchestrator::restore_and_stop_etcd(
        &req,
        &collaborators,
        member_ctl.as_ref().map(|m| m as &dyn restore_core::etcd_client::MemberControl),
    )
    .await?;

    let _ = libsky::util::terminal::write_success(format!(
        "restore complete: revision={} deltas_applied={} first_delta_skipped={}\n",
        outcome.final_revision, outcome.deltas_applied, outcome.first_delta_skipped
    ));
    Ok(())
}

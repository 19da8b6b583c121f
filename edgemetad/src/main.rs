use std::sync::Arc;

use clap::Parser;
use edgemeta_core::connectivity::{ConnectivityProbe, SwitchableConnectivity};
use edgemeta_core::constants;
use edgemeta_core::manager::{ManagerConfig, MetaManager};
use edgemeta_core::memory_bus::InProcessBus;
use edgemeta_core::memory_store::InMemoryMetaStore;
use edgemeta_core::replication::{NoopReplicationSink, ReplicationSink};
use edgemeta_core::store::MetaStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;
mod errors;
mod logger;

use config::Config;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> errors::Result<()> {
    let cfg = Config::parse();
    logger::setup(&cfg.log_level);

    info!(
        "edgemetad starting, remote_query_timeout={}s csi_sync_timeout={}s",
        cfg.remote_query_timeout_secs, cfg.csi_sync_timeout_secs
    );

    let bus = Arc::new(InProcessBus::new());
    for module in [
        constants::MODULE_META_MANAGER,
        constants::MODULE_EDGED,
        constants::MODULE_APPSD,
        constants::MODULE_DEVICE_TWIN,
        constants::MODULE_CLOUD,
    ] {
        bus.register(module).await;
    }
    bus.alias_group(constants::GROUP_CLOUD, constants::MODULE_CLOUD).await;

    let store: Arc<dyn MetaStore> = Arc::new(InMemoryMetaStore::new());
    let connectivity: Arc<dyn ConnectivityProbe> = Arc::new(SwitchableConnectivity::new(false));
    let replication: Arc<dyn ReplicationSink> = Arc::new(NoopReplicationSink);

    let manager = MetaManager::new(
        bus.clone(),
        store,
        connectivity,
        replication,
        ManagerConfig {
            remote_timeout: cfg.remote_query_timeout(),
            csi_timeout: cfg.csi_sync_timeout(),
        },
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    manager.run(shutdown).await;
    info!("edgemetad: main loop exited");

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install signal handler: {err}");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => token.cancel(),
        _ = terminate => token.cancel(),
    }

    info!("signal received, starting graceful shutdown");
}

//! simple-iotd: the Simple IoT core runtime as a single process.
//!
//! ## Configuration
//! Set via environment variables or config file (`SIMPLE_IOT_CONFIG`):
//! - `SIMPLE_IOT_DATA_DIR`: persistent KV store path (default `./data`)
//! - `SIMPLE_IOT_AUTH_TOKEN`: shared secret for privileged subjects
//! - `SIMPLE_IOT_SCHEDULE_TICK_SECS`: schedule sweeper period (default 5)
//! - `SIMPLE_IOT_LOG`: tracing `EnvFilter` directive (default `info`)
//!
//! ## Usage
//! ```bash
//! simple-iotd
//! SIMPLE_IOT_CONFIG=/app/config.yaml simple-iotd
//! SIMPLE_IOT_DATA_DIR=/var/lib/simple-iot simple-iotd
//! ```

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simple_iot::bus::{Bus, InProcessBus};
use simple_iot::config::Config;
use simple_iot::service::StoreService;
use simple_iot::store::{KvNodeStore, NodeStore, SledKv};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("SIMPLE_IOT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().map_err(|e| {
        error!("failed to load configuration: {}", e);
        e
    })?;

    info!(data_dir = %config.data_dir, "starting simple-iot core");

    let kv = SledKv::open(&config.data_dir)?;
    let store: Arc<dyn NodeStore> = Arc::new(KvNodeStore::new(Arc::new(kv)));
    let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());

    let service = StoreService::new(store, bus);
    let (sweeper, stop) = service.run(config.schedule_tick()).await?;

    info!("simple-iot core running");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        res = sweeper => {
            if let Err(e) = res {
                error!(error = %e, "schedule sweeper task failed");
            }
        }
    }
    let _ = stop.send(true);

    Ok(())
}

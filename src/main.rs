//! Headless balance service: replays recorded frames through the pipeline
//! and serves the session control API.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use balance_monitor::config::Config;
use balance_monitor::control::{self, ControlState};
use balance_monitor::controller::PipelineController;
use balance_monitor::logging;
use balance_monitor::pose::HttpEstimationClient;
use balance_monitor::render::TextRenderer;
use balance_monitor::replay::ReplaySource;
use balance_monitor::store::HttpScoreStore;

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    let log_path = logging::init()?;
    info!("Balance Monitor ({})", env!("GIT_VERSION"));
    info!("log: {}", log_path.display());

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);
    let (estimation, database) = (&config.estimation, &config.database);
    info!(
        "[config] estimation={} workers={} database={} control={}",
        estimation.server_url, estimation.workers, database.url, config.control.listen_addr
    );

    // blocking clients are built before any tokio runtime exists
    let estimator = HttpEstimationClient::new(&estimation.server_url, estimation.request_timeout())
        .context("failed to build estimation client")?;
    let store = HttpScoreStore::new(&database.url, &database.module_type, database.timeout())
        .context("failed to build score store client")?;
    let text = TextRenderer::from_config(&config.overlay);

    let mut pipeline =
        PipelineController::start(&config, Arc::new(estimator), Arc::new(store), text)?;

    match config.replay.frames_dir {
        Some(_) => {
            let replay = ReplaySource::open(&config.replay, &config.camera)?;
            pipeline.spawn_source("replay", move |sink| replay.run(sink))?;
        }
        None => warn!("replay.frames_dir is not set; no frames will be processed"),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let state = ControlState {
        session: pipeline.session(),
        start_delay: config.control.start_delay(),
        stop: pipeline.stop_signal(),
    };
    let stop = pipeline.stop_signal();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            stop.stop();
        }
    });

    let served = runtime.block_on(control::serve(&config.control.listen_addr, state));
    if let Err(e) = &served {
        error!("{e:#}");
        pipeline.request_stop();
    }
    runtime.shutdown_timeout(Duration::from_secs(1));

    // threads are joined before a server failure is reported
    let closed = pipeline.close();
    served?;
    closed
}

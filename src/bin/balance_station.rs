//! Balance station: live camera, on-screen overlays and the session
//! control API in one process.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use balance_monitor::camera::CameraSource;
use balance_monitor::config::Config;
use balance_monitor::control::{self, ControlState};
use balance_monitor::controller::PipelineController;
use balance_monitor::display::{Compositor, DisplayAction};
use balance_monitor::logging;
use balance_monitor::pose::HttpEstimationClient;
use balance_monitor::render::TextRenderer;
use balance_monitor::store::HttpScoreStore;

const CONFIG_PATH: &str = "config.toml";
const SNAPSHOT_DIR: &str = "imgs";

fn save_snapshot(compositor: &Compositor) -> Result<PathBuf> {
    std::fs::create_dir_all(SNAPSHOT_DIR)?;
    let (w, h) = compositor.dimensions();
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = PathBuf::from(SNAPSHOT_DIR).join(format!("{stamp}.png"));
    let image = image::RgbImage::from_raw(w as u32, h as u32, compositor.rgb_bytes())
        .context("snapshot buffer has the wrong size")?;
    image
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn main() -> Result<()> {
    let log_path = logging::init()?;
    info!("Balance Station ({})", env!("GIT_VERSION"));
    info!("log: {}", log_path.display());

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);
    let (width, height) = config.camera.resolution();

    let estimation = &config.estimation;
    let estimator = HttpEstimationClient::new(&estimation.server_url, estimation.request_timeout())
        .context("failed to build estimation client")?;
    let database = &config.database;
    let store = HttpScoreStore::new(&database.url, &database.module_type, database.timeout())
        .context("failed to build score store client")?;
    let text = TextRenderer::from_config(&config.overlay);

    let camera = CameraSource::open(&config.camera)?;
    let latest = camera.latest();
    let mut compositor = Compositor::new("Balance Station", width as usize, height as usize)?;

    let mut pipeline =
        PipelineController::start(&config, Arc::new(estimator), Arc::new(store), text)?;
    pipeline.spawn_source("camera", move |sink| camera.run(sink))?;

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
    let listen_addr = config.control.listen_addr.clone();
    let stop = pipeline.stop_signal();
    let server = runtime.spawn(async move {
        let served = control::serve(&listen_addr, state).await;
        if let Err(e) = &served {
            error!("{e:#}");
            stop.stop();
        }
        served
    });

    let session = pipeline.session();
    let keypoints = Arc::clone(pipeline.keypoints_overlay());
    let hud = Arc::clone(pipeline.text_overlay());
    let interval = config.camera.frame_interval();

    // minifb wants the main thread
    while !pipeline.is_stopped() {
        let started = Instant::now();

        let frame = latest.lock().clone();
        if let Some(frame) = frame {
            if let Err(e) = compositor.draw_frame(&frame) {
                warn!("failed to draw camera frame: {e:#}");
            }
        }
        compositor.blend(&keypoints.front());
        compositor.blend(&hud.front());

        match compositor.present() {
            Ok(actions) => {
                for action in actions {
                    match action {
                        DisplayAction::Quit => pipeline.request_stop(),
                        DisplayAction::Reset => {
                            session.reset();
                        }
                        DisplayAction::Snapshot => match save_snapshot(&compositor) {
                            Ok(path) => info!("snapshot saved to {}", path.display()),
                            Err(e) => warn!("{e:#}"),
                        },
                    }
                }
            }
            Err(e) => {
                error!("{e:#}");
                pipeline.request_stop();
            }
        }

        let spent = started.elapsed();
        if spent < interval {
            thread::sleep(interval - spent);
        }
    }

    // the server winds down on the stop flag
    let served = runtime
        .block_on(server)
        .context("control server task panicked")
        .and_then(|served| served);
    runtime.shutdown_timeout(Duration::from_secs(1));
    drop(keypoints);
    drop(hud);

    let closed = pipeline.close();
    served?;
    closed
}

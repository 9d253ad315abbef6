//! Pipeline wiring and ordered shutdown.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::measure::{BalanceStateMachine, MeasurerRunner, SessionHandle};
use crate::pipeline::workers::WorkerStats;
use crate::pipeline::{FrameMailbox, FrameSample, KeypointWorkerPool, ResultFusion, StopSignal};
use crate::pose::EstimationClient;
use crate::render::{draw_skeleton, Hud, OverlayDoubleBuffer, OverlayWriter, TextRenderer};
use crate::store::ScoreStore;

/// Producer side handed to a frame source
#[derive(Clone)]
pub struct FrameSink {
    mailbox: Arc<FrameMailbox>,
    stop: StopSignal,
}

impl FrameSink {
    pub fn new(mailbox: Arc<FrameMailbox>, stop: StopSignal) -> Self {
        Self { mailbox, stop }
    }

    pub fn put(&self, frame: FrameSample) {
        self.mailbox.put(frame);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

/// Owns every pipeline thread and the termination flag they share.
pub struct PipelineController {
    stop: StopSignal,
    mailbox: Arc<FrameMailbox>,
    fusion: Arc<ResultFusion>,
    keypoints_overlay: Arc<OverlayDoubleBuffer>,
    text_overlay: Arc<OverlayDoubleBuffer>,
    session: SessionHandle,
    workers: KeypointWorkerPool,
    measurer: MeasurerRunner,
    publisher: JoinHandle<()>,
    sources: Vec<JoinHandle<()>>,
    fatal: Arc<Mutex<Option<anyhow::Error>>>,
}

impl PipelineController {
    /// Start mailbox, workers, state machine and keypoints overlay, in that order.
    pub fn start(
        config: &Config,
        estimator: Arc<dyn EstimationClient>,
        store: Arc<dyn ScoreStore>,
        text: TextRenderer,
    ) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let stop = StopSignal::new();
        let (width, height) = config.camera.resolution();
        let interval = config.camera.frame_interval();

        let mailbox = Arc::new(FrameMailbox::new());
        let fusion = Arc::new(ResultFusion::new());

        let workers = KeypointWorkerPool::start(
            config.estimation.workers,
            Arc::clone(&mailbox),
            Arc::clone(&fusion),
            estimator,
            stop.clone(),
        )
        .context("failed to start keypoint workers")?;

        let text_overlay = OverlayDoubleBuffer::new(width, height);
        let hud = Hud::new(text, config.camera.border_margin(), config.overlay.debug_anchor);
        let (measurer, session) = MeasurerRunner::start(
            BalanceStateMachine::new(&config.measurer),
            Arc::clone(&fusion),
            hud,
            text_overlay.writer(),
            store,
            interval,
            stop.clone(),
        )
        .context("failed to start state machine")?;

        let keypoints_overlay = OverlayDoubleBuffer::new(width, height);
        let publisher = {
            let writer = keypoints_overlay.writer();
            let fusion = Arc::clone(&fusion);
            let stop = stop.clone();
            let threshold = config.overlay.confidence_threshold;
            thread::Builder::new()
                .name("keypoints-overlay".to_string())
                .spawn(move || publish_keypoints(writer, &fusion, threshold, interval, &stop))
                .context("failed to start keypoints overlay")?
        };

        info!(
            "pipeline started: {}x{} @ {} fps, {} workers",
            width,
            height,
            config.camera.framerate,
            workers.len()
        );

        Ok(Self {
            stop,
            mailbox,
            fusion,
            keypoints_overlay,
            text_overlay,
            session,
            workers,
            measurer,
            publisher,
            sources: Vec::new(),
            fatal: Arc::new(Mutex::new(None)),
        })
    }

    /// Run a frame source on its own thread. An error from the source is
    /// fatal: it stops the pipeline and is returned by `close`.
    pub fn spawn_source<F>(&mut self, name: &str, source: F) -> Result<()>
    where
        F: FnOnce(FrameSink) -> Result<()> + Send + 'static,
    {
        let sink = self.sink();
        let stop = self.stop.clone();
        let mailbox = Arc::clone(&self.mailbox);
        let fatal = Arc::clone(&self.fatal);
        let label = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if let Err(e) = source(sink) {
                    error!("{label} failed: {e:#}");
                    fatal.lock().get_or_insert(e);
                    stop.stop();
                    mailbox.close();
                } else {
                    debug!("{label} finished");
                }
            })
            .with_context(|| format!("failed to start {name}"))?;
        self.sources.push(handle);
        Ok(())
    }

    pub fn sink(&self) -> FrameSink {
        FrameSink::new(Arc::clone(&self.mailbox), self.stop.clone())
    }

    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn fusion(&self) -> &Arc<ResultFusion> {
        &self.fusion
    }

    pub fn mailbox(&self) -> &Arc<FrameMailbox> {
        &self.mailbox
    }

    pub fn keypoints_overlay(&self) -> &Arc<OverlayDoubleBuffer> {
        &self.keypoints_overlay
    }

    pub fn text_overlay(&self) -> &Arc<OverlayDoubleBuffer> {
        &self.text_overlay
    }

    pub fn worker_stats(&self) -> &WorkerStats {
        self.workers.stats()
    }

    /// Block until something requests shutdown
    pub fn wait(&self) {
        while !self.stop.is_stopped() {
            thread::sleep(Duration::from_millis(50));
        }
    }

    /// Stop every thread, state machine first, and release the overlays
    /// last. Returns the fatal source error, if there was one.
    pub fn close(self) -> Result<()> {
        info!("shutting down pipeline");
        self.stop.stop();
        self.mailbox.close();

        self.measurer.join();
        if self.publisher.join().is_err() {
            warn!("keypoints overlay thread panicked");
        }
        self.workers.join();
        for source in self.sources {
            if source.join().is_err() {
                warn!("frame source panicked");
            }
        }

        info!(
            "frames posted: {}, dropped: {}",
            self.mailbox.posted_frames(),
            self.mailbox.dropped_frames()
        );
        drop(self.keypoints_overlay);
        drop(self.text_overlay);

        match self.fatal.lock().take() {
            Some(e) => Err(e.context("pipeline stopped on a fatal error")),
            None => Ok(()),
        }
    }
}

/// Redraw the skeleton whenever a fresher fused result shows up
fn publish_keypoints(
    mut writer: OverlayWriter,
    fusion: &ResultFusion,
    threshold: f32,
    interval: Duration,
    stop: &StopSignal,
) {
    let mut last_rendered = None;
    while !stop.is_stopped() {
        let started = Instant::now();
        let fused = fusion.read();
        if last_rendered.map_or(true, |t| fused.timestamp > t) {
            let plate = writer.begin_frame();
            if let Some(pose) = fused.person() {
                draw_skeleton(plate.image_mut(), pose, threshold);
            }
            plate.fill_alpha_channel();
            writer.publish();
            last_rendered = Some(fused.timestamp);
        }
        let spent = started.elapsed();
        if spent < interval {
            thread::sleep(interval - spent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crate::error::{EstimateError, PersistError};
    use crate::measure::{Mode, ScoreRecord};
    use crate::pose::Pose;

    struct Nobody;

    impl EstimationClient for Nobody {
        fn estimate(&self, _frame: &[u8]) -> Result<Option<Pose>, EstimateError> {
            Ok(None)
        }
    }

    struct Discard;

    impl ScoreStore for Discard {
        fn save(&self, _record: &ScoreRecord) -> Result<(), PersistError> {
            Ok(())
        }
    }

    fn controller() -> PipelineController {
        let mut config = Config::default();
        config.camera.width = 160;
        config.camera.height = 120;
        config.camera.framerate = 100;
        config.estimation.workers = 2;
        let text = TextRenderer::disabled();
        PipelineController::start(&config, Arc::new(Nobody), Arc::new(Discard), text).unwrap()
    }

    #[test]
    fn test_close_clean() {
        let pipeline = controller();
        assert!(!pipeline.is_stopped());
        assert_eq!(pipeline.keypoints_overlay().dimensions(), (160, 120));
        pipeline.close().unwrap();
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let mut config = Config::default();
        config.measurer.debounce_secs = -0.7;
        let text = TextRenderer::disabled();
        let err = PipelineController::start(&config, Arc::new(Nobody), Arc::new(Discard), text)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("measurer.debounce_secs"), "{err:#}");
    }

    #[test]
    fn test_source_error_is_fatal() {
        let mut pipeline = controller();
        pipeline
            .spawn_source("camera", |_sink| Err(anyhow!("camera unplugged")))
            .unwrap();
        pipeline.wait();

        let err = pipeline.close().unwrap_err();
        assert!(format!("{err:#}").contains("camera unplugged"));
    }

    #[test]
    fn test_source_stops_with_pipeline() {
        let mut pipeline = controller();
        pipeline
            .spawn_source("replay", |sink| {
                while !sink.is_stopped() {
                    sink.put(FrameSample::now(vec![1u8]));
                    thread::sleep(Duration::from_millis(2));
                }
                Ok(())
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while pipeline.fusion().read().result.is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(pipeline.fusion().read().result.is_some());
        let session = pipeline.session();
        while session.status().mode != Mode::NotDetected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(session.status().mode, Mode::NotDetected);

        pipeline.request_stop();
        pipeline.close().unwrap();
    }
}

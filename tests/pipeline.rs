use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use balance_monitor::config::Config;
use balance_monitor::controller::PipelineController;
use balance_monitor::error::{EstimateError, PersistError};
use balance_monitor::measure::{Mode, ScoreRecord};
use balance_monitor::pipeline::FrameSample;
use balance_monitor::pose::{EstimationClient, Keypoint, KeypointIndex, Pose};
use balance_monitor::render::TextRenderer;
use balance_monitor::store::ScoreStore;

/// Always sees someone standing on the left leg with arms out
struct StanceClient;

impl EstimationClient for StanceClient {
    fn estimate(&self, _frame: &[u8]) -> Result<Option<Pose>, EstimateError> {
        thread::sleep(Duration::from_millis(3));
        let mut pose = Pose::default();
        let joints = [
            (KeypointIndex::Nose, 640.0, 100.0),
            (KeypointIndex::Neck, 640.0, 160.0),
            (KeypointIndex::RightWrist, 420.0, 165.0),
            (KeypointIndex::LeftWrist, 860.0, 158.0),
            (KeypointIndex::MidHip, 640.0, 360.0),
            (KeypointIndex::LeftAnkle, 660.0, 620.0),
            (KeypointIndex::RightAnkle, 610.0, 520.0),
        ];
        for (joint, x, y) in joints {
            pose.set(joint, Keypoint::new(x, y, 0.9));
        }
        Ok(Some(pose))
    }
}

#[derive(Default)]
struct MemoryStore {
    records: Mutex<Vec<ScoreRecord>>,
}

impl ScoreStore for MemoryStore {
    fn save(&self, record: &ScoreRecord) -> Result<(), PersistError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

fn config(auto_start: bool) -> Config {
    let mut config = Config::default();
    config.camera.width = 320;
    config.camera.height = 240;
    config.camera.framerate = 100;
    config.estimation.workers = 3;
    config.measurer.normal_secs = 0.3;
    config.measurer.score_popup_timeout_secs = 0.1;
    config.measurer.debounce_secs = 0.05;
    config.measurer.auto_start = auto_start;
    config
}

fn start(config: &Config, store: Arc<MemoryStore>) -> PipelineController {
    let text = TextRenderer::disabled();
    let mut pipeline =
        PipelineController::start(config, Arc::new(StanceClient), store, text).unwrap();
    pipeline
        .spawn_source("test-camera", |sink| {
            while !sink.is_stopped() {
                sink.put(FrameSample::now(vec![0u8; 16]));
                thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        })
        .unwrap();
    pipeline
}

fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_auto_started_session_is_scored_and_stored() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = start(&config(true), Arc::clone(&store));

    assert!(wait_for(Duration::from_secs(5), || !store.records.lock().is_empty()));
    let record = store.records.lock()[0].clone();
    assert_eq!(record.user_id, "");
    assert!(record.score >= 100);
    assert!(record.elapsed >= Duration::from_millis(300));

    assert!(pipeline.keypoints_overlay().sequence() > 0);
    assert!(pipeline.text_overlay().sequence() > 0);
    pipeline.close().unwrap();
}

#[test]
fn test_requested_session_carries_user() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = start(&config(false), Arc::clone(&store));
    let session = pipeline.session();

    assert!(wait_for(Duration::from_secs(2), || pipeline.fusion().read().has_person()));
    let seen = session.status().ticks;
    assert!(wait_for(Duration::from_secs(2), || {
        let status = session.status();
        status.ticks > seen + 1 && status.mode == Mode::Idle
    }));
    session.start_blocking("77").unwrap();
    assert!(wait_for(Duration::from_secs(1), || session.status().mode != Mode::Idle));

    assert!(wait_for(Duration::from_secs(5), || !store.records.lock().is_empty()));
    assert_eq!(store.records.lock()[0].user_id, "77");
    assert!(wait_for(Duration::from_secs(1), || session.status().mode == Mode::Idle));

    pipeline.close().unwrap();
}

#[test]
fn test_close_after_stop_request() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = start(&config(false), store);
    assert!(wait_for(Duration::from_secs(2), || {
        pipeline.worker_stats().requests.load(Ordering::Relaxed) > 0
    }));
    pipeline.request_stop();
    pipeline.wait();
    pipeline.close().unwrap();
}

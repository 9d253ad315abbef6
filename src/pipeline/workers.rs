use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::fusion::{KeypointsResult, ResultFusion};
use super::mailbox::FrameMailbox;
use super::StopSignal;
use crate::pose::EstimationClient;

/// Per-pool request counters
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub requests: AtomicU64,
    pub failures: AtomicU64,
    pub accepted: AtomicU64,
    pub stale: AtomicU64,
}

/// Fixed set of symmetric workers, each looping
/// claim frame -> call service -> submit stamped result.
pub struct KeypointWorkerPool {
    handles: Vec<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl KeypointWorkerPool {
    pub fn start(
        workers: usize,
        mailbox: Arc<FrameMailbox>,
        fusion: Arc<ResultFusion>,
        client: Arc<dyn EstimationClient>,
        stop: StopSignal,
    ) -> std::io::Result<Self> {
        let stats = Arc::new(WorkerStats::default());
        let workers = if workers == 0 {
            warn!("asked for 0 keypoint workers; starting 1");
            1
        } else {
            workers
        };
        let mut handles = Vec::with_capacity(workers);

        for i in 0..workers {
            let name = format!("keypoints-extractor-{i}");
            let mailbox = Arc::clone(&mailbox);
            let fusion = Arc::clone(&fusion);
            let client = Arc::clone(&client);
            let stop = stop.clone();
            let stats = Arc::clone(&stats);
            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || worker_loop(&mailbox, &fusion, client.as_ref(), &stop, &stats))?;
            handles.push(handle);
        }

        info!("started {} keypoint workers", handles.len());
        Ok(Self { handles, stats })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for every worker to exit. The mailbox must be closed first or
    /// idle workers stay parked in `take`.
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("{name} panicked");
            }
        }
    }
}

fn worker_loop(
    mailbox: &FrameMailbox,
    fusion: &ResultFusion,
    client: &dyn EstimationClient,
    stop: &StopSignal,
    stats: &WorkerStats,
) {
    let name = thread::current().name().unwrap_or("worker").to_string();

    while !stop.is_stopped() {
        let Some(frame) = mailbox.take() else {
            break;
        };

        stats.requests.fetch_add(1, Ordering::Relaxed);
        let person = match client.estimate(&frame.payload) {
            Ok(person) => person,
            Err(e) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("{name}: {e}");
                continue;
            }
        };

        // stamp with capture time so late answers lose to newer frames
        if fusion.submit(KeypointsResult::new(frame.timestamp, person)) {
            stats.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.stale.fetch_add(1, Ordering::Relaxed);
            debug!("{name}: discarded stale result");
        }
    }

    debug!("{name} exiting");
}

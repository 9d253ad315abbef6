pub mod fusion;
pub mod mailbox;
pub mod workers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use fusion::{FusedState, KeypointsResult, ResultFusion};
pub use mailbox::{FrameMailbox, FrameSample};
pub use workers::KeypointWorkerPool;

/// Cooperative termination flag shared by every pipeline loop.
///
/// Checked at the top of each iteration; a thread blocked in a network call
/// only observes it on its next pass.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

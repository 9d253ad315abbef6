use parking_lot::Mutex;
use std::time::Instant;

use crate::pose::Pose;

/// Keypoints for one frame, stamped with the frame's capture time
/// (not the response time) so results can be ordered by freshness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointsResult {
    pub timestamp: Instant,
    /// `None` when the service found nobody
    pub person: Option<Pose>,
}

impl KeypointsResult {
    pub fn new(timestamp: Instant, person: Option<Pose>) -> Self {
        Self { timestamp, person }
    }

    pub fn not_detected(timestamp: Instant) -> Self {
        Self::new(timestamp, None)
    }
}

/// Value copy of the fused cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedState {
    pub timestamp: Instant,
    pub result: Option<KeypointsResult>,
}

impl FusedState {
    /// Detected person, if the freshest result has one
    pub fn person(&self) -> Option<&Pose> {
        self.result.as_ref().and_then(|r| r.person.as_ref())
    }

    pub fn has_person(&self) -> bool {
        self.person().is_some()
    }
}

/// Freshness-gated fan-in point for the request workers.
///
/// Workers race against an unordered service, so a slow answer to an old
/// frame must never replace a faster answer to a newer one: a candidate is
/// only accepted when its timestamp is strictly newer than the stored one.
#[derive(Debug)]
pub struct ResultFusion {
    state: Mutex<FusedState>,
}

impl ResultFusion {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Results stamped at or before `origin` are rejected
    pub fn starting_at(origin: Instant) -> Self {
        Self {
            state: Mutex::new(FusedState {
                timestamp: origin,
                result: None,
            }),
        }
    }

    /// Returns whether the candidate became the current result
    pub fn submit(&self, candidate: KeypointsResult) -> bool {
        let mut state = self.state.lock();
        if candidate.timestamp > state.timestamp {
            state.timestamp = candidate.timestamp;
            state.result = Some(candidate);
            true
        } else {
            false
        }
    }

    pub fn read(&self) -> FusedState {
        *self.state.lock()
    }

    pub fn timestamp(&self) -> Instant {
        self.state.lock().timestamp
    }
}

impl Default for ResultFusion {
    fn default() -> Self {
        Self::new()
    }
}

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use crate::pose::KeypointIndex;

/// Measurer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Idle,
    NotDetected,
    Measuring,
    Abnormal,
    Normal,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Idle => "Idle",
            Mode::NotDetected => "NotDetected",
            Mode::Measuring => "Measuring",
            Mode::Abnormal => "Abnormal",
            Mode::Normal => "Normal",
        }
    }

    /// Showing a final score
    pub fn is_finished(self) -> bool {
        matches!(self, Mode::Normal | Mode::Abnormal)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One balance measurement, alive from the start of `Measuring` until the
/// score popup closes (or a reset / lost detection clears it).
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSession {
    pub user_id: String,
    /// Standing-leg ankle chosen at start
    pub anchor_joint: KeypointIndex,
    pub start_anchor: (f32, f32),
    /// Max allowed anchor drift in pixels
    pub deviation_threshold: f32,
    pub started_at: Instant,
    pub elapsed: Duration,
    pub score: u32,
    /// Set when the session reaches `Normal` or `Abnormal`
    pub finished_at: Option<Instant>,
    /// Last seen anchor position, for drawing
    pub current_anchor: (f32, f32),
}

impl MeasurementSession {
    pub fn new(
        user_id: impl Into<String>,
        anchor_joint: KeypointIndex,
        start_anchor: (f32, f32),
        deviation_threshold: f32,
        started_at: Instant,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            anchor_joint,
            start_anchor,
            deviation_threshold,
            started_at,
            elapsed: Duration::ZERO,
            score: 0,
            finished_at: None,
            current_anchor: start_anchor,
        }
    }
}

/// Result handed to the score store when a session closes
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub user_id: String,
    pub score: u32,
    pub elapsed: Duration,
}

impl From<&MeasurementSession> for ScoreRecord {
    fn from(session: &MeasurementSession) -> Self {
        Self {
            user_id: session.user_id.clone(),
            score: session.score,
            elapsed: session.elapsed,
        }
    }
}

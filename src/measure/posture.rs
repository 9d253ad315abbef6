//! Posture criteria evaluated on a single BODY_25 pose.

use crate::config::MeasurerConfig;
use crate::pose::{KeypointIndex, Pose};

const ARM_JOINTS: [KeypointIndex; 3] = [
    KeypointIndex::Neck,
    KeypointIndex::RightWrist,
    KeypointIndex::LeftWrist,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureCriteria {
    pub symmetry_threshold: f32,
    pub ankle_torso_ratio: f32,
    pub deviation_ratio: f32,
}

impl PostureCriteria {
    pub fn from_config(config: &MeasurerConfig) -> Self {
        Self {
            symmetry_threshold: config.symmetry_threshold,
            ankle_torso_ratio: config.ankle_torso_ratio,
            deviation_ratio: config.deviation_ratio,
        }
    }

    /// Arms raised sideways: neck and both wrists at roughly the same height
    pub fn arms_level(&self, pose: &Pose) -> bool {
        lateral_spread(pose) < self.symmetry_threshold
    }

    /// One foot lifted: ankle height gap exceeds a fraction of the torso
    pub fn foot_raised(&self, pose: &Pose) -> bool {
        self.ankle_torso_ratio * torso_length(pose) < ankle_asymmetry(pose)
    }

    /// Start posture for an automatic measurement
    pub fn is_ready_stance(&self, pose: &Pose) -> bool {
        self.arms_level(pose) && self.foot_raised(pose)
    }

    /// Allowed anchor drift, scaled by the nose-to-anchor distance
    pub fn deviation_threshold(&self, pose: &Pose, anchor: (f32, f32)) -> f32 {
        (distance(pose.get(KeypointIndex::Nose).position(), anchor) * self.deviation_ratio).round()
    }
}

impl Default for PostureCriteria {
    fn default() -> Self {
        Self::from_config(&MeasurerConfig::default())
    }
}

/// Population standard deviation of the neck/wrist heights
pub fn lateral_spread(pose: &Pose) -> f32 {
    let ys = ARM_JOINTS.map(|j| pose.get(j).y);
    let mean = ys.iter().sum::<f32>() / ys.len() as f32;
    let variance = ys.iter().map(|y| (y - mean).powi(2)).sum::<f32>() / ys.len() as f32;
    variance.sqrt()
}

pub fn torso_length(pose: &Pose) -> f32 {
    (pose.get(KeypointIndex::Neck).y - pose.get(KeypointIndex::MidHip).y).abs()
}

pub fn ankle_asymmetry(pose: &Pose) -> f32 {
    (pose.get(KeypointIndex::LeftAnkle).y - pose.get(KeypointIndex::RightAnkle).y).abs()
}

/// The standing leg's ankle: the lower one on screen (larger y). Ties go
/// to the left ankle.
pub fn standing_ankle(pose: &Pose) -> KeypointIndex {
    if pose.get(KeypointIndex::RightAnkle).y > pose.get(KeypointIndex::LeftAnkle).y {
        KeypointIndex::RightAnkle
    } else {
        KeypointIndex::LeftAnkle
    }
}

pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

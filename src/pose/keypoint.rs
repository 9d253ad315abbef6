/// BODY_25 keypoint indices (OpenPose output order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    Neck = 1,
    RightShoulder = 2,
    RightElbow = 3,
    RightWrist = 4,
    LeftShoulder = 5,
    LeftElbow = 6,
    LeftWrist = 7,
    MidHip = 8,
    RightHip = 9,
    RightKnee = 10,
    RightAnkle = 11,
    LeftHip = 12,
    LeftKnee = 13,
    LeftAnkle = 14,
    RightEye = 15,
    LeftEye = 16,
    RightEar = 17,
    LeftEar = 18,
    LeftBigToe = 19,
    LeftSmallToe = 20,
    LeftHeel = 21,
    RightBigToe = 22,
    RightSmallToe = 23,
    RightHeel = 24,
}

impl KeypointIndex {
    pub const COUNT: usize = 25;

    pub const ALL: [KeypointIndex; Self::COUNT] = [
        Self::Nose,
        Self::Neck,
        Self::RightShoulder,
        Self::RightElbow,
        Self::RightWrist,
        Self::LeftShoulder,
        Self::LeftElbow,
        Self::LeftWrist,
        Self::MidHip,
        Self::RightHip,
        Self::RightKnee,
        Self::RightAnkle,
        Self::LeftHip,
        Self::LeftKnee,
        Self::LeftAnkle,
        Self::RightEye,
        Self::LeftEye,
        Self::RightEar,
        Self::LeftEar,
        Self::LeftBigToe,
        Self::LeftSmallToe,
        Self::LeftHeel,
        Self::RightBigToe,
        Self::RightSmallToe,
        Self::RightHeel,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nose => "Nose",
            Self::Neck => "Neck",
            Self::RightShoulder => "RShoulder",
            Self::RightElbow => "RElbow",
            Self::RightWrist => "RWrist",
            Self::LeftShoulder => "LShoulder",
            Self::LeftElbow => "LElbow",
            Self::LeftWrist => "LWrist",
            Self::MidHip => "MidHip",
            Self::RightHip => "RHip",
            Self::RightKnee => "RKnee",
            Self::RightAnkle => "RAnkle",
            Self::LeftHip => "LHip",
            Self::LeftKnee => "LKnee",
            Self::LeftAnkle => "LAnkle",
            Self::RightEye => "REye",
            Self::LeftEye => "LEye",
            Self::RightEar => "REar",
            Self::LeftEar => "LEar",
            Self::LeftBigToe => "LBigToe",
            Self::LeftSmallToe => "LSmallToe",
            Self::LeftHeel => "LHeel",
            Self::RightBigToe => "RBigToe",
            Self::RightSmallToe => "RSmallToe",
            Self::RightHeel => "RHeel",
        }
    }
}

/// Single joint in image pixel coordinates (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Rounded pixel position for drawing
    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// One detected person: 25 BODY_25 joints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    pub fn set(&mut self, index: KeypointIndex, keypoint: Keypoint) {
        self.keypoints[index as usize] = keypoint;
    }

    /// Bounding box `(x, y, w, h)` of joints above `threshold`, or `None`
    /// when nothing qualifies.
    pub fn bounding_box(&self, threshold: f32) -> Option<(f32, f32, f32, f32)> {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;

        for kp in self.keypoints.iter().filter(|k| k.is_valid(threshold)) {
            min_x = min_x.min(kp.x);
            max_x = max_x.max(kp.x);
            min_y = min_y.min(kp.y);
            max_y = max_y.max(kp.y);
        }

        if max_x >= min_x && max_y >= min_y {
            Some((min_x, min_y, max_x - min_x, max_y - min_y))
        } else {
            None
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_index_count() {
        assert_eq!(KeypointIndex::COUNT, 25);
    }

    #[test]
    fn test_keypoint_index_from_index() {
        assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
        assert_eq!(KeypointIndex::from_index(14), Some(KeypointIndex::LeftAnkle));
        assert_eq!(KeypointIndex::from_index(24), Some(KeypointIndex::RightHeel));
        assert_eq!(KeypointIndex::from_index(25), None);
    }

    #[test]
    fn test_keypoint_index_roundtrip_order() {
        for i in 0..KeypointIndex::COUNT {
            assert_eq!(KeypointIndex::from_index(i).map(|k| k as usize), Some(i));
        }
    }

    #[test]
    fn test_keypoint_is_valid() {
        let kp = Keypoint::new(10.0, 20.0, 0.7);
        assert!(kp.is_valid(0.5));
        assert!(!kp.is_valid(0.7));
    }

    #[test]
    fn test_keypoint_to_pixel_rounds() {
        let kp = Keypoint::new(10.6, 20.4, 1.0);
        assert_eq!(kp.to_pixel(), (11, 20));
    }

    #[test]
    fn test_pose_get_set() {
        let mut pose = Pose::default();
        pose.set(KeypointIndex::Nose, Keypoint::new(320.0, 80.0, 0.9));
        let nose = pose.get(KeypointIndex::Nose);
        assert_eq!(nose.x, 320.0);
        assert_eq!(nose.y, 80.0);
        assert_eq!(nose.confidence, 0.9);
    }

    #[test]
    fn test_pose_bounding_box() {
        let mut pose = Pose::default();
        pose.set(KeypointIndex::Nose, Keypoint::new(100.0, 50.0, 0.9));
        pose.set(KeypointIndex::LeftAnkle, Keypoint::new(140.0, 450.0, 0.8));
        let (x, y, w, h) = pose.bounding_box(0.1).unwrap();
        assert_eq!((x, y, w, h), (100.0, 50.0, 40.0, 400.0));
    }

    #[test]
    fn test_pose_bounding_box_empty() {
        assert!(Pose::default().bounding_box(0.1).is_none());
    }
}

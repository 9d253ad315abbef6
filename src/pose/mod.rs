pub mod client;
pub mod keypoint;

pub use client::{parse_response, EstimationClient, HttpEstimationClient};
pub use keypoint::{Keypoint, KeypointIndex, Pose};

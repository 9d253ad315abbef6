//! Client side of the external pose-estimation service.
//!
//! The service takes one encoded image as a multipart field named `frame`
//! and answers `{"code": 0|1, "keypoints": [[[x, y, confidence], ...], ...]}`.

use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::keypoint::{Keypoint, KeypointIndex, Pose};
use crate::error::EstimateError;

/// Anything that can turn an encoded frame into zero or one person
pub trait EstimationClient: Send + Sync {
    fn estimate(&self, frame: &[u8]) -> Result<Option<Pose>, EstimateError>;
}

#[derive(Debug, Deserialize)]
struct EstimationResponse {
    code: i64,
    #[serde(default)]
    keypoints: Value,
}

/// Decode a service response body.
///
/// `code != 0`, an empty list, or a non-list `keypoints` (the service
/// sometimes sends a bare scalar) all mean nobody was detected. Only the
/// first person is used.
pub fn parse_response(body: &[u8]) -> Result<Option<Pose>, EstimateError> {
    let response: EstimationResponse =
        serde_json::from_slice(body).map_err(|e| EstimateError::Malformed(e.to_string()))?;

    if response.code != 0 {
        return Ok(None);
    }

    let people = match response.keypoints.as_array() {
        Some(people) if !people.is_empty() => people,
        _ => return Ok(None),
    };

    let joints = people[0]
        .as_array()
        .ok_or_else(|| EstimateError::Malformed("person is not a list".into()))?;
    if joints.len() < KeypointIndex::COUNT {
        return Err(EstimateError::Malformed(format!(
            "expected {} joints, got {}",
            KeypointIndex::COUNT,
            joints.len()
        )));
    }

    let mut pose = Pose::default();
    for (i, joint) in joints.iter().take(KeypointIndex::COUNT).enumerate() {
        let triple = joint
            .as_array()
            .filter(|t| t.len() >= 3)
            .ok_or_else(|| EstimateError::Malformed(format!("joint {i} is not [x, y, c]")))?;
        let mut values = [0.0f32; 3];
        for (slot, v) in values.iter_mut().zip(triple) {
            *slot = v
                .as_f64()
                .ok_or_else(|| {
                    EstimateError::Malformed(format!("joint {i} has a non-numeric value"))
                })?
                as f32;
        }
        pose.keypoints[i] = Keypoint::new(values[0], values[1], values[2]);
    }

    Ok(Some(pose))
}

/// HTTP implementation backed by a blocking reqwest client
pub struct HttpEstimationClient {
    client: Client,
    url: String,
}

impl HttpEstimationClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EstimateError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EstimationClient for HttpEstimationClient {
    fn estimate(&self, frame: &[u8]) -> Result<Option<Pose>, EstimateError> {
        let part = multipart::Part::bytes(frame.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = multipart::Form::new().part("frame", part);

        let response = self.client.post(&self.url).multipart(form).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(EstimateError::Status(status.as_u16()));
        }
        let body = response.bytes()?;
        parse_response(&body)
    }
}

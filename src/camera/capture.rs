use anyhow::{bail, Context, Result};
use opencv::{
    core::{self, Mat, Vector},
    imgcodecs,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::CameraConfig;
use crate::controller::FrameSink;
use crate::pipeline::FrameSample;

/// Consecutive failed reads before the device counts as lost
const MAX_READ_FAILURES: u32 = 50;

/// Latest rotated BGR frame, shared with the display
pub type LatestFrame = Arc<Mutex<Option<Mat>>>;

/// OpenCV camera feeding JPEG frames to the pipeline
pub struct CameraSource {
    capture: VideoCapture,
    index: i32,
    rotation: Option<i32>,
    jpeg_quality: i32,
    interval: Duration,
    latest: LatestFrame,
}

impl CameraSource {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let mut capture = VideoCapture::new(config.index, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("failed to open camera {}", config.index))?;
        if !capture.is_opened()? {
            bail!("camera {} is not available", config.index);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
        capture.set(videoio::CAP_PROP_FPS, config.framerate as f64)?;
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        info!(
            "camera {} opened: {}x{} @ {} fps (requested {}x{} @ {})",
            config.index,
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)?,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?,
            capture.get(videoio::CAP_PROP_FPS)?,
            config.width,
            config.height,
            config.framerate
        );

        Ok(Self {
            capture,
            index: config.index,
            rotation: rotate_code(config.rotation),
            jpeg_quality: config.jpeg_quality,
            interval: config.frame_interval(),
            latest: Arc::new(Mutex::new(None)),
        })
    }

    pub fn latest(&self) -> LatestFrame {
        Arc::clone(&self.latest)
    }

    /// Capture until the pipeline stops. Losing the device is an error.
    pub fn run(mut self, sink: FrameSink) -> Result<()> {
        let mut failures = 0u32;

        while !sink.is_stopped() {
            let started = Instant::now();
            if !self.capture.is_opened()? {
                bail!("camera {} was closed", self.index);
            }

            let mut raw = Mat::default();
            match self.capture.read(&mut raw) {
                Ok(true) if !raw.empty() => {
                    failures = 0;
                    let timestamp = Instant::now();
                    let frame = self.rotate(raw)?;
                    let jpeg = jpeg_encode(&frame, self.jpeg_quality)?;
                    sink.put(FrameSample::new(timestamp, jpeg));
                    *self.latest.lock() = Some(frame);
                }
                Ok(_) => failures += 1,
                Err(e) => {
                    failures += 1;
                    warn!("camera {} read error: {}", self.index, e);
                }
            }
            if failures >= MAX_READ_FAILURES {
                bail!("camera {} stopped delivering frames", self.index);
            }

            let spent = started.elapsed();
            if spent < self.interval {
                thread::sleep(self.interval - spent);
            }
        }
        Ok(())
    }

    fn rotate(&self, frame: Mat) -> Result<Mat> {
        let Some(code) = self.rotation else {
            return Ok(frame);
        };
        let mut rotated = Mat::default();
        core::rotate(&frame, &mut rotated, code)?;
        Ok(rotated)
    }
}

fn rotate_code(degrees: u32) -> Option<i32> {
    match degrees % 360 {
        90 => Some(core::ROTATE_90_CLOCKWISE),
        180 => Some(core::ROTATE_180),
        270 => Some(core::ROTATE_90_COUNTERCLOCKWISE),
        _ => None,
    }
}

pub fn jpeg_encode(frame: &Mat, quality: i32) -> Result<Vec<u8>> {
    let params = Vector::from_iter([imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
    let mut buf: Vector<u8> = Vector::new();
    imgcodecs::imencode(".jpg", frame, &mut buf, &params)?;
    Ok(buf.to_vec())
}

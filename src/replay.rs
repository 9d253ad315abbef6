//! Headless frame source: a directory of JPEG files played back at the
//! camera rate.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::{CameraConfig, ReplayConfig};
use crate::controller::FrameSink;
use crate::pipeline::FrameSample;

pub struct ReplaySource {
    frames: Vec<Bytes>,
    interval: Duration,
    loop_frames: bool,
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

impl ReplaySource {
    pub fn open(replay: &ReplayConfig, camera: &CameraConfig) -> Result<Self> {
        let Some(dir) = replay.frames_dir.as_ref() else {
            bail!("replay.frames_dir is not set");
        };
        let source = Self::from_dir(dir, camera.frame_interval(), replay.loop_frames)?;

        let first = Self::list(dir)?.into_iter().next();
        if let Some(first) = first {
            match image::image_dimensions(&first) {
                Ok(dims) if dims != camera.resolution() => warn!(
                    "replay frames are {}x{} but the overlays are {}x{}",
                    dims.0,
                    dims.1,
                    camera.resolution().0,
                    camera.resolution().1
                ),
                Ok(_) => {}
                Err(e) => warn!("could not read {}: {}", first.display(), e),
            }
        }
        Ok(source)
    }

    fn list(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_jpeg(p))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load every `*.jpg`/`*.jpeg` in `dir`, in file-name order
    pub fn from_dir(dir: &Path, interval: Duration, loop_frames: bool) -> Result<Self> {
        let frames = Self::list(dir)?
            .iter()
            .map(|p| {
                fs::read(p)
                    .map(Bytes::from)
                    .with_context(|| format!("failed to read {}", p.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        if frames.is_empty() {
            bail!("no JPEG frames in {}", dir.display());
        }
        info!("replaying {} frames from {}", frames.len(), dir.display());
        Ok(Self {
            frames,
            interval,
            loop_frames,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Post frames until stopped, or until the files run out when not looping
    pub fn run(self, sink: FrameSink) -> Result<()> {
        let mut posted = 0usize;
        for frame in self.frames.iter().cycle() {
            if sink.is_stopped() {
                break;
            }
            if !self.loop_frames && posted == self.frames.len() {
                info!("replay finished after {} frames", posted);
                break;
            }
            let started = Instant::now();
            sink.put(FrameSample::new(started, frame.clone()));
            posted += 1;

            let spent = started.elapsed();
            if spent < self.interval {
                thread::sleep(self.interval - spent);
            }
        }
        Ok(())
    }
}

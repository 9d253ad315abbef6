use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub estimation: EstimationConfig,
    #[serde(default)]
    pub measurer: MeasurerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Clockwise rotation in degrees (0, 90, 180, 270)
    #[serde(default)]
    pub rotation: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EstimationConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Number of request workers; the only throughput knob
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MeasurerConfig {
    /// Standing time that counts as a full (100) score
    #[serde(default = "default_normal_secs")]
    pub normal_secs: f64,
    #[serde(default = "default_score_popup_timeout")]
    pub score_popup_timeout_secs: f64,
    /// Posture must hold this long before a measurement starts on its own
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: f64,
    /// Max std-dev of neck/wrist heights for "arms raised sideways"
    #[serde(default = "default_symmetry_threshold")]
    pub symmetry_threshold: f32,
    #[serde(default = "default_ankle_torso_ratio")]
    pub ankle_torso_ratio: f32,
    #[serde(default = "default_deviation_ratio")]
    pub deviation_ratio: f32,
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_module_type")]
    pub module_type: String,
    #[serde(default = "default_database_timeout")]
    pub timeout_secs: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Grace period between a start request and the actual start
    #[serde(default = "default_start_delay")]
    pub start_delay_secs: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    /// TTF used for overlay text; text is skipped when it cannot be loaded
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Draw the deviation circle and anchor marker while measuring
    #[serde(default = "default_true")]
    pub debug_anchor: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub loop_frames: bool,
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_framerate() -> u32 { 24 }
fn default_jpeg_quality() -> i32 { 80 }
fn default_server_url() -> String { "http://127.0.0.1:8000/skeleton".to_string() }
fn default_workers() -> usize { 4 }
fn default_request_timeout() -> f64 { 1.0 }
fn default_normal_secs() -> f64 { 25.0 }
fn default_score_popup_timeout() -> f64 { 5.0 }
fn default_debounce_secs() -> f64 { 0.7 }
fn default_symmetry_threshold() -> f32 { 20.0 }
fn default_ankle_torso_ratio() -> f32 { 0.2 }
fn default_deviation_ratio() -> f32 { 0.05 }
fn default_database_url() -> String { "http://127.0.0.1:8080".to_string() }
fn default_module_type() -> String { "balance".to_string() }
fn default_database_timeout() -> f64 { 5.0 }
fn default_listen_addr() -> String { "0.0.0.0:5000".to_string() }
fn default_start_delay() -> f64 { 5.0 }
fn default_confidence_threshold() -> f32 { 0.05 }
fn default_true() -> bool { true }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_width(),
            height: default_height(),
            framerate: default_framerate(),
            rotation: 0,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl CameraConfig {
    /// Pacing budget for every periodic loop tied to the camera
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate.max(1) as f64)
    }

    /// Output resolution after rotation
    pub fn resolution(&self) -> (u32, u32) {
        match self.rotation % 360 {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    /// Margin between overlay text and the plate border
    pub fn border_margin(&self) -> i32 {
        let (w, h) = self.resolution();
        (w.max(h) as f32 * 0.025).round() as i32
    }
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            workers: default_workers(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl EstimationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }
}

impl Default for MeasurerConfig {
    fn default() -> Self {
        Self {
            normal_secs: default_normal_secs(),
            score_popup_timeout_secs: default_score_popup_timeout(),
            debounce_secs: default_debounce_secs(),
            symmetry_threshold: default_symmetry_threshold(),
            ankle_torso_ratio: default_ankle_torso_ratio(),
            deviation_ratio: default_deviation_ratio(),
            auto_start: true,
        }
    }
}

impl MeasurerConfig {
    pub fn normal(&self) -> Duration {
        Duration::from_secs_f64(self.normal_secs)
    }

    pub fn score_popup_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.score_popup_timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f64(self.debounce_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            module_type: default_module_type(),
            timeout_secs: default_database_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            start_delay_secs: default_start_delay(),
        }
    }
}

impl ControlConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_secs_f64(self.start_delay_secs)
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            confidence_threshold: default_confidence_threshold(),
            debug_anchor: true,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frames_dir: None,
            loop_frames: true,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the `Duration` accessors and the worker pool cannot use
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("estimation.request_timeout_secs", self.estimation.request_timeout_secs),
            ("measurer.normal_secs", self.measurer.normal_secs),
            ("measurer.score_popup_timeout_secs", self.measurer.score_popup_timeout_secs),
            ("measurer.debounce_secs", self.measurer.debounce_secs),
            ("database.timeout_secs", self.database.timeout_secs),
            ("control.start_delay_secs", self.control.start_delay_secs),
        ];
        for (key, secs) in durations {
            if !secs.is_finite() || secs < 0.0 {
                bail!("{key} must be a finite, non-negative number of seconds (got {secs})");
            }
        }
        ensure!(self.measurer.normal_secs > 0.0, "measurer.normal_secs must be greater than zero");
        ensure!(self.estimation.workers > 0, "estimation.workers must be at least 1");
        ensure!(self.camera.framerate > 0, "camera.framerate must be at least 1");
        Ok(())
    }

    /// Like `load`, but any failure falls back to defaults with a warning
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }
}

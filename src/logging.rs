use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR: &str = "logs";

/// `logs/balance_%Y%m%d_%H%M%S.log` under `dir`
pub fn log_file_path(dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    dir.join(format!("balance_{}.log", now.format("%Y%m%d_%H%M%S")))
}

fn open_log_file(dir: &Path) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = log_file_path(dir, chrono::Local::now());
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok((file, path))
}

/// Log to stderr and to a fresh timestamped file. `RUST_LOG` overrides
/// the default `info` level. Returns the log file path.
pub fn init() -> Result<PathBuf> {
    let (file, path) = open_log_file(Path::new(LOG_DIR))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(path)
}

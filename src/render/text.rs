use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::Path;
use tracing::{info, warn};

use crate::config::OverlayConfig;

pub const SHADOW: Rgba<u8> = Rgba([0, 0, 0, 255]);
const SHADOW_OFFSET: i32 = 2;

/// Default label height in pixels
pub const LABEL_SCALE: f32 = 28.0;
/// Height of the final score banner
pub const BANNER_SCALE: f32 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// Top-left corner for text of `size` so that it sits horizontally as
/// `alignment` says and is vertically centred on `position`.
pub fn aligned_origin(position: (i32, i32), size: (u32, u32), alignment: Alignment) -> (i32, i32) {
    let (w, h) = (size.0 as i32, size.1 as i32);
    let x = match alignment {
        Alignment::Left => position.0,
        Alignment::Center => position.0 - w / 2,
        Alignment::Right => position.0 - w,
    };
    (x, position.1 - h / 2)
}

/// Overlay text drawing. Without a usable font every call is a no-op.
pub struct TextRenderer {
    font: Option<FontVec>,
}

impl TextRenderer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .with_context(|| format!("invalid font {}", path.display()))?;
        Ok(Self { font: Some(font) })
    }

    pub fn disabled() -> Self {
        Self { font: None }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        let Some(path) = config.font_path.as_ref() else {
            warn!("no overlay font configured; text overlay disabled");
            return Self::disabled();
        };
        match Self::load(path) {
            Ok(renderer) => {
                info!("overlay font: {}", path.display());
                renderer
            }
            Err(e) => {
                warn!("{:#}; text overlay disabled", e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `text` with a 2 px black drop shadow. Returns whether anything
    /// was drawn.
    pub fn put_text(
        &self,
        image: &mut RgbaImage,
        text: &str,
        position: (i32, i32),
        color: Rgba<u8>,
        alignment: Alignment,
        scale: f32,
    ) -> bool {
        let Some(font) = self.font.as_ref() else {
            return false;
        };
        let scale = PxScale::from(scale);
        let size = text_size(scale, font, text);
        let (x, y) = aligned_origin(position, size, alignment);

        draw_text_mut(image, SHADOW, x + SHADOW_OFFSET, y + SHADOW_OFFSET, scale, font, text);
        draw_text_mut(image, color, x, y, scale, font, text);
        true
    }
}

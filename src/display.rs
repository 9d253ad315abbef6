use anyhow::{Context, Result};
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;

use crate::render::OverlayPlate;

/// Keyboard requests from the station window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    Quit,
    Reset,
    Snapshot,
}

/// minifb window compositing the overlays onto the live camera frame
pub struct Compositor {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl Compositor {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )
        .context("failed to open display window")?;

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// Copy a BGR frame into the back buffer, cropping or padding as needed
    pub fn draw_frame(&mut self, frame: &Mat) -> Result<()> {
        let rows = (frame.rows() as usize).min(self.height);
        let cols = (frame.cols() as usize).min(self.width);
        for y in 0..rows {
            for x in 0..cols {
                let px = frame.at_2d::<Vec3b>(y as i32, x as i32)?;
                self.buffer[y * self.width + x] = pack(px[2], px[1], px[0]);
            }
        }
        Ok(())
    }

    /// Alpha-blend an overlay plate over what is already in the buffer
    pub fn blend(&mut self, plate: &OverlayPlate) {
        let rows = (plate.height() as usize).min(self.height);
        let cols = (plate.width() as usize).min(self.width);
        for y in 0..rows {
            for x in 0..cols {
                let [r, g, b, a] = plate.image().get_pixel(x as u32, y as u32).0;
                if a == 0 {
                    continue;
                }
                let dst = &mut self.buffer[y * self.width + x];
                *dst = if a == 255 { pack(r, g, b) } else { mix(*dst, r, g, b, a) };
            }
        }
    }

    /// Current buffer as RGB bytes
    pub fn rgb_bytes(&self) -> Vec<u8> {
        self.buffer
            .iter()
            .flat_map(|p| [(p >> 16) as u8, (p >> 8) as u8, *p as u8])
            .collect()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn present(&mut self) -> Result<Vec<DisplayAction>> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .context("failed to update display window")?;

        let mut actions = Vec::new();
        if !self.window.is_open() || self.window.is_key_down(Key::Escape) {
            actions.push(DisplayAction::Quit);
        }
        if self.window.is_key_pressed(Key::R, KeyRepeat::No) {
            actions.push(DisplayAction::Reset);
        }
        if self.window.is_key_pressed(Key::S, KeyRepeat::No) {
            actions.push(DisplayAction::Snapshot);
        }
        Ok(actions)
    }
}

fn pack(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

fn mix(dst: u32, r: u8, g: u8, b: u8, a: u8) -> u32 {
    let a = a as u32;
    let blend = |src: u8, shift: u32| {
        ((src as u32 * a + ((dst >> shift) & 0xFF) * (255 - a)) / 255) & 0xFF
    };
    (blend(r, 16) << 16) | (blend(g, 8) << 8) | blend(b, 0)
}

//! Text/graphics plate describing the measurer state.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

use super::text::{Alignment, TextRenderer, BANNER_SCALE, LABEL_SCALE};
use crate::measure::{MeasurementSession, Mode};

pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

const ANCHOR_DOT_RADIUS: i32 = 10;

pub struct Hud {
    text: TextRenderer,
    margin: i32,
    debug_anchor: bool,
}

impl Hud {
    pub fn new(text: TextRenderer, margin: i32, debug_anchor: bool) -> Self {
        Self {
            text,
            margin,
            debug_anchor,
        }
    }

    /// Draw the plate for `mode` onto a cleared image
    pub fn draw(&self, image: &mut RgbaImage, mode: Mode, session: Option<&MeasurementSession>) {
        let (w, h) = (image.width() as i32, image.height() as i32);
        let m = self.margin;

        self.text
            .put_text(image, mode.name(), (m, m), GREEN, Alignment::Left, LABEL_SCALE);

        let Some(session) = session else {
            return;
        };

        match mode {
            Mode::Measuring => {
                let elapsed = session.elapsed.as_secs_f64();
                let label = format!("{:.1} s / id: {}", elapsed, session.user_id);
                self.text
                    .put_text(image, &label, (m, h - m), WHITE, Alignment::Left, LABEL_SCALE);
                let score = format!("score: {}", session.score);
                self.text
                    .put_text(image, &score, (w - m, h - m), WHITE, Alignment::Right, LABEL_SCALE);

                if self.debug_anchor {
                    self.draw_anchor(image, session);
                }
            }
            Mode::Normal | Mode::Abnormal => {
                let banner = format!("SCORE: {}", session.score);
                self.text
                    .put_text(image, &banner, (w / 2, h / 2), RED, Alignment::Center, BANNER_SCALE);
            }
            Mode::Idle | Mode::NotDetected => {}
        }
    }

    fn draw_anchor(&self, image: &mut RgbaImage, session: &MeasurementSession) {
        let start = (session.start_anchor.0.round() as i32, session.start_anchor.1.round() as i32);
        let radius = session.deviation_threshold as i32;
        if radius > 0 {
            // 2 px ring
            draw_hollow_circle_mut(image, start, radius, GREEN);
            draw_hollow_circle_mut(image, start, radius + 1, GREEN);
        }

        let (x, y) = (
            session.current_anchor.0.round() as i32,
            session.current_anchor.1.round() as i32,
        );
        draw_filled_circle_mut(image, (x, y), ANCHOR_DOT_RADIUS, RED);
        self.text
            .put_text(image, "anchor", (x + self.margin, y), RED, Alignment::Left, LABEL_SCALE);
    }
}

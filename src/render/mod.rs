pub mod double_buffer;
pub mod hud;
pub mod plate;
pub mod skeleton;
pub mod text;

pub use double_buffer::{OverlayDoubleBuffer, OverlayWriter};
pub use hud::Hud;
pub use plate::{fill_alpha_channel, OverlayPlate};
pub use skeleton::{draw_skeleton, SKELETON_CONNECTIONS};
pub use text::{Alignment, TextRenderer};

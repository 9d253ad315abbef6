pub mod capture;

pub use capture::{jpeg_encode, CameraSource, LatestFrame};

#[cfg(feature = "desktop")]
pub mod camera;
pub mod config;
pub mod control;
pub mod controller;
#[cfg(feature = "desktop")]
pub mod display;
pub mod error;
pub mod logging;
pub mod measure;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod replay;
pub mod store;

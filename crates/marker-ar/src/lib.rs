//! Single-marker augmented reality demo.
//!
//! Captures frames from a camera, detects one printed square marker per
//! frame, recovers its 6-DOF pose and draws a textured mesh anchored to the
//! marker over the live image, with an interactive tuning surface for the
//! detector and a HUD.
//!
//! The binary lives in `src/bin/marker_ar.rs`; everything behavioural is in
//! this library so the tracking loop, input dispatch, HUD and renderer can
//! be exercised without a window or a camera.

pub mod app;
pub mod camera_source;
pub mod capture;
pub mod font;
pub mod hud;
pub mod input;
pub mod render;
pub mod source;
pub mod tracker;

pub use marker_ar_core as core;
pub use marker_ar_detect as detect;
pub use marker_ar_pose as pose;

/// Physical marker edge length, in the units of the camera calibration
/// (usually millimetres).
pub const MARKER_EDGE_LEN: f64 = 80.0;
/// Near clip distance for the AR projection.
pub const VIEW_DISTANCE_MIN: f64 = 40.0;
/// Far clip distance for the AR projection.
pub const VIEW_DISTANCE_MAX: f64 = 10000.0;
/// Scale applied to tracker units before drawing.
pub const VIEW_SCALE_FACTOR: f64 = 1.0;
/// Mesh rotation rate, degrees per second.
pub const ROTATE_RATE_DEG_PER_S: f32 = 45.0;
/// Minimum interval between accepted loop ticks, milliseconds.
pub const TICK_INTERVAL_MS: u64 = 10;
/// JPEG quality for captured frames.
pub const CAPTURE_JPEG_QUALITY: u8 = 75;

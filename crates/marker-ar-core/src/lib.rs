//! Core types and utilities for the single-marker AR demo.
//!
//! This crate is intentionally small and free of windowing or camera-device
//! concerns. It holds the pieces every other crate needs: image views and
//! sampling, planar homographies, the camera intrinsics model (including the
//! binary parameter-file format and the GL-style projection/view matrices
//! derived from it), and the triangle mesh loaded for overlay drawing.

mod camera;
mod homography;
mod image;
mod logger;
mod mesh;

pub use camera::{view_rh, CameraParamError, CameraParams, DIST_ITERATIONS};
pub use homography::{homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_rgb, sample_bilinear_u8, FrameView, GrayImage, GrayImageView,
    PixelFormat,
};
pub use logger::{init_from_env, init_with_level};
pub use mesh::{MeshError, TriangleMesh};

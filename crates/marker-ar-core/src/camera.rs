use std::fs;
use std::path::Path;

use nalgebra::{Matrix4, Point2};
use thiserror::Error;

/// Fixed-point iterations used to invert the radial distortion model.
pub const DIST_ITERATIONS: usize = 3;

/// Errors from loading or validating a camera parameter file.
#[derive(Error, Debug)]
pub enum CameraParamError {
    #[error("unable to read camera parameter file: {0}")]
    Io(#[from] std::io::Error),

    #[error("camera parameter file has {got} bytes, expected {expected}")]
    BadLength { got: usize, expected: usize },

    #[error("camera parameter file declares invalid image size {width}x{height}")]
    BadSize { width: i32, height: i32 },
}

/// Camera intrinsics with the classic 4-factor radial distortion model.
///
/// `mat` is the row-major 3x4 projection; pixels have their origin at the
/// top-left corner with y growing downwards, camera coordinates are x right,
/// y down, z forward. `dist` is `[x0, y0, f, s]`: distortion centre, radial
/// factor (scaled by 1e-8) and overall scale.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraParams {
    pub xsize: u32,
    pub ysize: u32,
    pub mat: [[f64; 4]; 3],
    pub dist: [f64; 4],
}

/// Binary layout: big-endian i32 xsize, ysize, then 12 f64 (row-major 3x4
/// projection), then 4 f64 distortion factors.
const FILE_LEN: usize = 2 * 4 + 12 * 8 + 4 * 8;

impl CameraParams {
    /// Load from the binary parameter file format.
    pub fn load(path: &Path) -> Result<Self, CameraParamError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CameraParamError> {
        if bytes.len() != FILE_LEN {
            return Err(CameraParamError::BadLength {
                got: bytes.len(),
                expected: FILE_LEN,
            });
        }

        let read_i32 = |off: usize| i32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());
        let read_f64 = |off: usize| f64::from_be_bytes(bytes[off..off + 8].try_into().unwrap());

        let xsize = read_i32(0);
        let ysize = read_i32(4);
        if xsize <= 0 || ysize <= 0 {
            return Err(CameraParamError::BadSize {
                width: xsize,
                height: ysize,
            });
        }

        let mut mat = [[0.0f64; 4]; 3];
        let mut off = 8;
        for row in &mut mat {
            for v in row.iter_mut() {
                *v = read_f64(off);
                off += 8;
            }
        }

        let mut dist = [0.0f64; 4];
        for v in &mut dist {
            *v = read_f64(off);
            off += 8;
        }

        Ok(Self {
            xsize: xsize as u32,
            ysize: ysize as u32,
            mat,
            dist,
        })
    }

    /// Rescale the intrinsics to a different image size.
    ///
    /// The projection rows and the distortion centre scale linearly with the
    /// size ratio; the radial factor scales with its inverse square.
    pub fn resized(&self, xsize: u32, ysize: u32) -> Self {
        let scale = xsize as f64 / self.xsize as f64;
        let mut out = self.clone();
        out.xsize = xsize;
        out.ysize = ysize;
        for col in 0..4 {
            out.mat[0][col] = self.mat[0][col] * scale;
            out.mat[1][col] = self.mat[1][col] * scale;
        }
        out.dist[0] = self.dist[0] * scale;
        out.dist[1] = self.dist[1] * scale;
        out.dist[2] = self.dist[2] / (scale * scale);
        out
    }

    /// Map an ideal (undistorted) pixel position to the observed one.
    pub fn ideal_to_observed(&self, ideal: Point2<f64>) -> Point2<f64> {
        let [x0, y0, f, s] = self.dist;
        let x = (ideal.x - x0) * s;
        let y = (ideal.y - y0) * s;
        if x == 0.0 && y == 0.0 {
            return Point2::new(x0, y0);
        }
        let d = 1.0 - f * 1e-8 * (x * x + y * y);
        Point2::new(x * d + x0, y * d + y0)
    }

    /// Map an observed pixel position to the ideal (undistorted) one by
    /// fixed-point iteration of the radial model.
    pub fn observed_to_ideal(&self, observed: Point2<f64>) -> Point2<f64> {
        let [x0, y0, f, s] = self.dist;
        let px = observed.x - x0;
        let py = observed.y - y0;
        let mut x = px;
        let mut y = py;
        for _ in 0..DIST_ITERATIONS {
            let d = 1.0 - f * 1e-8 * (x * x + y * y);
            if d == 0.0 {
                break;
            }
            x = px / d;
            y = py / d;
        }
        Point2::new(x / s + x0, y / s + y0)
    }

    /// Project a camera-space point (x right, y down, z forward, z > 0)
    /// through the linear part of the intrinsics to ideal pixels.
    pub fn project_ideal(&self, x: f64, y: f64, z: f64) -> Point2<f64> {
        let m = &self.mat;
        let u = m[0][0] * x + m[0][1] * y + m[0][2] * z + m[0][3];
        let v = m[1][0] * x + m[1][1] * y + m[1][2] * z + m[1][3];
        let w = m[2][0] * x + m[2][1] * y + m[2][2] * z + m[2][3];
        Point2::new(u / w, v / w)
    }

    /// Right-handed GL-style projection matrix for these intrinsics.
    ///
    /// Takes points in GL camera coordinates (x right, y up, looking down
    /// -z); a point that the intrinsics project to pixel (u, v) lands on the
    /// same pixel after this matrix, perspective division and the usual
    /// top-left-origin viewport transform.
    pub fn frustum_rh(&self, near: f64, far: f64) -> Matrix4<f64> {
        let w = self.xsize as f64;
        let h = self.ysize as f64;
        let fx = self.mat[0][0];
        let skew = self.mat[0][1];
        let cx = self.mat[0][2];
        let fy = self.mat[1][1];
        let cy = self.mat[1][2];

        Matrix4::new(
            2.0 * fx / w,
            -2.0 * skew / w,
            1.0 - 2.0 * cx / w,
            0.0,
            0.0,
            2.0 * fy / h,
            2.0 * cy / h - 1.0,
            0.0,
            0.0,
            0.0,
            (far + near) / (near - far),
            2.0 * far * near / (near - far),
            0.0,
            0.0,
            -1.0,
            0.0,
        )
    }
}

/// Convert a marker->camera 3x4 transform into a right-handed GL modelview
/// matrix. Rows two and three change sign (camera y down / z forward versus
/// GL y up / z backward) and the translation is multiplied by `scale`.
pub fn view_rh(trans: &[[f64; 4]; 3], scale: f64) -> Matrix4<f64> {
    Matrix4::new(
        trans[0][0],
        trans[0][1],
        trans[0][2],
        trans[0][3] * scale,
        -trans[1][0],
        -trans[1][1],
        -trans[1][2],
        -trans[1][3] * scale,
        -trans[2][0],
        -trans[2][1],
        -trans[2][2],
        -trans[2][3] * scale,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

//! Pose of a square fiducial marker from its four image corners.
//!
//! The solver undistorts the corners, estimates the marker-plane-to-image
//! homography, decomposes it through the inverse intrinsics and
//! orthonormalises the result onto SO(3). The output is the rigid 3x4
//! marker-to-camera transform plus an RMS reprojection residual in pixels.
//!
//! Marker coordinates: origin at the marker centre, x right, y up, z out of
//! the marker face towards the viewer. Camera coordinates: x right, y down,
//! z forward.

use nalgebra::{Matrix3, Point2, Point3, Vector3};
use thiserror::Error;

use marker_ar_core::CameraParams;

#[derive(Error, Debug)]
pub enum PoseError {
    #[error("degenerate corner configuration")]
    Degenerate,

    #[error("intrinsics are not invertible")]
    SingularIntrinsics,
}

/// Rigid marker-to-camera transform with its reprojection residual.
#[derive(Clone, Copy, Debug)]
pub struct SquarePose {
    /// Row-major `[R | t]`.
    pub transform: [[f64; 4]; 3],
    /// RMS reprojection error over the four corners, pixels.
    pub residual: f64,
}

impl SquarePose {
    pub fn rotation(&self) -> Matrix3<f64> {
        let m = &self.transform;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.transform[0][3], self.transform[1][3], self.transform[2][3])
    }

    /// Apply the transform to a marker-space point.
    pub fn apply(&self, p: Point3<f64>) -> Point3<f64> {
        let m = &self.transform;
        Point3::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3],
        )
    }
}

/// Marker-space corner positions for an edge length, matching the corner
/// order produced by the detector (top-left first, clockwise as seen when
/// the marker is upright).
pub fn marker_corners(edge_len: f64) -> [Point3<f64>; 4] {
    let h = edge_len * 0.5;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Estimate the pose of a square marker with the given physical edge length
/// from its observed (distorted) image corners.
pub fn estimate_square_pose(
    cam: &CameraParams,
    corners: &[Point2<f32>; 4],
    edge_len: f64,
) -> Result<SquarePose, PoseError> {
    // Undistorted corner observations.
    let ideal = corners.map(|c| {
        let p = cam.observed_to_ideal(Point2::new(c.x as f64, c.y as f64));
        Point2::new(p.x as f32, p.y as f32)
    });

    let h = edge_len as f32 * 0.5;
    let plane = [
        Point2::new(-h, h),
        Point2::new(h, h),
        Point2::new(h, -h),
        Point2::new(-h, -h),
    ];
    let homography =
        marker_ar_core::homography_from_4pt(&plane, &ideal).ok_or(PoseError::Degenerate)?;

    let k = Matrix3::new(
        cam.mat[0][0],
        cam.mat[0][1],
        cam.mat[0][2],
        cam.mat[1][0],
        cam.mat[1][1],
        cam.mat[1][2],
        cam.mat[2][0],
        cam.mat[2][1],
        cam.mat[2][2],
    );
    let k_inv = k.try_inverse().ok_or(PoseError::SingularIntrinsics)?;
    let mut m = k_inv * homography.h;

    // The marker must sit in front of the camera.
    if m[(2, 2)] < 0.0 {
        m = -m;
    }

    let c0 = m.column(0).into_owned();
    let c1 = m.column(1).into_owned();
    let c2 = m.column(2).into_owned();

    let scale = (c0.norm() + c1.norm()) * 0.5;
    if scale < 1e-12 {
        return Err(PoseError::Degenerate);
    }

    let r0 = c0 / scale;
    let r1 = c1 / scale;
    let r2 = r0.cross(&r1);
    let raw = Matrix3::from_columns(&[r0, r1, r2]);
    let rotation = project_to_so3(&raw).ok_or(PoseError::Degenerate)?;
    let translation = c2 / scale;

    let mut pose = SquarePose {
        transform: [
            [
                rotation[(0, 0)],
                rotation[(0, 1)],
                rotation[(0, 2)],
                translation[0],
            ],
            [
                rotation[(1, 0)],
                rotation[(1, 1)],
                rotation[(1, 2)],
                translation[1],
            ],
            [
                rotation[(2, 0)],
                rotation[(2, 1)],
                rotation[(2, 2)],
                translation[2],
            ],
        ],
        residual: 0.0,
    };
    pose.residual = reprojection_rms(cam, &pose, corners, edge_len);
    Ok(pose)
}

/// Nearest proper rotation in the Frobenius sense: `R = U V^T` with the
/// determinant sign folded into the last column of `U`.
fn project_to_so3(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u = u;
        u.column_mut(2).neg_mut();
        r = u * v_t;
    }
    Some(r)
}

fn reprojection_rms(
    cam: &CameraParams,
    pose: &SquarePose,
    observed: &[Point2<f32>; 4],
    edge_len: f64,
) -> f64 {
    let mut sum = 0.0f64;
    for (corner, obs) in marker_corners(edge_len).iter().zip(observed.iter()) {
        let p = pose.apply(*corner);
        let ideal = cam.project_ideal(p.x, p.y, p.z);
        let predicted = cam.ideal_to_observed(ideal);
        let dx = predicted.x - obs.x as f64;
        let dy = predicted.y - obs.y as f64;
        sum += dx * dx + dy * dy;
    }
    (sum / 4.0).sqrt()
}

//! Pinhole camera with radial-tangential lens distortion.
//!
//! A camera is described by its [`Intrinsics`] (focal lengths and principal point
//! read from a conventional 3×3 matrix) and a set of [`DistortionCoeffs`].
//! [`CameraModel`] is the seam the projector works against: back-project a pixel
//! to a viewing ray, and project a point in the camera frame to a pixel.

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub mod distortion;
pub mod rad_tan;

pub use distortion::{DistortionCoeffs, UndistortCriteria, DEFAULT_UNDISTORT_ITERATIONS};
pub use rad_tan::RadTanModel;

/// Pinhole intrinsics. Skew is not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Reads `fx` (0,0), `fy` (1,1), `cx` (0,2) and `cy` (1,2); other entries are ignored.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Intrinsics {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Pixel to normalized image coordinates.
    pub fn normalize(&self, pixel: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            (pixel.x - self.cx) / self.fx,
            (pixel.y - self.cy) / self.fy,
        )
    }

    /// Normalized image coordinates to pixel.
    pub fn denormalize(&self, normalized: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.fx * normalized.x + self.cx,
            self.fy * normalized.y + self.cy,
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("Point is at or behind the camera (z = {0})")]
    PointBehindCamera(f64),
    #[error("Projection produced a non-finite pixel")]
    NonFiniteProjection,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
}

/// Trait defining the core functionality for camera models
pub trait CameraModel {
    /// Project a 3D point in the camera frame to pixel coordinates.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Back-project a pixel to its viewing ray, scaled so that `z = 1`.
    ///
    /// Multiplying the ray by a depth gives the 3D point at that distance along
    /// the optical axis.
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError>;

    /// Validate camera parameters
    fn validate_params(&self) -> Result<(), CameraModelError>;

    fn get_intrinsics(&self) -> Intrinsics;

    /// Distortion coefficients in the model's native order.
    fn get_distortion(&self) -> Vec<f64>;
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if !(intrinsics.fx > 0.0 && intrinsics.fx.is_finite())
            || !(intrinsics.fy > 0.0 && intrinsics.fy.is_finite())
        {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}

//! Implements the Radial-Tangential (RadTan) camera model.
//!
//! [`RadTanModel`] pairs pinhole [`Intrinsics`] with [`DistortionCoeffs`] and
//! implements [`CameraModel`] on top of them. Both cameras of a stereo
//! calibration are described by this model.

use crate::camera::{
    validation, CameraModel, CameraModelError, DistortionCoeffs, Intrinsics, UndistortCriteria,
};
use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pinhole camera with 5-coefficient radial-tangential distortion.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Vector2, Vector3};
/// use roi_projector::camera::{CameraModel, DistortionCoeffs, Intrinsics, RadTanModel};
///
/// let intrinsics = Intrinsics { fx: 500.0, fy: 500.0, cx: 320.0, cy: 240.0 };
/// let model = RadTanModel::new(intrinsics, DistortionCoeffs::zero()).unwrap();
///
/// let pixel = model.project(&Vector3::new(0.1, -0.2, 1.0)).unwrap();
/// assert!((pixel - Vector2::new(370.0, 140.0)).norm() < 1e-9);
/// ```
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadTanModel {
    pub intrinsics: Intrinsics,
    pub distortion: DistortionCoeffs,
}

impl RadTanModel {
    /// Creates a model and validates its intrinsics.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`] when `fx` or `fy` is not
    ///   a positive finite number.
    /// * [`CameraModelError::PrincipalPointMustBeFinite`] when `cx` or `cy` is not finite.
    /// * [`CameraModelError::InvalidParams`] when a distortion coefficient is not finite.
    pub fn new(
        intrinsics: Intrinsics,
        distortion: DistortionCoeffs,
    ) -> Result<Self, CameraModelError> {
        let model = RadTanModel {
            intrinsics,
            distortion,
        };
        model.validate_params()?;
        Ok(model)
    }

    /// Creates a model from a 3×3 intrinsic matrix, see [`Intrinsics::from_matrix`].
    pub fn from_matrix(
        k: &Matrix3<f64>,
        distortion: DistortionCoeffs,
    ) -> Result<Self, CameraModelError> {
        Self::new(Intrinsics::from_matrix(k), distortion)
    }

    /// Back-projects a pixel with an explicit undistortion rule.
    ///
    /// The pixel is normalized, undistorted and lifted to `(x, y, 1)`.
    /// [`CameraModel::unproject`] calls this with the default of five passes.
    pub fn unproject_with(
        &self,
        point_2d: &Vector2<f64>,
        criteria: UndistortCriteria,
    ) -> Result<Vector3<f64>, CameraModelError> {
        let distorted = self.intrinsics.normalize(point_2d);
        let ideal = self.distortion.undistort_with(&distorted, criteria);
        if !ideal.x.is_finite() || !ideal.y.is_finite() {
            return Err(CameraModelError::NonFiniteProjection);
        }
        Ok(Vector3::new(ideal.x, ideal.y, 1.0))
    }
}

impl fmt::Debug for RadTanModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadTanModel [fx: {} fy: {} cx: {} cy: {} distortion: {:?}]",
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.distortion.to_array()
        )
    }
}

impl CameraModel for RadTanModel {
    /// Projects a 3D point in the camera frame to pixel coordinates.
    ///
    /// The point is divided by its depth, distorted, then mapped through the
    /// intrinsics. The image extent is not checked, so pixels outside the
    /// sensor are returned as they are.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointBehindCamera`] when `z <= 0` or `z` is NaN.
    /// * [`CameraModelError::NonFiniteProjection`] when the resulting pixel is not finite.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let z = point_3d.z;
        if !(z > 0.0) {
            return Err(CameraModelError::PointBehindCamera(z));
        }

        let ideal = Vector2::new(point_3d.x / z, point_3d.y / z);
        let distorted = self.distortion.distort(&ideal);
        let pixel = self.intrinsics.denormalize(&distorted);

        if !pixel.x.is_finite() || !pixel.y.is_finite() {
            return Err(CameraModelError::NonFiniteProjection);
        }
        Ok(pixel)
    }

    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        self.unproject_with(point_2d, UndistortCriteria::default())
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        if self.distortion.to_array().iter().any(|c| !c.is_finite()) {
            return Err(CameraModelError::InvalidParams(format!(
                "distortion coefficients must be finite, got {:?}",
                self.distortion.to_array()
            )));
        }
        Ok(())
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn get_distortion(&self) -> Vec<f64> {
        self.distortion.to_array().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_model() -> RadTanModel {
        let intrinsics = Intrinsics {
            fx: 461.629,
            fy: 460.152,
            cx: 362.680,
            cy: 246.049,
        };
        let distortion =
            DistortionCoeffs::new(-0.27695497, 0.06712482, 0.00087538, 0.00011556, 0.0);
        RadTanModel::new(intrinsics, distortion).unwrap()
    }

    #[test]
    fn test_radtan_from_matrix() {
        let k = Matrix3::new(
            800.0, 0.0, 640.0, //
            0.0, 810.0, 360.0, //
            0.0, 0.0, 1.0,
        );
        let model = RadTanModel::from_matrix(&k, DistortionCoeffs::zero()).unwrap();
        assert_eq!(model.get_intrinsics().fx, 800.0);
        assert_eq!(model.get_intrinsics().cy, 360.0);
        assert_eq!(model.get_distortion(), vec![0.0; 5]);
    }

    #[test]
    fn test_radtan_rejects_invalid_params() {
        let k = Matrix3::new(
            0.0, 0.0, 640.0, //
            0.0, 810.0, 360.0, //
            0.0, 0.0, 1.0,
        );
        assert_eq!(
            RadTanModel::from_matrix(&k, DistortionCoeffs::zero()).unwrap_err(),
            CameraModelError::FocalLengthMustBePositive
        );

        let intrinsics = sample_model().intrinsics;
        let bad = DistortionCoeffs::new(f64::NAN, 0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            RadTanModel::new(intrinsics, bad),
            Err(CameraModelError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_radtan_project_unproject() {
        let model = sample_model();
        let point_3d = Vector3::new(0.3, -0.15, 1.0);

        let pixel = model.project(&point_3d).unwrap();
        let ray = model.unproject(&pixel).unwrap();

        assert_eq!(ray.z, 1.0);
        assert_relative_eq!(ray.x, point_3d.x, epsilon = 1e-5);
        assert_relative_eq!(ray.y, point_3d.y, epsilon = 1e-5);
    }

    #[test]
    fn test_radtan_project_scales_with_depth() {
        let model = sample_model();
        let near = model.project(&Vector3::new(0.2, 0.1, 1.0)).unwrap();
        let far = model.project(&Vector3::new(2.0, 1.0, 10.0)).unwrap();
        assert_relative_eq!(near.x, far.x, epsilon = 1e-9);
        assert_relative_eq!(near.y, far.y, epsilon = 1e-9);
    }

    #[test]
    fn test_radtan_project_behind_camera() {
        let model = sample_model();
        assert_eq!(
            model.project(&Vector3::new(0.1, 0.1, 0.0)),
            Err(CameraModelError::PointBehindCamera(0.0))
        );
        assert!(matches!(
            model.project(&Vector3::new(0.1, 0.1, -2.0)),
            Err(CameraModelError::PointBehindCamera(_))
        ));
        assert!(matches!(
            model.project(&Vector3::new(0.1, 0.1, f64::NAN)),
            Err(CameraModelError::PointBehindCamera(_))
        ));
    }

    #[test]
    fn test_radtan_project_non_finite() {
        let model = sample_model();
        assert_eq!(
            model.project(&Vector3::new(f64::INFINITY, 0.0, 1.0)),
            Err(CameraModelError::NonFiniteProjection)
        );
    }

    #[test]
    fn test_radtan_principal_point_maps_to_optical_axis() {
        let model = sample_model();
        let center = Vector2::new(model.intrinsics.cx, model.intrinsics.cy);
        let ray = model.unproject(&center).unwrap();
        assert_relative_eq!(ray.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(ray.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_radtan_unproject_with_criteria() {
        let model = sample_model();
        let pixel = Vector2::new(100.0, 80.0);
        let default = model.unproject(&pixel).unwrap();
        let explicit = model
            .unproject_with(&pixel, UndistortCriteria::MaxIter(5))
            .unwrap();
        assert_eq!(default, explicit);
    }
}

//! Stereo calibration: the rigid transform between two cameras and their lens models.
//!
//! A [`StereoCalibration`] is built from any [`CalibrationSource`] and is
//! immutable afterwards. The expected keys are:
//!
//! | key                  | numbers | layout                      |
//! |----------------------|---------|-----------------------------|
//! | `extrinsic_matrix`   | 16      | row-major 4×4, camera 1 → 2 |
//! | `camera1_matrix`     | 9       | row-major 3×3               |
//! | `camera2_matrix`     | 9       | row-major 3×3               |
//! | `camera1_distortion` | 5       | `k1, k2, p1, p2, k3`, optional |
//! | `camera2_distortion` | 5       | `k1, k2, p1, p2, k3`, optional |

use std::fs;
use std::io::Write;
use std::path::Path;

use log::{debug, info, warn};
use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::camera::{DistortionCoeffs, RadTanModel};
use crate::geometry::is_valid_depth;
use crate::projector::ProjectError;

pub mod document;
pub mod source;

pub use document::CalibrationDocument;
pub use source::{CalibrationSource, JsonSource, YamlSource};

pub const EXTRINSIC_MATRIX_KEY: &str = "extrinsic_matrix";
pub const CAMERA1_MATRIX_KEY: &str = "camera1_matrix";
pub const CAMERA2_MATRIX_KEY: &str = "camera2_matrix";
pub const CAMERA1_DISTORTION_KEY: &str = "camera1_distortion";
pub const CAMERA2_DISTORTION_KEY: &str = "camera2_distortion";

/// `|H[2,2]|` at or below this cannot be normalized.
const HOMOGRAPHY_EPS: f64 = 1e-10;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("I/O Error: {0}")]
    Io(String),
    #[error("Parse Error: {0}")]
    Parse(String),
    #[error("Malformed calibration `{key}`: {reason}")]
    MalformedCalibration { key: String, reason: String },
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for LoadError {
    fn from(err: serde_yaml::Error) -> Self {
        LoadError::Parse(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for LoadError {
    fn from(err: yaml_rust::ScanError) -> Self {
        LoadError::Parse(err.to_string())
    }
}

fn malformed(key: &str, reason: impl Into<String>) -> LoadError {
    LoadError::MalformedCalibration {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Rigid transform from the camera-1 frame to the camera-2 frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrinsicTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for ExtrinsicTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ExtrinsicTransform {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        ExtrinsicTransform {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Reads the upper 3×4 block of a row-major 4×4 matrix.
    ///
    /// The bottom row is ignored. Returns `None` when fewer than 16 values are given.
    pub fn from_row_slice(values: &[f64]) -> Option<Self> {
        if values.len() < 16 {
            return None;
        }
        let m = Matrix4::from_row_slice(&values[..16]);
        Some(Self::new(
            m.fixed_view::<3, 3>(0, 0).into_owned(),
            m.fixed_view::<3, 1>(0, 3).into_owned(),
        ))
    }

    /// The homogeneous 4×4 form, with `[0, 0, 0, 1]` as the bottom row.
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// `R · p + t`
    #[inline]
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }
}

/// Extrinsic transform plus the lens model of each camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoCalibration {
    extrinsic: ExtrinsicTransform,
    camera1: RadTanModel,
    camera2: RadTanModel,
}

impl StereoCalibration {
    pub fn new(extrinsic: ExtrinsicTransform, camera1: RadTanModel, camera2: RadTanModel) -> Self {
        StereoCalibration {
            extrinsic,
            camera1,
            camera2,
        }
    }

    /// Builds a calibration from the named arrays of `source`.
    ///
    /// Required arrays that are absent, too short, non-numeric or non-finite are
    /// rejected. Extra numbers are ignored. A missing distortion array means no
    /// distortion; a malformed one is replaced by zeros with a warning.
    ///
    /// Camera matrices are also checked for usable intrinsics: `fx` and `fy`
    /// must be positive and the principal point finite. A well-shaped matrix
    /// with a zero or negative focal length is refused here instead of
    /// producing infinite or mirrored pixels at projection time.
    ///
    /// # Errors
    ///
    /// [`LoadError::MalformedCalibration`] naming the first offending key.
    pub fn from_source(source: &dyn CalibrationSource) -> Result<Self, LoadError> {
        let extrinsic_values = required_array(source, EXTRINSIC_MATRIX_KEY, 16)?;
        let extrinsic = ExtrinsicTransform::from_row_slice(&extrinsic_values)
            .ok_or_else(|| malformed(EXTRINSIC_MATRIX_KEY, "expected 16 numbers"))?;

        let camera1 = camera_model(source, CAMERA1_MATRIX_KEY, CAMERA1_DISTORTION_KEY)?;
        let camera2 = camera_model(source, CAMERA2_MATRIX_KEY, CAMERA2_DISTORTION_KEY)?;

        debug!(
            "calibration: translation={:?} camera1={:?} camera2={:?}",
            extrinsic.translation.as_slice(),
            camera1,
            camera2
        );
        Ok(Self::new(extrinsic, camera1, camera2))
    }

    /// Loads a calibration from a JSON file, see [`from_source`](Self::from_source).
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let source = JsonSource::from_path(path.as_ref())?;
        let calibration = Self::from_source(&source)?;
        info!("loaded stereo calibration from {}", path.as_ref().display());
        Ok(calibration)
    }

    /// Loads a calibration from a YAML file, see [`from_source`](Self::from_source).
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let source = YamlSource::from_path(path.as_ref())?;
        let calibration = Self::from_source(&source)?;
        info!("loaded stereo calibration from {}", path.as_ref().display());
        Ok(calibration)
    }

    pub fn extrinsic(&self) -> &ExtrinsicTransform {
        &self.extrinsic
    }

    pub fn camera1(&self) -> &RadTanModel {
        &self.camera1
    }

    pub fn camera2(&self) -> &RadTanModel {
        &self.camera2
    }

    /// Homography induced by the fronto-parallel plane `Z = depth` of camera 1.
    ///
    /// Maps undistorted camera-1 pixels lying on that plane to undistorted
    /// camera-2 pixels:
    ///
    /// `H = K2 · (R + t · nᵀ / depth) · K1⁻¹`, with `n = (0, 0, 1)`,
    ///
    /// normalized so that `H[2,2] = 1`.
    ///
    /// # Errors
    ///
    /// * [`ProjectError::InvalidDepth`] when `depth` is not positive and finite.
    /// * [`ProjectError::DegenerateHomography`] when `K1` is singular or `H[2,2]`
    ///   is too close to zero to normalize.
    pub fn plane_homography(&self, depth: f64) -> Result<Matrix3<f64>, ProjectError> {
        if !is_valid_depth(depth) {
            return Err(ProjectError::InvalidDepth(depth));
        }

        let k1 = self.camera1.intrinsics.to_matrix();
        let k2 = self.camera2.intrinsics.to_matrix();
        let k1_inv = k1.try_inverse().ok_or_else(|| {
            ProjectError::DegenerateHomography("camera 1 matrix is singular".to_string())
        })?;

        let normal = Vector3::<f64>::z();
        let plane =
            self.extrinsic.rotation + self.extrinsic.translation * normal.transpose() / depth;
        let h = k2 * plane * k1_inv;

        let scale = h[(2, 2)];
        if !(scale.abs() > HOMOGRAPHY_EPS) {
            return Err(ProjectError::DegenerateHomography(format!(
                "H[2,2] = {} cannot be normalized",
                scale
            )));
        }
        Ok(h / scale)
    }

    /// Writes the calibration as JSON in the layout the loader reads.
    pub fn save_to_json<P: AsRef<Path>>(&self, path: P) -> Result<(), LoadError> {
        let text = serde_json::to_string_pretty(&CalibrationDocument::from(self))?;
        let mut file = fs::File::create(path.as_ref())?;
        file.write_all(text.as_bytes())?;
        info!("saved stereo calibration to {}", path.as_ref().display());
        Ok(())
    }

    /// Writes the calibration as YAML in the layout the loader reads.
    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), LoadError> {
        let text = serde_yaml::to_string(&CalibrationDocument::from(self))?;
        let mut file = fs::File::create(path.as_ref())?;
        file.write_all(text.as_bytes())?;
        info!("saved stereo calibration to {}", path.as_ref().display());
        Ok(())
    }
}

fn required_array(
    source: &dyn CalibrationSource,
    key: &str,
    len: usize,
) -> Result<Vec<f64>, LoadError> {
    let mut values = source
        .numeric_array(key)?
        .ok_or_else(|| malformed(key, "missing"))?;

    if values.len() < len {
        return Err(malformed(
            key,
            format!("expected {} numbers, found {}", len, values.len()),
        ));
    }
    if values.len() > len {
        debug!("{}: ignoring {} extra values", key, values.len() - len);
        values.truncate(len);
    }
    if let Some(bad) = values.iter().find(|x| !x.is_finite()) {
        return Err(malformed(key, format!("non-finite value {}", bad)));
    }
    Ok(values)
}

fn optional_distortion(
    source: &dyn CalibrationSource,
    key: &str,
) -> Result<DistortionCoeffs, LoadError> {
    let values = match source.numeric_array(key) {
        Ok(Some(values)) => values,
        Ok(None) => {
            debug!("{}: absent, assuming no distortion", key);
            return Ok(DistortionCoeffs::zero());
        }
        Err(LoadError::MalformedCalibration { reason, .. }) => {
            warn!("{}: {}, assuming no distortion", key, reason);
            return Ok(DistortionCoeffs::zero());
        }
        Err(err) => return Err(err),
    };

    match DistortionCoeffs::from_slice(&values) {
        Some(coeffs) if coeffs.to_array().iter().all(|c| c.is_finite()) => Ok(coeffs),
        _ => {
            warn!(
                "{}: expected 5 finite numbers, found {:?}, assuming no distortion",
                key, values
            );
            Ok(DistortionCoeffs::zero())
        }
    }
}

fn camera_model(
    source: &dyn CalibrationSource,
    matrix_key: &str,
    distortion_key: &str,
) -> Result<RadTanModel, LoadError> {
    let values = required_array(source, matrix_key, 9)?;
    let k = Matrix3::from_row_slice(&values);
    let distortion = optional_distortion(source, distortion_key)?;
    RadTanModel::from_matrix(&k, distortion).map_err(|e| malformed(matrix_key, e.to_string()))
}

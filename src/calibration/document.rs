//! On-disk layout written by [`StereoCalibration::save_to_json`] and
//! [`StereoCalibration::save_to_yaml`].
//!
//! Field names are the keys the loaders look up.

use nalgebra::{Matrix3, Matrix4};
use serde::Serialize;

use super::StereoCalibration;

/// Matrices are stored as lists of rows, distortion as a flat 5-vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationDocument {
    pub extrinsic_matrix: Vec<Vec<f64>>,
    pub camera1_matrix: Vec<Vec<f64>>,
    pub camera1_distortion: Vec<f64>,
    pub camera2_matrix: Vec<Vec<f64>>,
    pub camera2_distortion: Vec<f64>,
}

fn rows3(m: &Matrix3<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}

fn rows4(m: &Matrix4<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}

impl From<&StereoCalibration> for CalibrationDocument {
    fn from(calibration: &StereoCalibration) -> Self {
        let camera1 = calibration.camera1();
        let camera2 = calibration.camera2();
        CalibrationDocument {
            extrinsic_matrix: rows4(&calibration.extrinsic().to_matrix4()),
            camera1_matrix: rows3(&camera1.intrinsics.to_matrix()),
            camera1_distortion: camera1.distortion.to_array().to_vec(),
            camera2_matrix: rows3(&camera2.intrinsics.to_matrix()),
            camera2_distortion: camera2.distortion.to_array().to_vec(),
        }
    }
}

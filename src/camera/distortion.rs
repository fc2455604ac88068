//! Radial-tangential (Brown-Conrady) lens distortion on normalized coordinates.
//!
//! Coefficients follow the OpenCV order `[k1, k2, p1, p2, k3]`:
//! * `k1`, `k2`, `k3`: Radial distortion coefficients.
//! * `p1`, `p2`: Tangential distortion coefficients.
//!
//! Forward distortion is closed-form. The inverse has no closed form and is
//! computed by fixed-point iteration, five passes by default.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Number of fixed-point passes used by [`DistortionCoeffs::undistort`].
pub const DEFAULT_UNDISTORT_ITERATIONS: usize = 5;

/// Termination rule for [`DistortionCoeffs::undistort_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndistortCriteria {
    /// Run exactly this many passes.
    MaxIter(usize),
    /// Stop once an update moves the estimate by less than `eps`, or after `max_iter` passes.
    Eps { max_iter: usize, eps: f64 },
}

impl Default for UndistortCriteria {
    fn default() -> Self {
        UndistortCriteria::MaxIter(DEFAULT_UNDISTORT_ITERATIONS)
    }
}

/// The 5 distortion coefficients of one camera.
///
/// All-zero coefficients mean an ideal pinhole lens; both directions are then
/// the identity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistortionCoeffs {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl DistortionCoeffs {
    pub fn new(k1: f64, k2: f64, p1: f64, p2: f64, k3: f64) -> Self {
        DistortionCoeffs { k1, k2, p1, p2, k3 }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Builds coefficients from `[k1, k2, p1, p2, k3, ...]`.
    ///
    /// Returns `None` when fewer than 5 values are given; extra values are ignored.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [k1, k2, p1, p2, k3, ..] => Some(Self::new(*k1, *k2, *p1, *p2, *k3)),
            _ => None,
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// `false` only when every coefficient is exactly zero.
    pub fn has_distortion(&self) -> bool {
        self.to_array().iter().any(|&c| c != 0.0)
    }

    /// Radial factor and tangential offset at the normalized point `p`.
    #[inline]
    fn terms(&self, p: &Vector2<f64>) -> (f64, Vector2<f64>) {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        let x_t = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_t = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (radial, Vector2::new(x_t, y_t))
    }

    /// Maps an ideal normalized point to where the lens actually images it.
    pub fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        if !self.has_distortion() {
            return *point;
        }
        let (radial, tangential) = self.terms(point);
        Vector2::new(
            point.x * radial + tangential.x,
            point.y * radial + tangential.y,
        )
    }

    /// Inverse of [`distort`](Self::distort) using five fixed-point passes.
    pub fn undistort(&self, distorted: &Vector2<f64>) -> Vector2<f64> {
        self.undistort_with(distorted, UndistortCriteria::default())
    }

    /// Inverse of [`distort`](Self::distort) with an explicit termination rule.
    ///
    /// Starting from the distorted point, each pass re-evaluates the radial and
    /// tangential terms at the current estimate and solves
    /// `x = (xd - x_t) / radial`, `y = (yd - y_t) / radial`.
    ///
    /// # Arguments
    ///
    /// * `distorted` - The observed normalized point `(xd, yd)`.
    /// * `criteria` - When to stop iterating.
    ///
    /// # Return Value
    ///
    /// The estimate of the ideal normalized point. Accuracy is bounded by the
    /// number of passes; coefficients seen in practice converge well within five.
    pub fn undistort_with(
        &self,
        distorted: &Vector2<f64>,
        criteria: UndistortCriteria,
    ) -> Vector2<f64> {
        if !self.has_distortion() {
            return *distorted;
        }

        let (max_iter, eps) = match criteria {
            UndistortCriteria::MaxIter(n) => (n, None),
            UndistortCriteria::Eps { max_iter, eps } => (max_iter, Some(eps)),
        };

        let mut point = *distorted;
        for _ in 0..max_iter {
            let (radial, tangential) = self.terms(&point);
            let next = Vector2::new(
                (distorted.x - tangential.x) / radial,
                (distorted.y - tangential.y) / radial,
            );
            let step = (next - point).norm();
            point = next;
            if let Some(eps) = eps {
                if step < eps {
                    break;
                }
            }
        }
        point
    }
}

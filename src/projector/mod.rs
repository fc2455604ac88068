//! Projection of camera-1 observations into camera 2.
//!
//! A [`Projector`] starts empty and becomes usable once a calibration has been
//! loaded. Every projection follows the same path: normalize and undistort in
//! camera 1, lift to 3D at the given depth, move into the camera-2 frame,
//! then project, distort and denormalize in camera 2.
//!
//! ```rust,no_run
//! use roi_projector::{Projector, Rect};
//!
//! let mut projector = Projector::new();
//! projector.load_from_json("samples/stereo_calibration.json")?;
//!
//! let p = projector.project_point(960.0, 540.0, 1000.0)?;
//! let roi = projector.project_rect(Rect::new(100.0, 200.0, 300.0, 150.0), 1000.0)?;
//! println!("{:?} {:?}", p, roi);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;

use log::{debug, info, trace, warn};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationSource, LoadError, StereoCalibration};
use crate::camera::{CameraModel, CameraModelError, RadTanModel, UndistortCriteria};
use crate::depth::DepthMap;
use crate::geometry::{is_valid_depth, Point2D, Point3D, Quad, Rect};

/// Homogeneous scale below which a homography maps a corner to infinity.
const MIN_HOMOGENEOUS_W: f64 = 1e-6;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    #[error("Calibration not loaded")]
    NotLoaded,
    #[error("Invalid depth {0}: must be positive and finite")]
    InvalidDepth(f64),
    #[error("Point is at or behind camera 2")]
    BehindCamera,
    #[error("Projection produced a non-finite pixel")]
    NonFiniteResult,
    #[error("Only {valid} corners could be projected")]
    InsufficientValidCorners { valid: usize },
    #[error("Corner {index}: {source}")]
    Corner {
        index: usize,
        source: Box<ProjectError>,
    },
    #[error("Degenerate homography: {0}")]
    DegenerateHomography(String),
}

impl From<CameraModelError> for ProjectError {
    fn from(err: CameraModelError) -> Self {
        match err {
            CameraModelError::PointBehindCamera(_) => ProjectError::BehindCamera,
            // Intrinsics are validated at load, so the remaining variants only
            // arise from non-finite inputs.
            _ => ProjectError::NonFiniteResult,
        }
    }
}

/// Tunables of a [`Projector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorOptions {
    /// Termination rule for camera-1 undistortion.
    pub undistort: UndistortCriteria,
    /// Corners that must project for a rectangle projection to succeed.
    pub min_valid_corners: usize,
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        ProjectorOptions {
            undistort: UndistortCriteria::default(),
            min_valid_corners: 2,
        }
    }
}

/// Maps camera-1 observations at known depth into camera-2 pixels.
///
/// Projection takes `&self` and the projector is `Send + Sync`, so a loaded
/// projector can be shared across threads (e.g. behind an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct Projector {
    calibration: Option<StereoCalibration>,
    options: ProjectorOptions,
}

impl Projector {
    /// Creates a projector with no calibration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ProjectorOptions) -> Self {
        Projector {
            calibration: None,
            options,
        }
    }

    /// Creates a projector that is already loaded.
    pub fn with_calibration(calibration: StereoCalibration) -> Self {
        Projector {
            calibration: Some(calibration),
            options: ProjectorOptions::default(),
        }
    }

    pub fn options(&self) -> &ProjectorOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ProjectorOptions) {
        self.options = options;
    }

    pub fn is_loaded(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn calibration(&self) -> Option<&StereoCalibration> {
        self.calibration.as_ref()
    }

    /// Loads a calibration from `source`.
    ///
    /// The calibration is built completely before it replaces the current one;
    /// on error the projector keeps whatever it held before.
    ///
    /// # Errors
    ///
    /// Any [`LoadError`] from [`StereoCalibration::from_source`].
    pub fn load_calibration(&mut self, source: &dyn CalibrationSource) -> Result<(), LoadError> {
        let result = StereoCalibration::from_source(source);
        self.install(result)
    }

    /// Loads a JSON calibration file, see [`load_calibration`](Self::load_calibration).
    pub fn load_from_json<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LoadError> {
        let result = StereoCalibration::load_from_json(path);
        self.install(result)
    }

    /// Loads a YAML calibration file, see [`load_calibration`](Self::load_calibration).
    pub fn load_from_yaml<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LoadError> {
        let result = StereoCalibration::load_from_yaml(path);
        self.install(result)
    }

    fn install(&mut self, result: Result<StereoCalibration, LoadError>) -> Result<(), LoadError> {
        match result {
            Ok(calibration) => {
                if self.calibration.replace(calibration).is_some() {
                    info!("replaced previously loaded calibration");
                }
                Ok(())
            }
            Err(err) => {
                warn!(
                    "calibration load failed ({}), projector {}",
                    err,
                    if self.is_loaded() {
                        "keeps its previous calibration"
                    } else {
                        "remains unloaded"
                    }
                );
                Err(err)
            }
        }
    }

    fn loaded(&self) -> Result<&StereoCalibration, ProjectError> {
        self.calibration.as_ref().ok_or(ProjectError::NotLoaded)
    }

    /// Camera-1 pixel at `depth` to camera-2 pixel. Depth is assumed valid.
    fn transform_point(
        &self,
        calibration: &StereoCalibration,
        u: f64,
        v: f64,
        depth: f64,
    ) -> Result<Point2D, ProjectError> {
        let ray = calibration
            .camera1()
            .unproject_with(&Vector2::new(u, v), self.options.undistort)?;
        let in_camera2 = calibration.extrinsic().transform_point(&(ray * depth));

        if !(in_camera2.z > 0.0 && in_camera2.z.is_finite()) {
            trace!(
                "({}, {}) at depth {} lands at z = {} in camera 2",
                u,
                v,
                depth,
                in_camera2.z
            );
            return Err(ProjectError::BehindCamera);
        }

        let pixel = calibration.camera2().project(&in_camera2)?;
        Ok(Point2D::new(pixel.x, pixel.y))
    }

    /// Projects one camera-1 pixel observed at `depth` into camera 2.
    ///
    /// # Errors
    ///
    /// * [`ProjectError::NotLoaded`] before a calibration has been loaded.
    /// * [`ProjectError::InvalidDepth`] when `depth` is not positive and finite.
    /// * [`ProjectError::BehindCamera`] when the 3D point is not in front of camera 2.
    /// * [`ProjectError::NonFiniteResult`] when the resulting pixel is not finite.
    pub fn project_point(&self, u: f64, v: f64, depth: f64) -> Result<Point2D, ProjectError> {
        let calibration = self.loaded()?;
        if !is_valid_depth(depth) {
            return Err(ProjectError::InvalidDepth(depth));
        }
        self.transform_point(calibration, u, v, depth)
    }

    /// Projects four corners, each at its own depth.
    ///
    /// Stops at the first failing corner and reports it as
    /// [`ProjectError::Corner`] with the corner's index.
    pub fn project_corners(&self, corners: &[Point3D; 4]) -> Result<Quad, ProjectError> {
        self.loaded()?;
        let mut projected = [Point2D::default(); 4];
        for (index, (corner, out)) in corners.iter().zip(projected.iter_mut()).enumerate() {
            *out = self
                .project_point(corner.u, corner.v, corner.z)
                .map_err(|e| ProjectError::Corner {
                    index,
                    source: Box::new(e),
                })?;
        }
        Ok(projected)
    }

    /// Projects the corners of `rect`, all at `depth`, and returns the bounding box
    /// of those that project.
    ///
    /// Corners that fail are skipped. The result is not clamped to the image and
    /// keeps sub-pixel precision.
    ///
    /// # Errors
    ///
    /// [`ProjectError::NotLoaded`], [`ProjectError::InvalidDepth`], or
    /// [`ProjectError::InsufficientValidCorners`] when fewer than
    /// [`ProjectorOptions::min_valid_corners`] corners project.
    pub fn project_rect(&self, rect: Rect, depth: f64) -> Result<Rect, ProjectError> {
        let calibration = self.loaded()?;
        if !is_valid_depth(depth) {
            return Err(ProjectError::InvalidDepth(depth));
        }

        let projected: Vec<Point2D> = rect
            .corners()
            .iter()
            .enumerate()
            .filter_map(
                |(index, c)| match self.transform_point(calibration, c.u, c.v, depth) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        debug!("project_rect: skipping corner {}: {}", index, e);
                        None
                    }
                },
            )
            .collect();

        self.bounding_box(&projected)
    }

    /// Like [`project_rect`](Self::project_rect), but each corner takes its depth
    /// from `depth_map` (see [`DepthMap::depth_near`]).
    ///
    /// Corners without a depth reading nearby are skipped along with those that
    /// fail to project.
    pub fn project_rect_with_depth_map(
        &self,
        rect: Rect,
        depth_map: &DepthMap,
        search_radius: u32,
    ) -> Result<Rect, ProjectError> {
        let calibration = self.loaded()?;

        let mut projected = Vec::with_capacity(4);
        for (index, c) in rect.corners().iter().enumerate() {
            let Some(depth) = depth_map
                .depth_near(c.u, c.v, search_radius)
                .filter(|d| is_valid_depth(*d))
            else {
                debug!("project_rect_with_depth_map: no depth near corner {}", index);
                continue;
            };
            match self.transform_point(calibration, c.u, c.v, depth) {
                Ok(p) => projected.push(p),
                Err(e) => debug!(
                    "project_rect_with_depth_map: skipping corner {} at depth {}: {}",
                    index, depth, e
                ),
            }
        }

        self.bounding_box(&projected)
    }

    /// Projects `rect` through the homography of the plane `Z = depth`.
    ///
    /// Corners are undistorted in camera 1, mapped with
    /// [`StereoCalibration::plane_homography`], and distorted in camera 2. For
    /// points on that plane this agrees with [`project_rect`](Self::project_rect).
    ///
    /// # Errors
    ///
    /// * [`ProjectError::NotLoaded`], [`ProjectError::InvalidDepth`], or
    ///   [`ProjectError::DegenerateHomography`].
    /// * [`ProjectError::BehindCamera`] when a corner maps to (near) infinity.
    /// * [`ProjectError::NonFiniteResult`] when a corner maps to a non-finite pixel.
    pub fn project_rect_planar(&self, rect: Rect, depth: f64) -> Result<Rect, ProjectError> {
        let calibration = self.loaded()?;
        let h = calibration.plane_homography(depth)?;
        let camera1 = calibration.camera1();
        let camera2 = calibration.camera2();

        let mut projected = [Point2D::default(); 4];
        for (corner, out) in rect.corners().iter().zip(projected.iter_mut()) {
            let ideal1 = undistort_pixel(camera1, corner, self.options.undistort);
            let mapped = h * Vector3::new(ideal1.x, ideal1.y, 1.0);
            if !(mapped.z.abs() >= MIN_HOMOGENEOUS_W) {
                return Err(ProjectError::BehindCamera);
            }
            let ideal2 = Vector2::new(mapped.x / mapped.z, mapped.y / mapped.z);
            let pixel = distort_pixel(camera2, &ideal2);
            if !pixel.x.is_finite() || !pixel.y.is_finite() {
                return Err(ProjectError::NonFiniteResult);
            }
            *out = Point2D::new(pixel.x, pixel.y);
        }

        Rect::bounding(&projected).ok_or(ProjectError::InsufficientValidCorners { valid: 0 })
    }

    fn bounding_box(&self, projected: &[Point2D]) -> Result<Rect, ProjectError> {
        let valid = projected.len();
        if valid < self.options.min_valid_corners {
            return Err(ProjectError::InsufficientValidCorners { valid });
        }
        Rect::bounding(projected).ok_or(ProjectError::InsufficientValidCorners { valid })
    }
}

/// Distorted pixel to the pixel an ideal pinhole camera would have seen.
fn undistort_pixel(
    camera: &RadTanModel,
    pixel: &Point2D,
    criteria: UndistortCriteria,
) -> Vector2<f64> {
    let normalized = camera.intrinsics.normalize(&Vector2::new(pixel.u, pixel.v));
    let ideal = camera.distortion.undistort_with(&normalized, criteria);
    camera.intrinsics.denormalize(&ideal)
}

/// Ideal pinhole pixel to the pixel the real lens produces.
fn distort_pixel(camera: &RadTanModel, pixel: &Vector2<f64>) -> Vector2<f64> {
    let normalized = camera.intrinsics.normalize(pixel);
    camera
        .intrinsics
        .denormalize(&camera.distortion.distort(&normalized))
}

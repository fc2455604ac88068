//! ROI Projector Library
//!
//! Maps points and regions observed by one camera of a calibrated stereo rig
//! into the pixel space of the other, and scores how well a projected region
//! lines up with a detection. The library provides:
//! - A pinhole camera model with radial-tangential distortion ([`camera`])
//! - Stereo calibration loading and saving, JSON and YAML ([`calibration`])
//! - Point, quad and rectangle projection at known depth ([`projector`])
//! - 16-bit depth map access for per-corner depth ([`depth`])
//! - Convex polygon clipping and overlap scoring ([`geometry`], [`overlap`])

pub mod calibration;
pub mod camera;
pub mod depth;
pub mod geometry;
pub mod overlap;
pub mod projector;

// Re-export commonly used types
pub use calibration::{
    CalibrationSource, ExtrinsicTransform, JsonSource, LoadError, StereoCalibration, YamlSource,
};
pub use camera::{
    CameraModel, CameraModelError, DistortionCoeffs, Intrinsics, RadTanModel, UndistortCriteria,
};
pub use depth::{DepthMap, DepthMapError};
pub use geometry::{Point2D, Point3D, Quad, Rect};
pub use overlap::{
    is_fully_inside, is_sufficiently_contained, overlap, ContainmentStrategy,
    DEFAULT_CONTAINMENT_THRESHOLD,
};
pub use projector::{ProjectError, Projector, ProjectorOptions};

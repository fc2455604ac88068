//! Pixel-space primitives and the convex polygon kernel.
//!
//! This module provides the plain data types exchanged with the projector
//! ([`Point2D`], [`Point3D`], [`Rect`], [`Quad`]) and re-exports the polygon
//! routines from [`polygon`] used by the overlap evaluator.

use serde::{Deserialize, Serialize};

pub mod polygon;

pub use polygon::{
    convex_clip, is_inside_half_plane, is_point_in_convex_polygon, line_intersection,
    polygon_area,
};

/// A pixel coordinate of a specific camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub u: f64,
    pub v: f64,
}

impl Point2D {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }
}

/// A camera-1 pixel coordinate together with its depth along the optical axis.
///
/// The depth is expressed in the same linear unit as the extrinsic translation
/// (millimetres for the calibrations written by the capture tool). A sample is
/// only usable when `z` is strictly positive and finite, see [`Point3D::has_valid_depth`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub u: f64,
    pub v: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(u: f64, v: f64, z: f64) -> Self {
        Self { u, v, z }
    }

    pub fn has_valid_depth(&self) -> bool {
        is_valid_depth(self.z)
    }
}

/// Returns `true` when `depth` is strictly positive and finite.
pub fn is_valid_depth(depth: f64) -> bool {
    depth > 0.0 && depth.is_finite()
}

/// An axis-aligned rectangle in pixel space.
///
/// A valid rectangle has non-negative `w` and `h`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// The four corners, top-left first, clockwise in image coordinates (y down).
    pub fn corners(&self) -> Quad {
        [
            Point2D::new(self.x, self.y),
            Point2D::new(self.x + self.w, self.y),
            Point2D::new(self.x + self.w, self.y + self.h),
            Point2D::new(self.x, self.y + self.h),
        ]
    }

    /// Smallest axis-aligned rectangle containing every point.
    ///
    /// Returns `None` for an empty point set.
    pub fn bounding(points: &[Point2D]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_u, mut min_v) = (first.u, first.v);
        let (mut max_u, mut max_v) = (first.u, first.v);
        for p in &points[1..] {
            min_u = min_u.min(p.u);
            min_v = min_v.min(p.v);
            max_u = max_u.max(p.u);
            max_v = max_v.max(p.v);
        }
        Some(Self::new(min_u, min_v, max_u - min_u, max_v - min_v))
    }

    pub fn is_valid(&self) -> bool {
        self.w >= 0.0 && self.h >= 0.0
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

/// Four ordered vertices of a convex quadrilateral.
///
/// Quads compared against each other must share the same winding.
pub type Quad = [Point2D; 4];

//! Overlap scoring between a projected region and a detected region.
//!
//! The score is asymmetric on purpose: [`overlap`] measures how much of the
//! detected quad `B` is covered by the projected quad `A`
//! (`area(A ∩ B) / area(B)`), which is the question asked when checking that a
//! detection lines up with a region projected from the other camera.
//!
//! Two containment checks are offered on top of it:
//! * [`is_sufficiently_contained`]: ratio above a threshold, tolerant of small
//!   registration error spread along the boundary.
//! * [`is_fully_inside`]: every vertex of `B` inside `A`, rejecting on any single miss.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geometry::{convex_clip, is_point_in_convex_polygon, polygon_area, Point2D, Quad};

/// Containment threshold applied when none is configured.
pub const DEFAULT_CONTAINMENT_THRESHOLD: f64 = 0.8;

/// Quads with an area below this are treated as empty.
const MIN_AREA: f64 = 1e-9;

fn all_finite(quad: &Quad) -> bool {
    quad.iter().all(Point2D::is_finite)
}

/// Fraction of `b` covered by `a`, in `[0, 1]`.
///
/// Both quads must be convex and share the same winding, with the interior on
/// the inside of every edge as produced by [`crate::geometry::Rect::corners`].
///
/// # Arguments
///
/// * `a` - The covering quad, typically projected from the other camera.
/// * `b` - The covered quad, typically a detection.
///
/// # Return Value
///
/// `area(clip(b, a)) / area(b)`, or `0.0` when either quad contains a non-finite
/// coordinate or has an area below `1e-9`.
pub fn overlap(a: &Quad, b: &Quad) -> f64 {
    if !all_finite(a) || !all_finite(b) {
        debug!("overlap: non-finite vertex, a={:?} b={:?}", a, b);
        return 0.0;
    }

    let area_a = polygon_area(a);
    let area_b = polygon_area(b);
    if area_a < MIN_AREA || area_b < MIN_AREA {
        debug!("overlap: degenerate quad, area_a={} area_b={}", area_a, area_b);
        return 0.0;
    }

    let intersection = convex_clip(b, a);
    let intersection_area = polygon_area(&intersection);
    let ratio = (intersection_area / area_b).clamp(0.0, 1.0);

    debug!(
        "overlap: area_a={:.3} area_b={:.3} vertices={} intersection={:.3} ratio={:.4}",
        area_a,
        area_b,
        intersection.len(),
        intersection_area,
        ratio
    );

    ratio
}

/// Returns `true` when more than `threshold` of `b` lies inside `a`.
///
/// The comparison is strict: a ratio equal to the threshold is rejected.
/// Use [`DEFAULT_CONTAINMENT_THRESHOLD`] for the usual 0.8.
pub fn is_sufficiently_contained(a: &Quad, b: &Quad, threshold: f64) -> bool {
    overlap(a, b) > threshold
}

/// Returns `true` when every vertex of `b` lies inside (or on the boundary of) `a`.
pub fn is_fully_inside(a: &Quad, b: &Quad) -> bool {
    if !all_finite(a) || !all_finite(b) {
        return false;
    }
    b.iter().all(|p| is_point_in_convex_polygon(a, p))
}

/// Selects how containment of a detected quad in a projected quad is decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ContainmentStrategy {
    /// [`is_sufficiently_contained`] with the given threshold.
    Ratio { threshold: f64 },
    /// [`is_fully_inside`].
    AllVertices,
}

impl Default for ContainmentStrategy {
    fn default() -> Self {
        ContainmentStrategy::Ratio {
            threshold: DEFAULT_CONTAINMENT_THRESHOLD,
        }
    }
}

impl ContainmentStrategy {
    pub fn is_contained(&self, a: &Quad, b: &Quad) -> bool {
        match self {
            ContainmentStrategy::Ratio { threshold } => is_sufficiently_contained(a, b, *threshold),
            ContainmentStrategy::AllVertices => is_fully_inside(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use approx::assert_relative_eq;

    fn unit_square() -> Quad {
        Rect::new(0.0, 0.0, 1.0, 1.0).corners()
    }

    /// Tall strip covering `[0, width] x [-1, 2]`, so it covers `width` of the unit square.
    fn strip(width: f64) -> Quad {
        Rect::new(0.0, -1.0, width, 3.0).corners()
    }

    #[test]
    fn test_identical_squares_overlap_fully() {
        assert_relative_eq!(overlap(&unit_square(), &unit_square()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disjoint_squares_do_not_overlap() {
        let far = Rect::new(3.0, 3.0, 1.0, 1.0).corners();
        assert_eq!(overlap(&unit_square(), &far), 0.0);
        assert_eq!(overlap(&far, &unit_square()), 0.0);
    }

    #[test]
    fn test_half_covered_square() {
        let a = Rect::new(0.5, -1.0, 2.0, 3.0).corners();
        assert_relative_eq!(overlap(&a, &unit_square()), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_overlap_is_asymmetric() {
        // Large A fully covers small B, but B covers only a quarter of A.
        let a = Rect::new(0.0, 0.0, 2.0, 2.0).corners();
        let b = Rect::new(0.5, 0.5, 1.0, 1.0).corners();
        assert_relative_eq!(overlap(&a, &b), 1.0, epsilon = 1e-12);
        assert_relative_eq!(overlap(&b, &a), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_detection() {
        // Diamond inscribed in the 2x2 square has half its area; it is fully covered.
        let a = Rect::new(0.0, 0.0, 2.0, 2.0).corners();
        let diamond: Quad = [
            Point2D::new(1.0, 0.0),
            Point2D::new(2.0, 1.0),
            Point2D::new(1.0, 2.0),
            Point2D::new(0.0, 1.0),
        ];
        assert_relative_eq!(overlap(&a, &diamond), 1.0, epsilon = 1e-12);
        // The square is only half covered by the diamond.
        assert_relative_eq!(overlap(&diamond, &a), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_and_non_finite_inputs_score_zero() {
        let collapsed: Quad = [Point2D::new(1.0, 1.0); 4];
        assert_eq!(overlap(&unit_square(), &collapsed), 0.0);
        assert_eq!(overlap(&collapsed, &unit_square()), 0.0);

        let mut with_nan = unit_square();
        with_nan[2].u = f64::NAN;
        assert_eq!(overlap(&with_nan, &unit_square()), 0.0);
        assert_eq!(overlap(&unit_square(), &with_nan), 0.0);
    }

    #[test]
    fn test_threshold_behavior() {
        let b = unit_square();
        assert_relative_eq!(overlap(&strip(0.81), &b), 0.81, epsilon = 1e-9);
        assert_relative_eq!(overlap(&strip(0.79), &b), 0.79, epsilon = 1e-9);

        assert!(is_sufficiently_contained(&strip(0.81), &b, DEFAULT_CONTAINMENT_THRESHOLD));
        assert!(!is_sufficiently_contained(&strip(0.79), &b, DEFAULT_CONTAINMENT_THRESHOLD));
    }

    #[test]
    fn test_is_fully_inside() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0).corners();
        let inside = Rect::new(2.0, 2.0, 3.0, 3.0).corners();
        let touching = Rect::new(0.0, 0.0, 10.0, 5.0).corners();
        let sticking_out = Rect::new(8.0, 8.0, 3.0, 1.0).corners();

        assert!(is_fully_inside(&a, &inside));
        assert!(is_fully_inside(&a, &touching));
        assert!(!is_fully_inside(&a, &sticking_out));

        // Strict check rejects what the ratio check accepts.
        let mostly_inside = Rect::new(1.0, 1.0, 9.5, 8.0).corners();
        assert!(is_sufficiently_contained(&a, &mostly_inside, DEFAULT_CONTAINMENT_THRESHOLD));
        assert!(!is_fully_inside(&a, &mostly_inside));
    }

    #[test]
    fn test_is_fully_inside_rejects_non_finite() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0).corners();
        let mut with_nan = Rect::new(2.0, 2.0, 3.0, 3.0).corners();
        with_nan[2].u = f64::NAN;
        let mut with_inf = a;
        with_inf[1].v = f64::INFINITY;

        assert!(!is_fully_inside(&a, &with_nan));
        assert!(!is_fully_inside(&with_nan, &a));
        assert!(!is_fully_inside(&with_inf, &with_inf));
    }

    #[test]
    fn test_containment_strategy() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0).corners();
        let mostly_inside = Rect::new(1.0, 1.0, 9.5, 8.0).corners();

        assert_eq!(
            ContainmentStrategy::default(),
            ContainmentStrategy::Ratio { threshold: 0.8 }
        );
        assert!(ContainmentStrategy::default().is_contained(&a, &mostly_inside));
        assert!(!ContainmentStrategy::AllVertices.is_contained(&a, &mostly_inside));
    }

    #[test]
    fn test_containment_strategy_from_json() {
        let strategy: ContainmentStrategy =
            serde_json::from_str(r#"{"strategy": "ratio", "threshold": 0.9}"#).unwrap();
        assert_eq!(strategy, ContainmentStrategy::Ratio { threshold: 0.9 });

        let strategy: ContainmentStrategy =
            serde_json::from_str(r#"{"strategy": "all_vertices"}"#).unwrap();
        assert_eq!(strategy, ContainmentStrategy::AllVertices);
    }
}

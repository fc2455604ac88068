//! Polygon routines on pixel-space vertices.
//!
//! Orientation convention: a point is *inside* a directed edge `a -> b` when the
//! 2-D cross product `(b - a) x (p - a)` is non-negative, i.e. the point lies on
//! the left of the edge in a y-up frame, which is the right-hand side when drawn
//! in image coordinates (y down). A clip polygon must be wound so that its
//! interior is on the inside of every edge; [`crate::geometry::Rect::corners`]
//! produces that order.

use super::Point2D;

/// Cross products below this magnitude count as "on the line".
const BOUNDARY_EPS: f64 = 1e-9;

/// Denominators below this magnitude mean the two lines are parallel.
const PARALLEL_EPS: f64 = 1e-9;

#[inline]
fn cross(a: &Point2D, b: &Point2D, p: &Point2D) -> f64 {
    (b.u - a.u) * (p.v - a.v) - (b.v - a.v) * (p.u - a.u)
}

/// Computes the area of a simple polygon with the shoelace formula.
///
/// The absolute value is returned, so the winding of `polygon` does not matter.
/// Works for convex and concave polygons alike.
///
/// # Arguments
///
/// * `polygon` - The polygon vertices in order; the last vertex connects back to the first.
///
/// # Return Value
///
/// The enclosed area, or `0.0` when fewer than 3 vertices are given.
pub fn polygon_area(polygon: &[Point2D]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let n = polygon.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].u * polygon[j].v;
        area -= polygon[j].u * polygon[i].v;
    }
    area.abs() / 2.0
}

/// Returns `true` when `p` lies on the inside of the directed edge `a -> b` or on it.
pub fn is_inside_half_plane(p: &Point2D, a: &Point2D, b: &Point2D) -> bool {
    cross(a, b, p) >= 0.0
}

/// Intersects the line through `p1, p2` with the line through `a, b`.
///
/// The result lies on `p1 -> p2` at the parameter where it meets the clip line.
/// Parallel lines have no intersection; the midpoint of `p1, p2` is returned
/// instead so that clipping always yields a finite vertex.
pub fn line_intersection(p1: &Point2D, p2: &Point2D, a: &Point2D, b: &Point2D) -> Point2D {
    let dx1 = p2.u - p1.u;
    let dy1 = p2.v - p1.v;
    let dx2 = b.u - a.u;
    let dy2 = b.v - a.v;

    let denom = dx1 * dy2 - dy1 * dx2;
    if denom.abs() < PARALLEL_EPS {
        return Point2D::new((p1.u + p2.u) / 2.0, (p1.v + p2.v) / 2.0);
    }

    let t = ((a.u - p1.u) * dy2 - (a.v - p1.v) * dx2) / denom;
    Point2D::new(p1.u + t * dx1, p1.v + t * dy1)
}

/// Clips `subject` against the convex polygon `clip` (Sutherland–Hodgman).
///
/// Each edge of `clip` in turn trims the working polygon to its inside
/// half-plane. Subject edges crossing the boundary are replaced by their
/// intersection with the clip edge.
///
/// # Arguments
///
/// * `subject` - The polygon to be clipped; any simple polygon works, convex gives exact results.
/// * `clip` - A convex polygon, wound so its interior is inside every edge.
///
/// # Return Value
///
/// The part of `subject` lying inside `clip`. An empty vector means the two
/// polygons do not intersect; clipping stops at the first edge that empties
/// the working polygon.
pub fn convex_clip(subject: &[Point2D], clip: &[Point2D]) -> Vec<Point2D> {
    let mut output: Vec<Point2D> = subject.to_vec();

    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let edge_start = &clip[i];
        let edge_end = &clip[(i + 1) % clip.len()];

        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        let mut prev_inside = is_inside_half_plane(&prev, edge_start, edge_end);

        for curr in &input {
            let curr_inside = is_inside_half_plane(curr, edge_start, edge_end);
            if curr_inside {
                if !prev_inside {
                    output.push(line_intersection(&prev, curr, edge_start, edge_end));
                }
                output.push(*curr);
            } else if prev_inside {
                output.push(line_intersection(&prev, curr, edge_start, edge_end));
            }
            prev = *curr;
            prev_inside = curr_inside;
        }

        if output.is_empty() {
            log::trace!("clip edge {} left no vertices", i);
            return Vec::new();
        }
    }

    output
}

/// Tests whether `p` lies inside the convex `polygon`, regardless of its winding.
///
/// The cross product of every edge with `p` must keep one sign. Cross products
/// within `1e-9` of zero mean `p` is on that edge's line and are skipped, so
/// boundary points are accepted. A point for which every cross product is zero
/// (degenerate polygon) is rejected.
pub fn is_point_in_convex_polygon(polygon: &[Point2D], p: &Point2D) -> bool {
    let n = polygon.len();
    let mut sign = 0i8;
    for i in 0..n {
        let c = cross(&polygon[i], &polygon[(i + 1) % n], p);
        if c.abs() <= BOUNDARY_EPS {
            continue;
        }
        let current = if c > 0.0 { 1 } else { -1 };
        if sign == 0 {
            sign = current;
        } else if sign != current {
            return false;
        }
    }
    sign != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x: f64, y: f64, side: f64) -> Vec<Point2D> {
        vec![
            Point2D::new(x, y),
            Point2D::new(x + side, y),
            Point2D::new(x + side, y + side),
            Point2D::new(x, y + side),
        ]
    }

    #[test]
    fn test_polygon_area_unit_square() {
        assert_relative_eq!(polygon_area(&square(0.0, 0.0, 1.0)), 1.0);
    }

    #[test]
    fn test_polygon_area_ignores_winding() {
        let mut poly = square(2.0, 3.0, 4.0);
        let forward = polygon_area(&poly);
        poly.reverse();
        assert_relative_eq!(forward, 16.0);
        assert_relative_eq!(polygon_area(&poly), 16.0);
    }

    #[test]
    fn test_polygon_area_concave_and_degenerate() {
        // L-shape: 2x2 square with the top-right 1x1 cell removed
        let l_shape = [
            Point2D::new(0.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(2.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, 2.0),
            Point2D::new(0.0, 2.0),
        ];
        assert_relative_eq!(polygon_area(&l_shape), 3.0);

        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&[Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_half_plane_boundary_is_inside() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(1.0, 0.0);
        assert!(is_inside_half_plane(&Point2D::new(0.5, 1.0), &a, &b));
        assert!(is_inside_half_plane(&Point2D::new(0.5, 0.0), &a, &b));
        assert!(!is_inside_half_plane(&Point2D::new(0.5, -1.0), &a, &b));
    }

    #[test]
    fn test_line_intersection() {
        let p = line_intersection(
            &Point2D::new(0.0, -1.0),
            &Point2D::new(0.0, 1.0),
            &Point2D::new(-1.0, 0.5),
            &Point2D::new(1.0, 0.5),
        );
        assert_relative_eq!(p.u, 0.0);
        assert_relative_eq!(p.v, 0.5);
    }

    #[test]
    fn test_line_intersection_parallel_falls_back_to_midpoint() {
        let p = line_intersection(
            &Point2D::new(0.0, 0.0),
            &Point2D::new(2.0, 0.0),
            &Point2D::new(0.0, 1.0),
            &Point2D::new(5.0, 1.0),
        );
        assert_eq!(p, Point2D::new(1.0, 0.0));
    }

    #[test]
    fn test_convex_clip_partial_overlap() {
        let subject = square(0.5, 0.5, 1.0);
        let clip = square(0.0, 0.0, 1.0);
        let result = convex_clip(&subject, &clip);

        assert_eq!(result.len(), 4);
        assert_relative_eq!(polygon_area(&result), 0.25, epsilon = 1e-12);
        for p in &result {
            assert!(p.u >= 0.5 - 1e-12 && p.u <= 1.0 + 1e-12);
            assert!(p.v >= 0.5 - 1e-12 && p.v <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_convex_clip_subject_fully_inside() {
        let subject = square(0.25, 0.25, 0.5);
        let clip = square(0.0, 0.0, 1.0);
        let result = convex_clip(&subject, &clip);
        assert_eq!(result, subject);
    }

    #[test]
    fn test_convex_clip_disjoint_is_empty() {
        let subject = square(5.0, 5.0, 1.0);
        let clip = square(0.0, 0.0, 1.0);
        assert!(convex_clip(&subject, &clip).is_empty());
    }

    #[test]
    fn test_convex_clip_rotated_diamond() {
        // Diamond inscribed in the unit square touches each edge midpoint.
        let diamond = [
            Point2D::new(0.5, -0.5),
            Point2D::new(1.5, 0.5),
            Point2D::new(0.5, 1.5),
            Point2D::new(-0.5, 0.5),
        ];
        let clip = square(0.0, 0.0, 1.0);
        let result = convex_clip(&diamond, &clip);
        // The unit square lies entirely inside the diamond.
        assert_relative_eq!(polygon_area(&result), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_point_in_convex_polygon() {
        let poly = square(0.0, 0.0, 2.0);
        assert!(is_point_in_convex_polygon(&poly, &Point2D::new(1.0, 1.0)));
        assert!(!is_point_in_convex_polygon(&poly, &Point2D::new(3.0, 1.0)));

        // Boundary and corner points are accepted.
        assert!(is_point_in_convex_polygon(&poly, &Point2D::new(2.0, 1.0)));
        assert!(is_point_in_convex_polygon(&poly, &Point2D::new(0.0, 0.0)));

        // Either winding works.
        let mut reversed = poly.clone();
        reversed.reverse();
        assert!(is_point_in_convex_polygon(&reversed, &Point2D::new(1.0, 1.0)));
        assert!(!is_point_in_convex_polygon(&reversed, &Point2D::new(-0.1, 1.0)));
    }

    #[test]
    fn test_point_in_degenerate_polygon_is_rejected() {
        let collapsed = [Point2D::new(1.0, 1.0); 4];
        assert!(!is_point_in_convex_polygon(&collapsed, &Point2D::new(1.0, 1.0)));
    }
}

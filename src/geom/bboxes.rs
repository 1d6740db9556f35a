use crate::geom::EPS;
use crate::geom::point::Point;

/// Returns the min and max corners of the box holding all points `pts`.
///
/// For an empty slice the corners are inverted infinities, so the box
/// overlaps nothing and contains nothing.
pub fn bounding_box(pts: &[Point]) -> (Point, Point) {
    let inf = f64::INFINITY;
    pts.iter().fold(
        (Point::new(inf, inf, inf), Point::new(-inf, -inf, -inf)),
        |(pmin, pmax), p| (pmin.min(p), pmax.max(p)),
    )
}

/// Checks whether a point is strictly inside a bounding box (not on boundary).
pub fn is_point_strictly_inside_bbox(ptest: Point, pmin: Point, pmax: Point) -> bool {
    ptest.x > pmin.x + EPS
        && ptest.x < pmax.x - EPS
        && ptest.y > pmin.y + EPS
        && ptest.y < pmax.y - EPS
        && ptest.z > pmin.z + EPS
        && ptest.z < pmax.z - EPS
}

/// Checks whether a point is inside a bounding box or on its boundary.
pub fn is_point_inside_bbox(ptest: Point, pmin: Point, pmax: Point) -> bool {
    ptest.x >= pmin.x - EPS
        && ptest.x <= pmax.x + EPS
        && ptest.y >= pmin.y - EPS
        && ptest.y <= pmax.y + EPS
        && ptest.z >= pmin.z - EPS
        && ptest.z <= pmax.z + EPS
}

/// Checks whether two bounding boxes overlap.
///
/// Takes min and max corners of each bbox.
/// Returns true if boxes overlap (including touching).
pub fn are_bboxes_overlapping(min1: Point, max1: Point, min2: Point, max2: Point) -> bool {
    // Boxes don't overlap if separated along any axis
    if max1.x < min2.x - EPS || min1.x > max2.x + EPS {
        return false;
    }
    if max1.y < min2.y - EPS || min1.y > max2.y + EPS {
        return false;
    }
    if max1.z < min2.z - EPS || min1.z > max2.z + EPS {
        return false;
    }
    true
}

/// Squared distance from a point to the closest point of a box.
/// Zero when the point is inside.
pub fn min_dist_to_bbox_squared(ptest: Point, pmin: Point, pmax: Point) -> f64 {
    let axis = |v: f64, lo: f64, hi: f64| {
        if v < lo {
            lo - v
        } else if v > hi {
            v - hi
        } else {
            0.
        }
    };
    axis(ptest.x, pmin.x, pmax.x).powi(2)
        + axis(ptest.y, pmin.y, pmax.y).powi(2)
        + axis(ptest.z, pmin.z, pmax.z).powi(2)
}

/// Length of the box diagonal.
pub fn bbox_diagonal(pmin: Point, pmax: Point) -> f64 {
    pmin.distance(&pmax)
}

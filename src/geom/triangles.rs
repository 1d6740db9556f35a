use crate::Point;
use crate::geom::EPS;
use crate::geom::vector::Vector;

/// Squared distance from `ptest` to the segment `(pa, pb)`.
///
/// A zero-length segment is treated as a point.
pub fn point_segment_distance_squared(ptest: Point, pa: Point, pb: Point) -> f64 {
    let ab = pb - pa;
    let len2 = ab.dot(ab);
    if len2 < EPS {
        return ptest.distance_squared(&pa);
    }
    let t = ((ptest - pa).dot(ab) / len2).clamp(0., 1.);
    ptest.distance_squared(&(pa + ab * t))
}

/// Squared distance from `ptest` to the triangle `(p0, p1, p2)`.
///
/// Projects the point onto the triangle plane and resolves which of the
/// seven regions of the `(s, t)` parameter plane the projection falls in,
/// clamping onto the closest edge or vertex when outside. Triangles with
/// (near) zero area fall back to the closest of the three edges.
pub fn point_triangle_distance_squared(ptest: Point, p0: Point, p1: Point, p2: Point) -> f64 {
    let diff = p0 - ptest;
    let e0 = p1 - p0;
    let e1 = p2 - p0;
    let a00 = e0.dot(e0);
    let a01 = e0.dot(e1);
    let a11 = e1.dot(e1);
    let b0 = diff.dot(e0);
    let b1 = diff.dot(e1);
    let det = (a00 * a11 - a01 * a01).max(0.);

    if det <= EPS * (a00 * a11).max(EPS) {
        return point_segment_distance_squared(ptest, p0, p1)
            .min(point_segment_distance_squared(ptest, p1, p2))
            .min(point_segment_distance_squared(ptest, p2, p0));
    }

    let mut s = a01 * b1 - a11 * b0;
    let mut t = a01 * b0 - a00 * b1;

    if s + t <= det {
        if s < 0. {
            if t < 0. {
                if b0 < 0. {
                    t = 0.;
                    s = if -b0 >= a00 { 1. } else { -b0 / a00 };
                } else {
                    s = 0.;
                    t = if b1 >= 0. {
                        0.
                    } else if -b1 >= a11 {
                        1.
                    } else {
                        -b1 / a11
                    };
                }
            } else {
                s = 0.;
                t = if b1 >= 0. {
                    0.
                } else if -b1 >= a11 {
                    1.
                } else {
                    -b1 / a11
                };
            }
        } else if t < 0. {
            t = 0.;
            s = if b0 >= 0. {
                0.
            } else if -b0 >= a00 {
                1.
            } else {
                -b0 / a00
            };
        } else {
            s /= det;
            t /= det;
        }
    } else if s < 0. {
        let tmp0 = a01 + b0;
        let tmp1 = a11 + b1;
        if tmp1 > tmp0 {
            let numer = tmp1 - tmp0;
            let denom = a00 - 2. * a01 + a11;
            if numer >= denom {
                s = 1.;
                t = 0.;
            } else {
                s = numer / denom;
                t = 1. - s;
            }
        } else {
            s = 0.;
            t = if tmp1 <= 0. {
                1.
            } else if b1 >= 0. {
                0.
            } else {
                -b1 / a11
            };
        }
    } else if t < 0. {
        let tmp0 = a01 + b1;
        let tmp1 = a00 + b0;
        if tmp1 > tmp0 {
            let numer = tmp1 - tmp0;
            let denom = a00 - 2. * a01 + a11;
            if numer >= denom {
                t = 1.;
                s = 0.;
            } else {
                t = numer / denom;
                s = 1. - t;
            }
        } else {
            t = 0.;
            s = if tmp1 <= 0. {
                1.
            } else if b0 >= 0. {
                0.
            } else {
                -b0 / a00
            };
        }
    } else {
        let numer = a11 + b1 - a01 - b0;
        if numer <= 0. {
            s = 0.;
            t = 1.;
        } else {
            let denom = a00 - 2. * a01 + a11;
            if numer >= denom {
                s = 1.;
                t = 0.;
            } else {
                s = numer / denom;
                t = 1. - s;
            }
        }
    }

    let closest = p0 + e0 * s + e1 * t;
    ptest.distance_squared(&closest)
}

/// Ray-triangle intersection (Möller–Trumbore).
///
/// Returns the ray parameter `t > 0` of the hit, or `None` if the ray
/// misses or runs parallel to the triangle.
pub fn ray_triangle_intersection(
    origin: Point,
    direction: Vector,
    p0: Point,
    p1: Point,
    p2: Point,
) -> Option<f64> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let h = direction.cross(e2);
    let det = e1.dot(h);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1. / det;
    let s = origin - p0;
    let u = inv_det * s.dot(h);
    if !(0. ..=1.).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = inv_det * direction.dot(q);
    if v < 0. || u + v > 1. {
        return None;
    }
    let t = inv_det * e2.dot(q);
    if t > 1e-10 { Some(t) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> (Point, Point, Point) {
        (
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(0., 1., 0.),
        )
    }

    #[test]
    fn test_distance_above_interior() {
        let (p0, p1, p2) = unit_triangle();
        let d2 = point_triangle_distance_squared(Point::new(0.25, 0.25, 2.), p0, p1, p2);
        assert!((d2 - 4.).abs() < 1e-12);
    }

    #[test]
    fn test_distance_to_vertex_and_edge() {
        let (p0, p1, p2) = unit_triangle();
        // Closest to vertex p1
        let d2 = point_triangle_distance_squared(Point::new(2., -1., 0.), p0, p1, p2);
        assert!((d2 - 2.).abs() < 1e-12);
        // Closest to hypotenuse
        let d2 = point_triangle_distance_squared(Point::new(1., 1., 0.), p0, p1, p2);
        assert!((d2 - 0.5).abs() < 1e-12);
        // Closest to edge along y axis
        let d2 = point_triangle_distance_squared(Point::new(-3., 0.5, 0.), p0, p1, p2);
        assert!((d2 - 9.).abs() < 1e-12);
    }

    #[test]
    fn test_distance_on_triangle_is_zero() {
        let (p0, p1, p2) = unit_triangle();
        let d2 = point_triangle_distance_squared(Point::new(0.2, 0.3, 0.), p0, p1, p2);
        assert!(d2 < 1e-20);
    }

    #[test]
    fn test_degenerate_triangle() {
        // All three vertices on the x axis
        let p0 = Point::new(0., 0., 0.);
        let p1 = Point::new(1., 0., 0.);
        let p2 = Point::new(2., 0., 0.);
        let d2 = point_triangle_distance_squared(Point::new(1.5, 1., 0.), p0, p1, p2);
        assert!((d2 - 1.).abs() < 1e-12);
        let d2 = point_triangle_distance_squared(Point::new(3., 0., 0.), p0, p0, p0);
        assert!((d2 - 9.).abs() < 1e-12);
    }

    #[test]
    fn test_ray_triangle_intersection() {
        let (p0, p1, p2) = unit_triangle();
        let origin = Point::new(0.2, 0.2, -1.);
        let hit = ray_triangle_intersection(origin, Vector::new(0., 0., 1.), p0, p1, p2);
        assert!((hit.unwrap() - 1.).abs() < 1e-12);
        // Pointing away
        let miss = ray_triangle_intersection(origin, Vector::new(0., 0., -1.), p0, p1, p2);
        assert!(miss.is_none());
        // Parallel
        let miss = ray_triangle_intersection(origin, Vector::new(1., 0., 0.), p0, p1, p2);
        assert!(miss.is_none());
    }
}

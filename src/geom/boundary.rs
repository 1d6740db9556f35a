//! Closed regions that a waveguide mesh is laid out in.
//!
//! A boundary answers two questions: what is its axis-aligned extent,
//! and is a given point inside it.

use crate::Point;
use crate::geom::bboxes::{bounding_box, is_point_inside_bbox, is_point_strictly_inside_bbox};
use crate::geom::triangles::ray_triangle_intersection;
use crate::geom::vector::Vector;
use anyhow::{Result, anyhow};

pub trait Boundary: Send + Sync {
    /// Min and max corners of the region.
    fn aabb(&self) -> (Point, Point);

    /// Returns true if the point lies strictly inside the region.
    fn inside(&self, ptest: Point) -> bool;
}

/// Axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuboidBoundary {
    pub min: Point,
    pub max: Point,
}

impl CuboidBoundary {
    pub fn new(min: Point, max: Point) -> Result<Self> {
        if !(min.x < max.x && min.y < max.y && min.z < max.z) {
            return Err(anyhow!("Cuboid min {} must be below max {}", min, max));
        }
        Ok(Self { min, max })
    }
}

impl Boundary for CuboidBoundary {
    fn aabb(&self) -> (Point, Point) {
        (self.min, self.max)
    }

    fn inside(&self, ptest: Point) -> bool {
        is_point_strictly_inside_bbox(ptest, self.min, self.max)
    }
}

/// Closed triangle mesh.
///
/// Containment is decided by ray casting: a ray leaving the point crosses
/// the surface an odd number of times when the point is inside. Three
/// skewed directions are tried and the majority wins, so a ray grazing an
/// edge or a vertex does not flip the answer.
#[derive(Debug, Clone)]
pub struct MeshBoundary {
    vertices: Vec<Point>,
    triangles: Vec<[usize; 3]>,
    bbox_min: Point,
    bbox_max: Point,
}

const RAY_DIRECTIONS: [(f64, f64, f64); 3] = [
    (1.0, 0.1234, 0.0567),
    (-0.0719, 1.0, 0.1321),
    (0.0913, -0.1187, 1.0),
];

impl MeshBoundary {
    pub fn new(vertices: Vec<Point>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(anyhow!("Mesh boundary needs at least one triangle"));
        }
        if let Some(bad) = triangles.iter().flatten().find(|&&i| i >= vertices.len()) {
            return Err(anyhow!(
                "Triangle vertex index {} out of range ({} vertices)",
                bad,
                vertices.len()
            ));
        }
        let (bbox_min, bbox_max) = bounding_box(&vertices);
        Ok(Self {
            vertices,
            triangles,
            bbox_min,
            bbox_max,
        })
    }

    /// Counts surface crossings of the ray from `ptest` along `direction`.
    fn crossings(&self, ptest: Point, direction: Vector) -> usize {
        self.triangles
            .iter()
            .filter(|[a, b, c]| {
                ray_triangle_intersection(
                    ptest,
                    direction,
                    self.vertices[*a],
                    self.vertices[*b],
                    self.vertices[*c],
                )
                .is_some()
            })
            .count()
    }
}

impl Boundary for MeshBoundary {
    fn aabb(&self) -> (Point, Point) {
        (self.bbox_min, self.bbox_max)
    }

    fn inside(&self, ptest: Point) -> bool {
        // Quick rejection: check bounding box first
        if !is_point_inside_bbox(ptest, self.bbox_min, self.bbox_max) {
            return false;
        }
        let inside_count = RAY_DIRECTIONS
            .iter()
            .filter(|(dx, dy, dz)| self.crossings(ptest, Vector::new(*dx, *dy, *dz)) % 2 == 1)
            .count();

        // Use majority vote
        inside_count * 2 > RAY_DIRECTIONS.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit cube made of 12 triangles.
    fn cube_mesh(size: f64) -> MeshBoundary {
        let v = |x: f64, y: f64, z: f64| Point::new(x * size, y * size, z * size);
        let vertices = vec![
            v(0., 0., 0.),
            v(1., 0., 0.),
            v(1., 1., 0.),
            v(0., 1., 0.),
            v(0., 0., 1.),
            v(1., 0., 1.),
            v(1., 1., 1.),
            v(0., 1., 1.),
        ];
        let triangles = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        MeshBoundary::new(vertices, triangles).unwrap()
    }

    #[test]
    fn test_cuboid_inside() -> Result<()> {
        let b = CuboidBoundary::new(Point::new(0., 0., 0.), Point::new(2., 1., 1.))?;
        assert!(b.inside(Point::new(1.5, 0.5, 0.5)));
        assert!(!b.inside(Point::new(2.5, 0.5, 0.5)));
        assert!(!b.inside(Point::new(2., 0.5, 0.5)));
        Ok(())
    }

    #[test]
    fn test_cuboid_rejects_inverted_corners() {
        let b = CuboidBoundary::new(Point::new(1., 0., 0.), Point::new(0., 1., 1.));
        assert!(b.is_err());
    }

    #[test]
    fn test_mesh_inside() {
        let b = cube_mesh(2.);
        assert!(b.inside(Point::new(1., 1., 1.)));
        assert!(b.inside(Point::new(0.1, 1.9, 0.5)));
        assert!(!b.inside(Point::new(3., 1., 1.)));
        assert!(!b.inside(Point::new(-0.1, 1., 1.)));
        let (pmin, pmax) = b.aabb();
        assert!(pmin.is_close(&Point::new(0., 0., 0.)));
        assert!(pmax.is_close(&Point::new(2., 2., 2.)));
    }

    #[test]
    fn test_mesh_bad_index() {
        let res = MeshBoundary::new(vec![Point::new(0., 0., 0.)], vec![[0, 1, 2]]);
        assert!(res.is_err());
    }
}

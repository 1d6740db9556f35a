pub mod voxel_grid;

use anyhow::{Result, anyhow};

use crate::Point;
use crate::geom::bboxes::bounding_box;
use crate::geom::boundary::MeshBoundary;
use crate::geom::triangles::point_triangle_distance_squared;
use crate::sim::materials::AcousticMaterial;

/// Triangle referencing three scene vertices and the surface it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub v0: usize,
    pub v1: usize,
    pub v2: usize,
    pub surface: usize,
}

impl Triangle {
    pub fn new(v0: usize, v1: usize, v2: usize, surface: usize) -> Self {
        Self { v0, v1, v2, surface }
    }

    pub fn indices(&self) -> [usize; 3] {
        [self.v0, self.v1, self.v2]
    }
}

/// Flattened scene representation for fast indexed access during simulation.
#[derive(Debug, Clone)]
pub struct FlatScene {
    /// All vertices in the scene.
    pub vertices: Vec<Point>,
    /// Triangles with surface ids.
    pub triangles: Vec<Triangle>,
    /// Surface materials, indexed by `Triangle::surface`.
    pub surfaces: Vec<AcousticMaterial>,
    /// Scene bounding box minimum.
    pub bbox_min: Point,
    /// Scene bounding box maximum.
    pub bbox_max: Point,
}

impl FlatScene {
    /// Creates a flat scene, checking that every index is in range.
    pub fn new(
        vertices: Vec<Point>,
        triangles: Vec<Triangle>,
        surfaces: Vec<AcousticMaterial>,
    ) -> Result<Self> {
        for (i, tri) in triangles.iter().enumerate() {
            if let Some(v) = tri.indices().iter().find(|&&v| v >= vertices.len()) {
                return Err(anyhow!(
                    "Triangle {} references vertex {} but the scene has {} vertices",
                    i,
                    v,
                    vertices.len()
                ));
            }
            if tri.surface >= surfaces.len() {
                return Err(anyhow!(
                    "Triangle {} references surface {} but the scene has {} surfaces",
                    i,
                    tri.surface,
                    surfaces.len()
                ));
            }
        }
        let (bbox_min, bbox_max) = bounding_box(&vertices);

        Ok(Self {
            vertices,
            triangles,
            surfaces,
            bbox_min,
            bbox_max,
        })
    }

    /// Creates an axis-aligned box room of size `x` by `y` by `z`.
    ///
    /// `surfaces` holds either one material for all faces or six materials
    /// in face order: floor (-z), ceiling (+z), then walls at -y, +x, +y, -x.
    /// Triangles are wound so that their normals point into the room.
    pub fn from_box(
        x: f64,
        y: f64,
        z: f64,
        origin: Option<(f64, f64, f64)>,
        surfaces: Vec<AcousticMaterial>,
    ) -> Result<Self> {
        if !(x > 0. && y > 0. && z > 0.) {
            return Err(anyhow!("Box dimensions must be positive: {} x {} x {}", x, y, z));
        }
        let face_surface: [usize; 6] = match surfaces.len() {
            1 => [0; 6],
            6 => [0, 1, 2, 3, 4, 5],
            n => {
                return Err(anyhow!(
                    "Box needs 1 or 6 surface materials, got {}",
                    n
                ));
            }
        };
        let (ox, oy, oz) = origin.unwrap_or((0., 0., 0.));
        let vertices = vec![
            Point::new(ox, oy, oz),
            Point::new(ox + x, oy, oz),
            Point::new(ox + x, oy + y, oz),
            Point::new(ox, oy + y, oz),
            Point::new(ox, oy, oz + z),
            Point::new(ox + x, oy, oz + z),
            Point::new(ox + x, oy + y, oz + z),
            Point::new(ox, oy + y, oz + z),
        ];
        // Two triangles per face
        let faces: [[[usize; 3]; 2]; 6] = [
            [[0, 1, 2], [0, 2, 3]], // floor
            [[4, 6, 5], [4, 7, 6]], // ceiling
            [[0, 5, 1], [0, 4, 5]], // wall_0
            [[1, 6, 2], [1, 5, 6]], // wall_1
            [[2, 7, 3], [2, 6, 7]], // wall_2
            [[3, 4, 0], [3, 7, 4]], // wall_3
        ];
        let triangles = faces
            .iter()
            .zip(face_surface)
            .flat_map(|(pair, surface)| {
                pair.iter()
                    .map(move |[a, b, c]| Triangle::new(*a, *b, *c, surface))
            })
            .collect();

        Self::new(vertices, triangles, surfaces)
    }

    /// Corner points of triangle `index`.
    pub fn triangle_points(&self, index: usize) -> [Point; 3] {
        let tri = &self.triangles[index];
        [
            self.vertices[tri.v0],
            self.vertices[tri.v1],
            self.vertices[tri.v2],
        ]
    }

    /// Squared distance from a point to triangle `index`.
    pub fn distance_squared_to_triangle(&self, index: usize, ptest: Point) -> f64 {
        let [p0, p1, p2] = self.triangle_points(index);
        point_triangle_distance_squared(ptest, p0, p1, p2)
    }

    /// Returns the scene as a closed boundary for mesh construction.
    pub fn to_boundary(&self) -> Result<MeshBoundary> {
        MeshBoundary::new(
            self.vertices.clone(),
            self.triangles.iter().map(|t| t.indices()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::boundary::Boundary;

    #[test]
    fn test_from_box_one_surface() -> Result<()> {
        let scene = FlatScene::from_box(2., 3., 4., None, vec![AcousticMaterial::rigid("all")])?;
        assert_eq!(scene.vertices.len(), 8);
        assert_eq!(scene.triangles.len(), 12);
        assert!(scene.triangles.iter().all(|t| t.surface == 0));
        assert!(scene.bbox_max.is_close(&Point::new(2., 3., 4.)));
        Ok(())
    }

    #[test]
    fn test_from_box_six_surfaces() -> Result<()> {
        let surfaces = (0..6)
            .map(|i| AcousticMaterial::uniform(&format!("s{}", i), 0.1 * i as f64, 0.))
            .collect();
        let scene = FlatScene::from_box(1., 1., 1., Some((-1., -1., -1.)), surfaces)?;
        // Triangles of the ceiling lie at z = 0 (origin shifted by -1)
        for t in scene.triangles.iter().filter(|t| t.surface == 1) {
            for i in t.indices() {
                assert!((scene.vertices[i].z - 0.).abs() < 1e-12);
            }
        }
        // Triangles of wall_1 lie at x = 0
        for t in scene.triangles.iter().filter(|t| t.surface == 3) {
            for i in t.indices() {
                assert!((scene.vertices[i].x - 0.).abs() < 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_from_box_rejects_wrong_surface_count() {
        let surfaces = vec![AcousticMaterial::rigid("a"), AcousticMaterial::rigid("b")];
        assert!(FlatScene::from_box(1., 1., 1., None, surfaces).is_err());
    }

    #[test]
    fn test_new_rejects_bad_surface() {
        let vertices = vec![
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(0., 1., 0.),
        ];
        let triangles = vec![Triangle::new(0, 1, 2, 3)];
        let res = FlatScene::new(vertices, triangles, vec![AcousticMaterial::rigid("a")]);
        assert!(res.is_err());
    }

    #[test]
    fn test_box_scene_as_boundary() -> Result<()> {
        let scene = FlatScene::from_box(2., 2., 2., None, vec![AcousticMaterial::rigid("all")])?;
        let boundary = scene.to_boundary()?;
        assert!(boundary.inside(Point::new(1., 1., 1.)));
        assert!(!boundary.inside(Point::new(1., 1., 3.)));
        Ok(())
    }
}

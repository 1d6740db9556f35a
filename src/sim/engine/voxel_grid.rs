use crate::Point;
use crate::geom::EPS;
use crate::geom::bboxes::{
    are_bboxes_overlapping, bbox_diagonal, bounding_box, min_dist_to_bbox_squared,
};
use crate::sim::engine::FlatScene;

/// Factor by which the search radius grows between passes.
const RADIUS_GROWTH: f64 = 1.6;

/// Uniform `side`^3 partition of the scene bounding box.
///
/// Each voxel holds the indices of the triangles whose bounding box
/// overlaps the voxel.
pub struct VoxelGrid<'a> {
    scene: &'a FlatScene,
    side: usize,
    voxel_size: [f64; 3],
    voxels: Vec<Vec<usize>>,
}

impl<'a> VoxelGrid<'a> {
    pub fn new(scene: &'a FlatScene, side: usize) -> Self {
        let side = side.max(1);
        let extent = [
            (scene.bbox_max.x - scene.bbox_min.x).max(EPS),
            (scene.bbox_max.y - scene.bbox_min.y).max(EPS),
            (scene.bbox_max.z - scene.bbox_min.z).max(EPS),
        ];
        let voxel_size = extent.map(|e| e / side as f64);
        let mut grid = Self {
            scene,
            side,
            voxel_size,
            voxels: vec![Vec::new(); side * side * side],
        };
        if scene.triangles.is_empty() {
            return grid;
        }

        for idx in 0..scene.triangles.len() {
            let (tmin, tmax) = bounding_box(&scene.triangle_points(idx));
            let lo = grid.voxel_coords(tmin);
            let hi = grid.voxel_coords(tmax);
            // Widen by one voxel so that touching boxes are also tested
            for i in lo[0].saturating_sub(1)..=(hi[0] + 1).min(side - 1) {
                for j in lo[1].saturating_sub(1)..=(hi[1] + 1).min(side - 1) {
                    for k in lo[2].saturating_sub(1)..=(hi[2] + 1).min(side - 1) {
                        let (vmin, vmax) = grid.voxel_aabb([i, j, k]);
                        if are_bboxes_overlapping(vmin, vmax, tmin, tmax) {
                            let flat = grid.flat_index([i, j, k]);
                            grid.voxels[flat].push(idx);
                        }
                    }
                }
            }
        }

        grid
    }

    pub fn scene(&self) -> &'a FlatScene {
        self.scene
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// Triangle indices stored in voxel `(i, j, k)`.
    pub fn voxel(&self, coords: [usize; 3]) -> &[usize] {
        &self.voxels[self.flat_index(coords)]
    }

    fn flat_index(&self, [i, j, k]: [usize; 3]) -> usize {
        i + j * self.side + k * self.side * self.side
    }

    /// Voxel containing `pt`, clamped to the grid.
    fn voxel_coords(&self, pt: Point) -> [usize; 3] {
        let min = self.scene.bbox_min;
        let rel = [pt.x - min.x, pt.y - min.y, pt.z - min.z];
        let mut out = [0; 3];
        for axis in 0..3 {
            let v = (rel[axis] / self.voxel_size[axis]).floor();
            out[axis] = if v <= 0. {
                0
            } else {
                (v as usize).min(self.side - 1)
            };
        }
        out
    }

    fn voxel_aabb(&self, [i, j, k]: [usize; 3]) -> (Point, Point) {
        let min = self.scene.bbox_min;
        let [sx, sy, sz] = self.voxel_size;
        let vmin = Point::new(
            min.x + i as f64 * sx,
            min.y + j as f64 * sy,
            min.z + k as f64 * sz,
        );
        let vmax = Point::new(vmin.x + sx, vmin.y + sy, vmin.z + sz);
        (vmin, vmax)
    }

    /// Returns the index of the triangle closest to `pt`.
    ///
    /// The search starts with a radius of one voxel diagonal around the voxel
    /// containing `pt` and grows it by `RADIUS_GROWTH` until some triangle lies
    /// within the radius. Only voxels whose box is within the radius are
    /// scanned. Returns `None` for an empty scene, or when nothing is found
    /// within the scene diagonal (plus the distance from `pt` to the scene).
    pub fn closest_triangle(&self, pt: Point) -> Option<usize> {
        if self.scene.triangles.is_empty() || !pt.is_finite() {
            return None;
        }
        let [sx, sy, sz] = self.voxel_size;
        let voxel_diagonal = (sx * sx + sy * sy + sz * sz).sqrt();
        let max_radius = bbox_diagonal(self.scene.bbox_min, self.scene.bbox_max)
            + min_dist_to_bbox_squared(pt, self.scene.bbox_min, self.scene.bbox_max).sqrt();
        let centre = self.voxel_coords(pt);

        let mut radius = voxel_diagonal;
        loop {
            let r = radius.min(max_radius);
            if let Some(found) = self.search_within(pt, centre, r) {
                return Some(found);
            }
            if r >= max_radius {
                return None;
            }
            radius *= RADIUS_GROWTH;
        }
    }

    /// Closest triangle with distance at most `radius`, scanning the voxels
    /// around `centre` whose box lies within `radius` of `pt`.
    fn search_within(&self, pt: Point, centre: [usize; 3], radius: f64) -> Option<usize> {
        let r2 = radius * radius;
        let mut range = [(0, 0); 3];
        for axis in 0..3 {
            let reach = (radius / self.voxel_size[axis]).ceil();
            let reach = if reach >= self.side as f64 {
                self.side
            } else {
                reach as usize
            };
            range[axis] = (
                centre[axis].saturating_sub(reach),
                (centre[axis] + reach).min(self.side - 1),
            );
        }

        let mut best: Option<(usize, f64)> = None;
        for k in range[2].0..=range[2].1 {
            for j in range[1].0..=range[1].1 {
                for i in range[0].0..=range[0].1 {
                    let (vmin, vmax) = self.voxel_aabb([i, j, k]);
                    if min_dist_to_bbox_squared(pt, vmin, vmax) > r2 {
                        continue;
                    }
                    for &idx in self.voxel([i, j, k]) {
                        let d2 = self.scene.distance_squared_to_triangle(idx, pt);
                        if d2 > r2 {
                            continue;
                        }
                        let better = match best {
                            None => true,
                            Some((best_idx, best_d2)) => {
                                d2 < best_d2 || (d2 == best_d2 && idx < best_idx)
                            }
                        };
                        if better {
                            best = Some((idx, d2));
                        }
                    }
                }
            }
        }
        best.map(|(idx, _)| idx)
    }
}

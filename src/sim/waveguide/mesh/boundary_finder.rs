//! Resolves which surface each rectangular boundary node represents.
//!
//! Planar nodes ask the voxel grid for their nearest triangle. Edge and
//! corner nodes copy the surface of the first nearby 1-D node in offset
//! order, so the expensive nearest-triangle query runs only once per planar
//! node.

use rayon::prelude::*;
use tracing::debug;

use crate::sim::engine::voxel_grid::VoxelGrid;
use crate::sim::waveguide::error::{Result, WaveguideError};
use crate::sim::waveguide::mesh::rectangular::Node;
use crate::sim::waveguide::mesh::{BoundaryClass, Lattice, NO_BOUNDARY};

/// Surface sentinel: no surface was found for this direction.
pub const NO_SURFACE: usize = usize::MAX;

/// Candidate offsets searched for planar neighbors of an edge node.
pub const EDGE_OFFSETS: [[i64; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Candidate offsets searched for planar neighbors of a corner node.
pub const CORNER_OFFSETS: [[i64; 3]; 12] = [
    [-1, -1, 0],
    [-1, 1, 0],
    [1, -1, 0],
    [1, 1, 0],
    [-1, 0, -1],
    [-1, 0, 1],
    [1, 0, -1],
    [1, 0, 1],
    [0, -1, -1],
    [0, -1, 1],
    [0, 1, -1],
    [0, 1, 1],
];

/// Boundary node together with one surface id per missing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryIndex<const N: usize> {
    pub node: usize,
    /// Surface ids in port order of the missing directions, [`NO_SURFACE`]
    /// for directions that could not be resolved.
    pub surfaces: [usize; N],
}

/// Surface assignments of all planar, edge and corner nodes.
///
/// A node's `boundary_index` indexes the array matching its class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryIndexData {
    pub planar: Vec<BoundaryIndex<1>>,
    pub edge: Vec<BoundaryIndex<2>>,
    pub corner: Vec<BoundaryIndex<3>>,
}

/// Node with exactly one set bit: planar or reentrant.
fn is_one_dimensional(node: &Node) -> bool {
    node.inside && node.boundary_type.popcount() == 1
}

pub fn compute_boundary_index_data(
    nodes: &mut [Node],
    lattice: &Lattice,
    grid: &VoxelGrid,
) -> Result<BoundaryIndexData> {
    // Provisional 1-D numbering, reentrant nodes included
    let provisional: Vec<usize> = (0..nodes.len())
        .filter(|&i| is_one_dimensional(&nodes[i]))
        .collect();

    let scene = grid.scene();
    let surfaces: Vec<Option<usize>> = provisional
        .par_iter()
        .map(|&i| {
            grid.closest_triangle(nodes[i].position)
                .map(|t| scene.triangles[t].surface)
        })
        .collect();

    let mut surface_of = vec![NO_SURFACE; nodes.len()];
    for (&i, surface) in provisional.iter().zip(surfaces.iter()) {
        match surface {
            Some(s) => surface_of[i] = *s,
            None => {
                return Err(WaveguideError::geometry(format!(
                    "no triangle found near boundary node {} at {}",
                    i, nodes[i].position
                )));
            }
        }
    }

    let mut data = BoundaryIndexData::default();
    let mut skipped = 0;
    for i in 0..nodes.len() {
        let node = nodes[i];
        if !node.inside {
            continue;
        }
        match node.class() {
            BoundaryClass::Interior | BoundaryClass::Reentrant => {
                nodes[i].boundary_index = NO_BOUNDARY;
            }
            BoundaryClass::Planar => {
                nodes[i].boundary_index = data.planar.len();
                data.planar.push(BoundaryIndex {
                    node: i,
                    surfaces: [surface_of[i]],
                });
            }
            BoundaryClass::Edge => {
                let surfaces = propagate::<2>(nodes, lattice, &surface_of, i, &EDGE_OFFSETS);
                skipped += surfaces.iter().filter(|&&s| s == NO_SURFACE).count();
                nodes[i].boundary_index = data.edge.len();
                data.edge.push(BoundaryIndex { node: i, surfaces });
            }
            BoundaryClass::Corner => {
                let surfaces = propagate::<3>(nodes, lattice, &surface_of, i, &CORNER_OFFSETS);
                skipped += surfaces.iter().filter(|&&s| s == NO_SURFACE).count();
                nodes[i].boundary_index = data.corner.len();
                data.corner.push(BoundaryIndex { node: i, surfaces });
            }
        }
    }

    debug!(
        "Boundary index data: {} planar, {} edge, {} corner ({} of {} provisional planar nodes reentrant, {} directions unresolved)",
        data.planar.len(),
        data.edge.len(),
        data.corner.len(),
        provisional.len() - data.planar.len(),
        provisional.len(),
        skipped,
    );
    Ok(data)
}

/// Surface of the first 1-D node (planar or reentrant) around node `index`,
/// in `offsets` order, copied to every missing direction. The candidate's
/// own orientation is not checked. Without a candidate every slot stays
/// [`NO_SURFACE`].
fn propagate<const N: usize>(
    nodes: &[Node],
    lattice: &Lattice,
    surface_of: &[usize],
    index: usize,
    offsets: &[[i64; 3]],
) -> [usize; N] {
    let locator = lattice.locator(index);
    let found = offsets.iter().find_map(|offset| {
        let j = lattice.index(lattice.neighbor(locator, *offset)?);
        is_one_dimensional(&nodes[j]).then(|| surface_of[j])
    });
    [found.unwrap_or(NO_SURFACE); N]
}

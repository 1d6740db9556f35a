//! Tetrahedral (4-connected, diamond lattice) waveguide mesh.
//!
//! Space is tiled with cubes of side `4 * spacing / sqrt(3)`, each holding
//! eight nodes. Offsets below are in quarters of the cube side. Nodes of
//! type A link to type B nodes along `A_DELTAS` and vice versa, so every
//! link has length `spacing`.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::Point;
use crate::geom::boundary::Boundary;
use crate::sim::waveguide::error::{Result, WaveguideError};
use crate::sim::waveguide::mesh::{Lattice, NO_NEIGHBOR};

const NODES_PER_CUBE: usize = 8;

/// Subnode offsets within a cube; the first four are type A.
const SUBNODE_OFFSETS: [[i64; 3]; NODES_PER_CUBE] = [
    [0, 0, 0],
    [2, 2, 0],
    [0, 2, 2],
    [2, 0, 2],
    [1, 1, 1],
    [3, 3, 1],
    [1, 3, 3],
    [3, 1, 3],
];

const A_DELTAS: [[i64; 3]; TetrahedralMesh::PORTS] =
    [[1, 1, 1], [-1, -1, 1], [-1, 1, -1], [1, -1, -1]];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TetrahedralNode {
    pub position: Point,
    pub inside: bool,
    pub ports: [usize; TetrahedralMesh::PORTS],
}

#[derive(Debug, Clone)]
pub struct TetrahedralMesh {
    /// Lattice of cubes.
    cubes: Lattice,
    spacing: f64,
    nodes: Vec<TetrahedralNode>,
}

/// Delta in quarter units for port `port` of a node with subnode index `sub`.
fn port_delta(sub: usize, port: usize) -> [i64; 3] {
    let d = A_DELTAS[port];
    if sub < 4 { d } else { [-d[0], -d[1], -d[2]] }
}

impl TetrahedralMesh {
    pub const PORTS: usize = 4;

    pub fn new(boundary: &dyn Boundary, spacing: f64, anchor: Point) -> Result<Self> {
        let cube_side = 4.0 * spacing / 3.0_f64.sqrt();
        let cubes = Lattice::new(boundary, cube_side, anchor)?;
        let num_nodes = cubes
            .num_cells()
            .checked_mul(NODES_PER_CUBE)
            .ok_or_else(|| {
                WaveguideError::config(format!(
                    "tetrahedral lattice of {:?} cubes is too large",
                    cubes.dims
                ))
            })?;

        let positions: Vec<Point> = (0..num_nodes)
            .map(|i| Self::position_in(&cubes, i))
            .collect();
        let inside: Vec<bool> = positions
            .par_iter()
            .map(|p| boundary.inside(*p))
            .collect();

        let nodes: Vec<TetrahedralNode> = (0..num_nodes)
            .into_par_iter()
            .map(|i| {
                let mut ports = [NO_NEIGHBOR; Self::PORTS];
                if inside[i] {
                    for (port, slot) in ports.iter_mut().enumerate() {
                        if let Some(j) = Self::neighbor_in(&cubes, i, port) {
                            if inside[j] {
                                *slot = j;
                            }
                        }
                    }
                }
                TetrahedralNode {
                    position: positions[i],
                    inside: inside[i],
                    ports,
                }
            })
            .collect();

        let mesh = Self {
            cubes,
            spacing,
            nodes,
        };
        debug!(
            "Tetrahedral mesh {:?} cubes: {} nodes, {} inside",
            mesh.cubes.dims,
            mesh.nodes.len(),
            mesh.num_inside()
        );
        Ok(mesh)
    }

    fn position_in(cubes: &Lattice, index: usize) -> Point {
        let corner = cubes.position(cubes.locator(index / NODES_PER_CUBE));
        let quarter = cubes.spacing / 4.0;
        let o = SUBNODE_OFFSETS[index % NODES_PER_CUBE];
        Point::new(
            corner.x + o[0] as f64 * quarter,
            corner.y + o[1] as f64 * quarter,
            corner.z + o[2] as f64 * quarter,
        )
    }

    fn neighbor_in(cubes: &Lattice, index: usize, port: usize) -> Option<usize> {
        let sub = index % NODES_PER_CUBE;
        let cube = cubes.locator(index / NODES_PER_CUBE);
        let offset = SUBNODE_OFFSETS[sub];
        let delta = port_delta(sub, port);
        let target: [i64; 3] = std::array::from_fn(|a| offset[a] + delta[a]);
        let shift = target.map(|t| t.div_euclid(4));
        let wrapped = target.map(|t| t.rem_euclid(4));
        let cube = cubes.neighbor(cube, shift)?;
        let sub = SUBNODE_OFFSETS.iter().position(|o| *o == wrapped)?;
        Some(cubes.index(cube) * NODES_PER_CUBE + sub)
    }

    /// Distance between linked nodes.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn nodes(&self) -> &[TetrahedralNode] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_inside(&self) -> usize {
        self.nodes.iter().filter(|n| n.inside).count()
    }

    /// Index of the node nearest to `pt`, searching the cubes around the
    /// one `pt` falls in.
    pub fn index_for_coordinate(&self, pt: Point) -> usize {
        let centre = self.cubes.nearest_locator(pt);
        let mut best = (0, f64::INFINITY);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let Some(cube) = self.cubes.neighbor(centre, [dx, dy, dz]) else {
                        continue;
                    };
                    let first = self.cubes.index(cube) * NODES_PER_CUBE;
                    for i in first..first + NODES_PER_CUBE {
                        let d2 = self.nodes[i].position.distance_squared(&pt);
                        if d2 < best.1 || (d2 == best.1 && i < best.0) {
                            best = (i, d2);
                        }
                    }
                }
            }
        }
        best.0
    }

    pub fn coordinate_for_index(&self, index: usize) -> Point {
        self.nodes[index].position
    }

    pub fn inside(&self, index: usize) -> bool {
        self.nodes[index].inside
    }

    pub fn ports(&self, index: usize) -> &[usize] {
        &self.nodes[index].ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::boundary::CuboidBoundary;

    fn mesh() -> anyhow::Result<TetrahedralMesh> {
        let boundary = CuboidBoundary::new(Point::new(0., 0., 0.), Point::new(2., 2., 2.))?;
        Ok(TetrahedralMesh::new(&boundary, 0.25, Point::new(1., 1., 1.))?)
    }

    #[test]
    fn test_links_have_spacing_length() -> anyhow::Result<()> {
        let mesh = mesh()?;
        assert!(mesh.num_inside() > 0);
        for node in mesh.nodes() {
            for &j in node.ports.iter().filter(|&&j| j != NO_NEIGHBOR) {
                let d = node.position.distance(&mesh.nodes()[j].position);
                assert!((d - 0.25).abs() < 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn test_links_are_symmetric() -> anyhow::Result<()> {
        let mesh = mesh()?;
        for (i, node) in mesh.nodes().iter().enumerate() {
            for &j in node.ports.iter().filter(|&&j| j != NO_NEIGHBOR) {
                assert!(mesh.ports(j).contains(&i));
            }
        }
        Ok(())
    }

    #[test]
    fn test_deep_interior_nodes_have_four_neighbors() -> anyhow::Result<()> {
        let mesh = mesh()?;
        let centre = mesh.index_for_coordinate(Point::new(1., 1., 1.));
        assert!(mesh.coordinate_for_index(centre).is_close(&Point::new(1., 1., 1.)));
        assert!(mesh.inside(centre));
        assert!(mesh.ports(centre).iter().all(|&p| p != NO_NEIGHBOR));
        Ok(())
    }

    #[test]
    fn test_outside_nodes_have_no_ports() -> anyhow::Result<()> {
        let mesh = mesh()?;
        for node in mesh.nodes().iter().filter(|n| !n.inside) {
            assert!(node.ports.iter().all(|&p| p == NO_NEIGHBOR));
        }
        Ok(())
    }
}

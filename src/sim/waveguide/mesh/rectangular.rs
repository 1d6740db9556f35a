//! Rectangular (6-connected) waveguide mesh.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::Point;
use crate::geom::boundary::Boundary;
use crate::sim::engine::voxel_grid::VoxelGrid;
use crate::sim::waveguide::error::Result;
use crate::sim::waveguide::mesh::boundary_finder::{
    BoundaryIndexData, compute_boundary_index_data,
};
use crate::sim::waveguide::mesh::{
    BoundaryClass, BoundaryType, Lattice, NO_BOUNDARY, NO_NEIGHBOR, PORT_OFFSETS,
};

/// A single pressure node of the rectangular mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Node {
    pub position: Point,
    pub inside: bool,
    pub boundary_type: BoundaryType,
    /// Slot in the boundary array of this node's class, or [`NO_BOUNDARY`].
    pub boundary_index: usize,
    /// Neighbor node indices in port order, [`NO_NEIGHBOR`] where absent.
    pub ports: [usize; RectangularMesh::PORTS],
}

impl Node {
    fn outside(position: Point) -> Self {
        Self {
            position,
            inside: false,
            boundary_type: BoundaryType::default(),
            boundary_index: NO_BOUNDARY,
            ports: [NO_NEIGHBOR; RectangularMesh::PORTS],
        }
    }

    pub fn class(&self) -> BoundaryClass {
        self.boundary_type.class()
    }
}

#[derive(Debug, Clone)]
pub struct RectangularMesh {
    lattice: Lattice,
    nodes: Vec<Node>,
}

impl RectangularMesh {
    pub const PORTS: usize = 6;

    /// Lays out a lattice over the boundary and links every inside node to
    /// its inside axial neighbors.
    pub fn new(boundary: &dyn Boundary, spacing: f64, anchor: Point) -> Result<Self> {
        let lattice = Lattice::new(boundary, spacing, anchor)?;
        let num_cells = lattice.num_cells();

        let inside: Vec<bool> = (0..num_cells)
            .into_par_iter()
            .map(|i| boundary.inside(lattice.position(lattice.locator(i))))
            .collect();

        let nodes: Vec<Node> = (0..num_cells)
            .into_par_iter()
            .map(|i| {
                let locator = lattice.locator(i);
                let position = lattice.position(locator);
                if !inside[i] {
                    return Node::outside(position);
                }
                let mut ports = [NO_NEIGHBOR; Self::PORTS];
                let mut missing = 0u8;
                for (port, offset) in PORT_OFFSETS.iter().enumerate() {
                    match lattice.neighbor(locator, *offset).map(|l| lattice.index(l)) {
                        Some(j) if inside[j] => ports[port] = j,
                        _ => missing |= 1 << port,
                    }
                }
                Node {
                    position,
                    inside: true,
                    boundary_type: BoundaryType::from_missing(missing),
                    boundary_index: NO_BOUNDARY,
                    ports,
                }
            })
            .collect();

        let mesh = Self { lattice, nodes };
        debug!(
            "Rectangular mesh {:?}: {} nodes, {} inside ({} planar, {} edge, {} corner, {} reentrant)",
            mesh.lattice.dims,
            mesh.nodes.len(),
            mesh.num_inside(),
            mesh.count_class(BoundaryClass::Planar),
            mesh.count_class(BoundaryClass::Edge),
            mesh.count_class(BoundaryClass::Corner),
            mesh.count_class(BoundaryClass::Reentrant),
        );
        Ok(mesh)
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_inside(&self) -> usize {
        self.nodes.iter().filter(|n| n.inside).count()
    }

    /// Number of inside nodes of the given class.
    pub fn count_class(&self, class: BoundaryClass) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.inside && n.class() == class)
            .count()
    }

    /// Index of the lattice node nearest to `pt` (clamped to the lattice).
    pub fn index_for_coordinate(&self, pt: Point) -> usize {
        self.lattice.index(self.lattice.nearest_locator(pt))
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

    /// Resolves the surface behind every boundary node and assigns the
    /// nodes' boundary indices.
    pub fn compute_boundary_index_data(&mut self, grid: &VoxelGrid) -> Result<BoundaryIndexData> {
        compute_boundary_index_data(&mut self.nodes, &self.lattice, grid)
    }
}

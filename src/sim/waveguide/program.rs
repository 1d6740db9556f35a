//! Per-topology update kernels.
//!
//! A program owns a mesh plus whatever per-node state its kernel mutates
//! (boundary filter memory for rectangular meshes) and advances the whole
//! pressure field by one step when dispatched.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::Point;
use crate::geom::boundary::Boundary;
use crate::sim::engine::FlatScene;
use crate::sim::engine::voxel_grid::VoxelGrid;
use crate::sim::materials::AcousticMaterial;
use crate::sim::waveguide::compute::ComputeContext;
use crate::sim::waveguide::config::{COURANT_SQUARED, WaveguideConfig};
use crate::sim::waveguide::error::{Result, WaveguideError};
use crate::sim::waveguide::filters::{
    CanonicalCoefficients, FilterMemory, FILTER_ORDER, filter_step, to_filter_coefficients_all,
};
use crate::sim::waveguide::mesh::boundary_finder::{BoundaryIndex, BoundaryIndexData, NO_SURFACE};
use crate::sim::waveguide::mesh::rectangular::{Node, RectangularMesh};
use crate::sim::waveguide::mesh::tetrahedral::TetrahedralMesh;
use crate::sim::waveguide::mesh::{BoundaryClass, NO_BOUNDARY, NO_NEIGHBOR};

/// Rigid node weight of the tetrahedral mesh.
const TETRAHEDRAL_WEIGHT: f64 = 0.5;

/// Operations the run loop needs from a mesh topology.
pub trait MeshProgram: Send + Sync {
    fn num_nodes(&self) -> usize;

    fn index_for_coordinate(&self, pt: Point) -> usize;

    fn coordinate_for_index(&self, index: usize) -> Point;

    fn inside(&self, index: usize) -> bool;

    /// Neighbor indices of a node, [`NO_NEIGHBOR`] where absent.
    fn ports(&self, index: usize) -> &[usize];

    /// Sample rate the mesh spacing was chosen for.
    fn sample_rate(&self) -> f64;

    /// Clears all per-node state mutated by `run_step`.
    fn reset(&mut self);

    /// Writes the next pressure field over `previous`, reading `current`.
    fn run_step(
        &mut self,
        ctx: &ComputeContext,
        previous: &mut [f64],
        current: &[f64],
    ) -> Result<()>;
}

fn check_buffers(num_nodes: usize, previous: &[f64], current: &[f64]) -> Result<()> {
    if previous.len() != num_nodes || current.len() != num_nodes {
        return Err(WaveguideError::resource(format!(
            "buffer sizes {} and {} do not match {} mesh nodes",
            previous.len(),
            current.len(),
            num_nodes
        )));
    }
    Ok(())
}

/// Lossless update from the graph Laplacian over present neighbors.
/// Missing neighbors act as rigid walls.
fn rigid_update(index: usize, ports: &[usize], weight: f64, previous: f64, current: &[f64]) -> f64 {
    let p = current[index];
    let sum_diff: f64 = ports
        .iter()
        .filter(|&&j| j != NO_NEIGHBOR)
        .map(|&j| current[j] - p)
        .sum();
    2.0 * p + weight * sum_diff - previous
}

/// Filter state of one boundary face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryData {
    pub filter_memory: FilterMemory,
    /// Admittance coefficients in use, `None` for an unresolved direction.
    pub coefficient_index: Option<usize>,
}

impl BoundaryData {
    fn new(surface: usize) -> Self {
        Self {
            filter_memory: [0.0; FILTER_ORDER],
            coefficient_index: (surface != NO_SURFACE).then_some(surface),
        }
    }
}

/// Boundary node with one filter per missing direction, plus its staged
/// next pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryDataArray<const N: usize> {
    pub node: usize,
    pub faces: [BoundaryData; N],
    pub staged: f64,
}

impl<const N: usize> BoundaryDataArray<N> {
    fn from_index(index: &BoundaryIndex<N>) -> Self {
        Self {
            node: index.node,
            faces: index.surfaces.map(BoundaryData::new),
            staged: 0.0,
        }
    }

    fn reset(&mut self) {
        for face in &mut self.faces {
            face.filter_memory = [0.0; FILTER_ORDER];
        }
        self.staged = 0.0;
    }

    /// Solves the filtered boundary update for this node, stores it in
    /// `staged` and advances every face filter with the new velocity term.
    fn stage(
        &mut self,
        node: &Node,
        admittance: &[CanonicalCoefficients],
        previous: &[f64],
        current: &[f64],
    ) {
        let lambda = COURANT_SQUARED.sqrt();
        let p = current[self.node];
        let p_prev = previous[self.node];
        let sum_diff: f64 = node
            .ports
            .iter()
            .filter(|&&j| j != NO_NEIGHBOR)
            .map(|&j| current[j] - p)
            .sum();

        let (b_sum, s_sum) = self
            .faces
            .iter()
            .filter_map(|f| f.coefficient_index.map(|c| (admittance[c].b[0], f.filter_memory[0])))
            .fold((0.0, 0.0), |(b, s), (b0, s0)| (b + b0, s + s0));

        let half = lambda * b_sum / 2.0;
        let next = (2.0 * p + COURANT_SQUARED * sum_diff - (1.0 - half) * p_prev - lambda * s_sum)
            / (1.0 + half);

        let u = (next - p_prev) / 2.0;
        for face in &mut self.faces {
            if let Some(c) = face.coefficient_index {
                filter_step(u, &mut face.filter_memory, &admittance[c]);
            }
        }
        self.staged = next;
    }
}

/// Rectangular mesh with frequency-dependent boundaries.
pub struct RectangularProgram {
    mesh: RectangularMesh,
    sample_rate: f64,
    /// Admittance form of each surface's impedance filter, by surface id.
    admittance: Vec<CanonicalCoefficients>,
    boundary_1: Vec<BoundaryDataArray<1>>,
    boundary_2: Vec<BoundaryDataArray<2>>,
    boundary_3: Vec<BoundaryDataArray<3>>,
}

impl RectangularProgram {
    /// Builds a program from a mesh whose boundary indices have been
    /// assigned, synthesizing one filter per surface.
    pub fn new(
        mesh: RectangularMesh,
        data: &BoundaryIndexData,
        surfaces: &[AcousticMaterial],
        sample_rate: f64,
    ) -> Result<Self> {
        let admittance: Vec<CanonicalCoefficients> =
            to_filter_coefficients_all(surfaces, sample_rate)?
                .iter()
                .map(|c| c.admittance())
                .collect();

        let faces = data.planar.iter().flat_map(|e| e.surfaces.iter());
        let faces = faces
            .chain(data.edge.iter().flat_map(|e| e.surfaces.iter()))
            .chain(data.corner.iter().flat_map(|e| e.surfaces.iter()));
        for &surface in faces {
            if surface != NO_SURFACE && surface >= surfaces.len() {
                return Err(WaveguideError::config(format!(
                    "boundary references surface {} but only {} surfaces exist",
                    surface,
                    surfaces.len()
                )));
            }
        }

        Ok(Self {
            mesh,
            sample_rate,
            admittance,
            boundary_1: data.planar.iter().map(BoundaryDataArray::from_index).collect(),
            boundary_2: data.edge.iter().map(BoundaryDataArray::from_index).collect(),
            boundary_3: data.corner.iter().map(BoundaryDataArray::from_index).collect(),
        })
    }

    /// Program where every boundary node is rigid.
    pub fn rigid(mesh: RectangularMesh, sample_rate: f64) -> Self {
        Self {
            mesh,
            sample_rate,
            admittance: Vec::new(),
            boundary_1: Vec::new(),
            boundary_2: Vec::new(),
            boundary_3: Vec::new(),
        }
    }

    /// Builds mesh, boundary data and filters for a closed scene.
    pub fn from_scene(scene: &FlatScene, config: &WaveguideConfig) -> Result<Self> {
        config.validate()?;
        let boundary = scene
            .to_boundary()
            .map_err(|e| WaveguideError::geometry(e.to_string()))?;
        let mut mesh = RectangularMesh::new(&boundary, config.spacing, config.anchor)?;
        let grid = VoxelGrid::new(scene, config.voxel_subdivisions);
        let data = mesh.compute_boundary_index_data(&grid)?;
        info!(
            "Rectangular program: {} nodes ({} inside), {} surfaces, sample rate {:.1} Hz",
            mesh.num_nodes(),
            mesh.num_inside(),
            scene.surfaces.len(),
            config.sample_rate()
        );
        Self::new(mesh, &data, &scene.surfaces, config.sample_rate())
    }

    pub fn mesh(&self) -> &RectangularMesh {
        &self.mesh
    }

    pub fn admittance(&self) -> &[CanonicalCoefficients] {
        &self.admittance
    }

    pub fn boundary_1(&self) -> &[BoundaryDataArray<1>] {
        &self.boundary_1
    }

    pub fn boundary_2(&self) -> &[BoundaryDataArray<2>] {
        &self.boundary_2
    }

    pub fn boundary_3(&self) -> &[BoundaryDataArray<3>] {
        &self.boundary_3
    }
}

impl MeshProgram for RectangularProgram {
    fn num_nodes(&self) -> usize {
        self.mesh.num_nodes()
    }

    fn index_for_coordinate(&self, pt: Point) -> usize {
        self.mesh.index_for_coordinate(pt)
    }

    fn coordinate_for_index(&self, index: usize) -> Point {
        self.mesh.coordinate_for_index(index)
    }

    fn inside(&self, index: usize) -> bool {
        self.mesh.inside(index)
    }

    fn ports(&self, index: usize) -> &[usize] {
        self.mesh.ports(index)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn reset(&mut self) {
        self.boundary_1.iter_mut().for_each(BoundaryDataArray::reset);
        self.boundary_2.iter_mut().for_each(BoundaryDataArray::reset);
        self.boundary_3.iter_mut().for_each(BoundaryDataArray::reset);
    }

    fn run_step(
        &mut self,
        ctx: &ComputeContext,
        previous: &mut [f64],
        current: &[f64],
    ) -> Result<()> {
        check_buffers(self.mesh.num_nodes(), previous, current)?;
        let nodes = self.mesh.nodes();
        let admittance: &[CanonicalCoefficients] = &self.admittance;
        let boundary_1 = &mut self.boundary_1;
        let boundary_2 = &mut self.boundary_2;
        let boundary_3 = &mut self.boundary_3;

        ctx.dispatch(|| {
            // Boundary nodes stage their next value and advance their own
            // filter memory
            {
                let previous: &[f64] = previous;
                boundary_1
                    .par_iter_mut()
                    .for_each(|b| b.stage(&nodes[b.node], admittance, previous, current));
                boundary_2
                    .par_iter_mut()
                    .for_each(|b| b.stage(&nodes[b.node], admittance, previous, current));
                boundary_3
                    .par_iter_mut()
                    .for_each(|b| b.stage(&nodes[b.node], admittance, previous, current));
            }

            let boundary_1 = &*boundary_1;
            let boundary_2 = &*boundary_2;
            let boundary_3 = &*boundary_3;
            previous
                .par_iter_mut()
                .zip(nodes.par_iter())
                .enumerate()
                .for_each(|(i, (out, node))| {
                    if !node.inside {
                        return;
                    }
                    let filtered = node.boundary_index != NO_BOUNDARY;
                    *out = match node.class() {
                        BoundaryClass::Interior => {
                            let sum: f64 = node.ports.iter().map(|&j| current[j]).sum();
                            COURANT_SQUARED * sum - *out
                        }
                        BoundaryClass::Planar if filtered => boundary_1[node.boundary_index].staged,
                        BoundaryClass::Edge if filtered => boundary_2[node.boundary_index].staged,
                        BoundaryClass::Corner if filtered => boundary_3[node.boundary_index].staged,
                        _ => rigid_update(i, &node.ports, COURANT_SQUARED, *out, current),
                    };
                });
        });
        Ok(())
    }
}

/// Tetrahedral mesh with rigid boundaries.
pub struct TetrahedralProgram {
    mesh: TetrahedralMesh,
    sample_rate: f64,
}

impl TetrahedralProgram {
    pub fn new(mesh: TetrahedralMesh, sample_rate: f64) -> Self {
        Self { mesh, sample_rate }
    }

    pub fn from_boundary(boundary: &dyn Boundary, config: &WaveguideConfig) -> Result<Self> {
        config.validate()?;
        let mesh = TetrahedralMesh::new(boundary, config.spacing, config.anchor)?;
        debug!(
            "Tetrahedral program: {} nodes ({} inside)",
            mesh.num_nodes(),
            mesh.num_inside()
        );
        Ok(Self::new(mesh, config.sample_rate()))
    }

    pub fn from_scene(scene: &FlatScene, config: &WaveguideConfig) -> Result<Self> {
        let boundary = scene
            .to_boundary()
            .map_err(|e| WaveguideError::geometry(e.to_string()))?;
        Self::from_boundary(&boundary, config)
    }

    pub fn mesh(&self) -> &TetrahedralMesh {
        &self.mesh
    }
}

impl MeshProgram for TetrahedralProgram {
    fn num_nodes(&self) -> usize {
        self.mesh.num_nodes()
    }

    fn index_for_coordinate(&self, pt: Point) -> usize {
        self.mesh.index_for_coordinate(pt)
    }

    fn coordinate_for_index(&self, index: usize) -> Point {
        self.mesh.coordinate_for_index(index)
    }

    fn inside(&self, index: usize) -> bool {
        self.mesh.inside(index)
    }

    fn ports(&self, index: usize) -> &[usize] {
        self.mesh.ports(index)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn reset(&mut self) {}

    fn run_step(
        &mut self,
        ctx: &ComputeContext,
        previous: &mut [f64],
        current: &[f64],
    ) -> Result<()> {
        check_buffers(self.mesh.num_nodes(), previous, current)?;
        let nodes = self.mesh.nodes();
        ctx.dispatch(|| {
            previous
                .par_iter_mut()
                .zip(nodes.par_iter())
                .enumerate()
                .for_each(|(i, (out, node))| {
                    if node.inside {
                        *out = rigid_update(i, &node.ports, TETRAHEDRAL_WEIGHT, *out, current);
                    }
                });
        });
        Ok(())
    }
}

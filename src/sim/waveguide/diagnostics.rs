//! Optional checks and dumps that callers run outside the step loop.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error};

use crate::Point;
use crate::sim::waveguide::error::{Result, WaveguideError};
use crate::sim::waveguide::program::MeshProgram;
use crate::sim::waveguide::simulation::RunStepResult;

/// Returns a divergence error for the first NaN or Inf in `values`,
/// logging the node and value.
pub fn check_finite(values: &[f64], identifier: &str) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(node) => {
            let value = values[node];
            error!("{}: non-finite value {} at node {}", identifier, value, node);
            Err(WaveguideError::Divergence { node, value })
        }
        None => Ok(()),
    }
}

/// First non-zero value and its index.
pub fn first_nonzero(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .find(|(_, v)| *v != 0.0)
}

/// Scans sampled output for divergence, reporting the first non-zero
/// sample at debug level.
pub fn check_results(results: &[RunStepResult], identifier: &str) -> Result<()> {
    let pressures: Vec<f64> = results.iter().map(|r| r.pressure).collect();
    check_finite(&pressures, identifier)?;
    if let Some((step, value)) = first_nonzero(&pressures) {
        debug!("{}: first non-zero output {} at step {}", identifier, value, step);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatticeEntry {
    pub position: Point,
    pub inside: bool,
}

/// Position and inside flag of every node.
pub fn lattice_dump<T: MeshProgram + ?Sized>(program: &T) -> Vec<LatticeEntry> {
    (0..program.num_nodes())
        .map(|i| LatticeEntry {
            position: program.coordinate_for_index(i),
            inside: program.inside(i),
        })
        .collect()
}

/// Writes the lattice dump as JSON.
pub fn write_lattice_json<T: MeshProgram + ?Sized>(program: &T, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &lattice_dump(program))?;
    Ok(())
}

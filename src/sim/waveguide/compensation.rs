//! Free-field impulse response of the rectangular mesh.
//!
//! A hard source injects a transient that the mesh itself colours. The
//! response measured here, at the source node of a mesh large enough that
//! no wall reflection returns within the run, is what a transparent source
//! has to compensate for.

use std::io::Write;
use std::ops::ControlFlow;

use tracing::info;

use crate::Point;
use crate::geom::boundary::CuboidBoundary;
use crate::sim::waveguide::config::WaveguideConfig;
use crate::sim::waveguide::error::{Result, WaveguideError};
use crate::sim::waveguide::mesh::rectangular::RectangularMesh;
use crate::sim::waveguide::program::RectangularProgram;
use crate::sim::waveguide::simulation::Waveguide;

/// Pressure at the source node for `steps` steps after a unit impulse
/// injected on the second step.
pub fn mesh_impulse_response(steps: usize) -> Result<Vec<f64>> {
    let config = WaveguideConfig {
        spacing: 1.0,
        anchor: Point::new(0.0, 0.0, 0.0),
        ..WaveguideConfig::new()
    };
    // Nodes from -half to +half on each axis
    let half = steps.div_ceil(2) as f64 + 1.0;
    let extent = half + 0.5;
    let boundary = CuboidBoundary::new(
        Point::new(-extent, -extent, -extent),
        Point::new(extent, extent, extent),
    )
    .map_err(|e| WaveguideError::config(e.to_string()))?;
    let mesh = RectangularMesh::new(&boundary, config.spacing, config.anchor)?;
    info!(
        "Mesh impulse response: {} steps on {} nodes",
        steps,
        mesh.num_nodes()
    );
    let program = RectangularProgram::rigid(mesh, config.sample_rate());

    let mut waveguide = Waveguide::new(program, &config)?;
    let results = waveguide.init_and_run(
        config.anchor,
        vec![0.0, 1.0],
        config.anchor,
        steps,
        |_| ControlFlow::Continue(()),
    )?;
    Ok(results.iter().map(|r| r.pressure).collect())
}

/// Writes `values` as a Rust source file defining a `const` array.
pub fn write_data_file<W: Write>(mut writer: W, name: &str, values: &[f64]) -> Result<()> {
    writeln!(writer, "// Autogenerated file")?;
    writeln!(writer, "pub const {}: [f64; {}] = [", name, values.len())?;
    for v in values {
        writeln!(writer, "    {:?},", v)?;
    }
    writeln!(writer, "];")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_impulse_response_start() -> Result<()> {
        let ir = mesh_impulse_response(6)?;
        assert_eq!(ir.len(), 6);
        assert_eq!(ir[0], 0.0);
        assert_eq!(ir[1], 1.0);
        // Neighbors pick up a third of the impulse on the first free step
        // and return it to the centre on the next, minus the impulse itself
        assert!(ir[2].abs() < 1e-12);
        assert!((ir[3] - (2.0 / 3.0 - 1.0)).abs() < 1e-12);
        assert!(ir.iter().all(|v| v.is_finite()));
        Ok(())
    }

    #[test]
    fn test_write_data_file() -> Result<()> {
        let mut out = Vec::new();
        write_data_file(&mut out, "MESH_IMPULSE_RESPONSE", &[0.0, 1.0, -0.25])?;
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("pub const MESH_IMPULSE_RESPONSE: [f64; 3] = ["));
        assert!(text.contains("    -0.25,\n"));
        assert!(text.trim_end().ends_with("];"));
        Ok(())
    }
}

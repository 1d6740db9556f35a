//! Sound intensity at a single node.
//!
//! Pressure differences to the node's live neighbors are mapped to a 3-D
//! gradient through the pseudo-inverse of the neighbor unit vectors, then
//! integrated into particle velocity with Euler's equation.

use nalgebra::{DMatrix, DVector};

use crate::Vector;
use crate::sim::waveguide::error::{Result, WaveguideError};
use crate::sim::waveguide::mesh::NO_NEIGHBOR;
use crate::sim::waveguide::program::MeshProgram;

#[derive(Debug, Clone)]
pub struct IntensityEstimator {
    node: usize,
    /// Live neighbor indices and their distances.
    neighbors: Vec<(usize, f64)>,
    /// 3 x k pseudo-inverse of the neighbor unit vectors, `None` for an
    /// isolated node.
    transform: Option<DMatrix<f64>>,
    velocity: Vector,
}

impl IntensityEstimator {
    pub fn new<T: MeshProgram + ?Sized>(program: &T, node: usize) -> Result<Self> {
        let origin = program.coordinate_for_index(node);
        let neighbors: Vec<(usize, f64)> = program
            .ports(node)
            .iter()
            .filter(|&&j| j != NO_NEIGHBOR)
            .map(|&j| (j, program.coordinate_for_index(j).distance(&origin)))
            .collect();

        let transform = if neighbors.is_empty() {
            None
        } else {
            let units: Vec<[f64; 3]> = neighbors
                .iter()
                .map(|&(j, dist)| {
                    let v = program.coordinate_for_index(j) - origin;
                    [v.dx / dist, v.dy / dist, v.dz / dist]
                })
                .collect();
            let m = DMatrix::from_fn(units.len(), 3, |r, c| units[r][c]);
            let pinv = m
                .pseudo_inverse(1e-10)
                .map_err(|e| WaveguideError::config(format!("port transform: {}", e)))?;
            Some(pinv)
        };

        Ok(Self {
            node,
            neighbors,
            transform,
            velocity: Vector::zero(),
        })
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    /// Pressure gradient at the node for the given field.
    pub fn gradient(&self, field: &[f64]) -> Vector {
        let Some(transform) = &self.transform else {
            return Vector::zero();
        };
        let p = field[self.node];
        let diffs = DVector::from_iterator(
            self.neighbors.len(),
            self.neighbors.iter().map(|&(j, dist)| (field[j] - p) / dist),
        );
        let g = transform * diffs;
        Vector::new(g[0], g[1], g[2])
    }

    /// Integrates the particle velocity over one sample period and returns
    /// the intensity `p * v`.
    pub fn update(&mut self, field: &[f64], period: f64, air_density: f64) -> Vector {
        let g = self.gradient(field);
        self.velocity = self.velocity - g * (period / air_density);
        self.velocity * field[self.node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;
    use crate::geom::boundary::CuboidBoundary;
    use crate::sim::waveguide::mesh::rectangular::RectangularMesh;
    use crate::sim::waveguide::program::RectangularProgram;

    fn program() -> anyhow::Result<RectangularProgram> {
        let boundary = CuboidBoundary::new(Point::new(0., 0., 0.), Point::new(5., 5., 5.))?;
        let mesh = RectangularMesh::new(&boundary, 1.0, Point::new(0.5, 0.5, 0.5))?;
        Ok(RectangularProgram::rigid(mesh, 1000.0))
    }

    fn linear_field(program: &RectangularProgram) -> Vec<f64> {
        (0..program.num_nodes())
            .map(|i| {
                let p = program.coordinate_for_index(i);
                2.0 * p.x + 3.0 * p.y - p.z
            })
            .collect()
    }

    #[test]
    fn test_gradient_of_linear_field() -> anyhow::Result<()> {
        let program = program()?;
        let field = linear_field(&program);
        for pt in [Point::new(2.5, 2.5, 2.5), Point::new(0.5, 0.5, 2.5)] {
            let node = program.index_for_coordinate(pt);
            let estimator = IntensityEstimator::new(&program, node)?;
            let g = estimator.gradient(&field);
            assert!((g.dx - 2.0).abs() < 1e-9);
            assert!((g.dy - 3.0).abs() < 1e-9);
            assert!((g.dz + 1.0).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_velocity_integration() -> anyhow::Result<()> {
        let program = program()?;
        let field = linear_field(&program);
        let node = program.index_for_coordinate(Point::new(2.5, 2.5, 2.5));
        let mut estimator = IntensityEstimator::new(&program, node)?;
        let intensity = estimator.update(&field, 0.5, 2.0);
        // v = -(T / rho) * grad p = -(0.25) * (2, 3, -1)
        assert!(estimator.velocity().is_close(&Vector::new(-0.5, -0.75, 0.25)));
        let p = field[node];
        assert!(intensity.is_close(&(estimator.velocity() * p)));
        Ok(())
    }

    #[test]
    fn test_isolated_node_has_zero_gradient() -> anyhow::Result<()> {
        let program = program()?;
        let field = linear_field(&program);
        // Outside nodes have no ports
        let estimator = IntensityEstimator::new(&program, 0)?;
        assert_eq!(estimator.gradient(&field), Vector::zero());
        Ok(())
    }
}

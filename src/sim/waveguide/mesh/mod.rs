//! Lattices of pressure nodes laid out inside a boundary.

pub mod boundary_finder;
pub mod rectangular;
pub mod tetrahedral;

use serde::Serialize;

use crate::Point;
use crate::geom::boundary::Boundary;
use crate::sim::waveguide::error::{Result, WaveguideError};

/// Sentinel port index indicating that there is no neighbor in that direction.
pub const NO_NEIGHBOR: usize = usize::MAX;

/// Sentinel boundary index for nodes without a filter slot.
pub const NO_BOUNDARY: usize = usize::MAX;

/// Offsets of the six rectangular ports, in port order.
pub const PORT_OFFSETS: [[i64; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Geometric topology of a node derived from its boundary bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BoundaryClass {
    /// All six neighbors present.
    Interior,
    /// One missing neighbor.
    Planar,
    /// Two missing neighbors on different axes.
    Edge,
    /// Three missing neighbors on different axes.
    Corner,
    /// Missing neighbors that do not form a convex planar, edge or corner
    /// configuration (an opposing pair, or more than three). Updated as a
    /// rigid node.
    Reentrant,
}

/// Bitmask of the directions in which a node has no neighbor.
///
/// Bits 0..6 follow port order (`NX PX NY PY NZ PZ`). `REENTRANT` is stored
/// alone, so the popcount of any mask is at most 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BoundaryType(pub u8);

impl BoundaryType {
    pub const NX: u8 = 1 << 0;
    pub const PX: u8 = 1 << 1;
    pub const NY: u8 = 1 << 2;
    pub const PY: u8 = 1 << 3;
    pub const NZ: u8 = 1 << 4;
    pub const PZ: u8 = 1 << 5;
    pub const REENTRANT: u8 = 1 << 6;

    const DIRECTIONS: u8 = 0b11_1111;

    /// Classifies a mask of missing directions.
    pub fn from_missing(missing: u8) -> Self {
        let missing = missing & Self::DIRECTIONS;
        let opposing = (0..3).any(|axis| (missing >> (2 * axis)) & 0b11 == 0b11);
        if opposing || missing.count_ones() > 3 {
            Self(Self::REENTRANT)
        } else {
            Self(missing)
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn popcount(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_reentrant(&self) -> bool {
        self.0 == Self::REENTRANT
    }

    pub fn class(&self) -> BoundaryClass {
        if self.is_reentrant() {
            return BoundaryClass::Reentrant;
        }
        match self.popcount() {
            0 => BoundaryClass::Interior,
            1 => BoundaryClass::Planar,
            2 => BoundaryClass::Edge,
            _ => BoundaryClass::Corner,
        }
    }
}

/// Regular grid of cells covering a boundary, with one lattice point placed
/// exactly on an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lattice {
    pub origin: Point,
    pub spacing: f64,
    pub dims: [usize; 3],
}

impl Lattice {
    pub fn new(boundary: &dyn Boundary, spacing: f64, anchor: Point) -> Result<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(WaveguideError::config(format!(
                "spacing must be positive and finite, got {}",
                spacing
            )));
        }
        if !boundary.inside(anchor) {
            return Err(WaveguideError::config(format!(
                "anchor {} is not inside the boundary",
                anchor
            )));
        }
        let (min, max) = boundary.aabb();
        let axis_origin = |a: f64, lo: f64| a - spacing * ((a - lo) / spacing).ceil();
        let origin = Point::new(
            axis_origin(anchor.x, min.x),
            axis_origin(anchor.y, min.y),
            axis_origin(anchor.z, min.z),
        );
        let axis_dim = |o: f64, hi: f64| -> Result<usize> {
            let n = ((hi - o) / spacing).floor() + 1.0;
            if n.is_finite() && n >= 1.0 && n < usize::MAX as f64 {
                Ok(n as usize)
            } else {
                Err(WaveguideError::config(format!(
                    "spacing {} gives an invalid lattice extent of {} nodes",
                    spacing, n
                )))
            }
        };
        let dims = [
            axis_dim(origin.x, max.x)?,
            axis_dim(origin.y, max.y)?,
            axis_dim(origin.z, max.z)?,
        ];
        if dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]))
            .is_none()
        {
            return Err(WaveguideError::config(format!(
                "lattice of {} x {} x {} nodes is too large for spacing {}",
                dims[0], dims[1], dims[2], spacing
            )));
        }
        Ok(Self {
            origin,
            spacing,
            dims,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub fn index(&self, [x, y, z]: [usize; 3]) -> usize {
        x + y * self.dims[0] + z * self.dims[0] * self.dims[1]
    }

    pub fn locator(&self, index: usize) -> [usize; 3] {
        let plane = self.dims[0] * self.dims[1];
        [
            index % self.dims[0],
            (index % plane) / self.dims[0],
            index / plane,
        ]
    }

    pub fn position(&self, [x, y, z]: [usize; 3]) -> Point {
        Point::new(
            self.origin.x + x as f64 * self.spacing,
            self.origin.y + y as f64 * self.spacing,
            self.origin.z + z as f64 * self.spacing,
        )
    }

    /// Locator shifted by `offset`, or `None` when it leaves the lattice.
    pub fn neighbor(&self, locator: [usize; 3], offset: [i64; 3]) -> Option<[usize; 3]> {
        let mut out = [0; 3];
        for axis in 0..3 {
            let v = locator[axis] as i64 + offset[axis];
            if v < 0 || v >= self.dims[axis] as i64 {
                return None;
            }
            out[axis] = v as usize;
        }
        Some(out)
    }

    /// Nearest lattice locator, clamped to the lattice.
    pub fn nearest_locator(&self, pt: Point) -> [usize; 3] {
        let rel = [
            pt.x - self.origin.x,
            pt.y - self.origin.y,
            pt.z - self.origin.z,
        ];
        let mut out = [0; 3];
        for axis in 0..3 {
            let v = (rel[axis] / self.spacing).round();
            out[axis] = if v <= 0.0 {
                0
            } else {
                (v as usize).min(self.dims[axis] - 1)
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::boundary::CuboidBoundary;

    #[test]
    fn test_boundary_type_classification() {
        let planar = BoundaryType::from_missing(BoundaryType::NX);
        assert_eq!(planar.class(), BoundaryClass::Planar);
        let edge = BoundaryType::from_missing(BoundaryType::NX | BoundaryType::PY);
        assert_eq!(edge.class(), BoundaryClass::Edge);
        let corner =
            BoundaryType::from_missing(BoundaryType::PX | BoundaryType::NY | BoundaryType::PZ);
        assert_eq!(corner.class(), BoundaryClass::Corner);
        assert_eq!(corner.popcount(), 3);

        let opposing = BoundaryType::from_missing(BoundaryType::NX | BoundaryType::PX);
        assert_eq!(opposing.class(), BoundaryClass::Reentrant);
        assert_eq!(opposing.popcount(), 1);
        assert_eq!(opposing.bits(), BoundaryType::REENTRANT);

        assert_eq!(BoundaryType::from_missing(0).class(), BoundaryClass::Interior);
    }

    #[test]
    fn test_popcount_never_above_three() {
        for mask in 0..64u8 {
            let bt = BoundaryType::from_missing(mask);
            assert!(bt.popcount() <= 3, "mask {:06b}", mask);
        }
    }

    #[test]
    fn test_lattice_anchor() -> anyhow::Result<()> {
        let boundary = CuboidBoundary::new(Point::new(0., 0., 0.), Point::new(5., 5., 5.))?;
        let lattice = Lattice::new(&boundary, 1.0, Point::new(0.5, 0.5, 0.5))?;
        assert!(lattice.origin.is_close(&Point::new(-0.5, -0.5, -0.5)));
        assert_eq!(lattice.dims, [6, 6, 6]);
        let anchor = lattice.nearest_locator(Point::new(0.5, 0.5, 0.5));
        assert!(lattice.position(anchor).is_close(&Point::new(0.5, 0.5, 0.5)));

        let idx = lattice.index([2, 3, 4]);
        assert_eq!(lattice.locator(idx), [2, 3, 4]);
        assert_eq!(lattice.neighbor([0, 0, 0], [-1, 0, 0]), None);
        assert_eq!(lattice.neighbor([0, 0, 0], [1, 0, 1]), Some([1, 0, 1]));
        Ok(())
    }

    #[test]
    fn test_lattice_rejects_bad_parameters() -> anyhow::Result<()> {
        let boundary = CuboidBoundary::new(Point::new(0., 0., 0.), Point::new(1., 1., 1.))?;
        assert!(Lattice::new(&boundary, 0.0, Point::new(0.5, 0.5, 0.5)).is_err());
        let err = Lattice::new(&boundary, 0.1, Point::new(2.0, 0.5, 0.5)).unwrap_err();
        assert_eq!(
            err.category(),
            crate::sim::waveguide::error::ErrorCategory::Configuration
        );
        Ok(())
    }

    #[test]
    fn test_lattice_too_large_is_config_error() -> anyhow::Result<()> {
        let boundary = CuboidBoundary::new(Point::new(0., 0., 0.), Point::new(1e3, 1e3, 1e3))?;
        // About 1e10 nodes per axis: the node count overflows
        let err = Lattice::new(&boundary, 1e-7, Point::new(1., 1., 1.)).unwrap_err();
        assert_eq!(
            err.category(),
            crate::sim::waveguide::error::ErrorCategory::Configuration
        );
        // Extent not representable at all
        let err = Lattice::new(&boundary, 1e-310, Point::new(1., 1., 1.)).unwrap_err();
        assert_eq!(
            err.category(),
            crate::sim::waveguide::error::ErrorCategory::Configuration
        );
        Ok(())
    }
}

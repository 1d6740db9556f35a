pub mod bboxes;
pub mod boundary;
pub mod point;
pub mod triangles;
pub mod vector;

/// Geometric precision
pub const EPS: f64 = 1e-13;

//! Digital waveguide mesh (FDTD) simulation of sound in an enclosed space.
//!
//! A scene is sampled onto a rectangular or tetrahedral lattice, boundary
//! nodes are classified and bound to surface filters, and pressure is
//! advanced one step at a time from a hard source to an output node.

pub mod compensation;
pub mod compute;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filters;
pub mod intensity;
pub mod mesh;
pub mod program;
pub mod simulation;

pub use config::{WaveguideConfig, WaveguideMode};
pub use error::{ErrorCategory, Result, WaveguideError};
pub use program::MeshProgram;
pub use simulation::{
    RectangularWaveguide, RunState, RunStepResult, TetrahedralWaveguide, Waveguide,
};

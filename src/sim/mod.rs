pub mod acoustics;
pub mod engine;
pub mod materials;
pub mod waveguide;

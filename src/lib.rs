pub mod geom;
pub mod sim;

// Prelude
pub use geom::point::Point;
pub use geom::vector::Vector;

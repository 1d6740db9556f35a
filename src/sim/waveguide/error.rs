//! Error types for waveguide simulation.

use thiserror::Error;

/// Result type for waveguide operations.
pub type Result<T> = std::result::Result<T, WaveguideError>;

/// Broad class of a failure, telling the caller what to do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad parameters or geometry. Reconfigure and rebuild.
    Configuration,
    /// API called in the wrong run state. Nothing was mutated.
    State,
    /// Compute context or I/O failure. Not retried.
    Resource,
    /// NaN or Inf in the pressure field.
    Numerical,
}

/// Errors that can occur while building or running a waveguide.
#[derive(Error, Debug)]
pub enum WaveguideError {
    /// Invalid mesh, filter or run parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scene geometry could not be resolved during mesh construction.
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Operation not valid in the current run state.
    #[error("State error: {0}")]
    State(String),

    /// Compute context or buffer failure.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Non-finite value found in the pressure state.
    #[error("Numerical divergence at node {node}: {value}")]
    Divergence { node: usize, value: f64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WaveguideError {
    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Create a state error.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create a resource error.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::Geometry(_) => ErrorCategory::Configuration,
            Self::State(_) => ErrorCategory::State,
            Self::Resource(_) | Self::Io(_) | Self::Serialization(_) => ErrorCategory::Resource,
            Self::Divergence { .. } => ErrorCategory::Numerical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            WaveguideError::config("spacing").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            WaveguideError::geometry("no triangle").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(WaveguideError::state("not ready").category(), ErrorCategory::State);
        assert_eq!(WaveguideError::resource("pool").category(), ErrorCategory::Resource);
        let err = WaveguideError::Divergence { node: 3, value: f64::NAN };
        assert_eq!(err.category(), ErrorCategory::Numerical);
        assert!(err.to_string().contains("node 3"));
    }

    #[test]
    fn test_io_error_is_resource() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err: WaveguideError = io.into();
        assert_eq!(err.category(), ErrorCategory::Resource);
    }
}

use serde::{Deserialize, Serialize};

use crate::Point;
use crate::sim::materials::{NUM_OCTAVE_BANDS, octave_band_edges};
use crate::sim::waveguide::error::{Result, WaveguideError};

/// Courant number squared of the rectangular mesh (c T / X)^2.
pub const COURANT_SQUARED: f64 = 1.0 / 3.0;

/// Highest frequency the rectangular mesh reproduces reliably, as a
/// fraction of its sample rate.
pub const MAX_VALID_BANDWIDTH: f64 = 0.25;

/// How the mesh sample rate is derived from the frequency range of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaveguideMode {
    /// One broadband run, valid up to `cutoff` Hz.
    SingleBand { cutoff: f64, usable_portion: f64 },
    /// The lowest `bands` octave bands are taken from the waveguide.
    /// `cutoff` never lies below the upper edge of the highest such band.
    MultipleBand {
        bands: usize,
        cutoff: f64,
        usable_portion: f64,
    },
}

impl WaveguideMode {
    pub fn single_band(cutoff: f64, usable_portion: f64) -> Self {
        Self::SingleBand {
            cutoff,
            usable_portion,
        }
    }

    /// Multiple-band mode. The cutoff is raised to cover all `bands` bands.
    pub fn multiple_band(bands: usize, cutoff: f64, usable_portion: f64) -> Self {
        let cutoff = match bands {
            1..=NUM_OCTAVE_BANDS => cutoff.max(octave_band_edges(bands - 1).1),
            _ => cutoff,
        };
        Self::MultipleBand {
            bands,
            cutoff,
            usable_portion,
        }
    }

    pub fn cutoff(&self) -> f64 {
        match *self {
            Self::SingleBand { cutoff, .. } | Self::MultipleBand { cutoff, .. } => cutoff,
        }
    }

    pub fn usable_portion(&self) -> f64 {
        match *self {
            Self::SingleBand { usable_portion, .. }
            | Self::MultipleBand { usable_portion, .. } => usable_portion,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let cutoff = self.cutoff();
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(WaveguideError::config(format!(
                "cutoff must be positive, got {}",
                cutoff
            )));
        }
        let usable = self.usable_portion();
        if !(usable > 0.0 && usable <= 1.0) {
            return Err(WaveguideError::config(format!(
                "usable portion must lie in (0, 1], got {}",
                usable
            )));
        }
        if let Self::MultipleBand { bands, .. } = *self {
            if !(1..=NUM_OCTAVE_BANDS).contains(&bands) {
                return Err(WaveguideError::config(format!(
                    "band count must lie in 1..={}, got {}",
                    NUM_OCTAVE_BANDS, bands
                )));
            }
        }
        Ok(())
    }

    /// Sample rate placing the cutoff at `usable_portion` of the mesh's
    /// valid bandwidth.
    pub fn sampling_frequency(&self) -> f64 {
        self.cutoff() / (MAX_VALID_BANDWIDTH * self.usable_portion())
    }
}

impl Default for WaveguideMode {
    fn default() -> Self {
        Self::single_band(500.0, 0.6)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveguideConfig {
    // Lattice
    /// Distance between neighbouring nodes in meters.
    pub spacing: f64,
    /// A lattice point is placed exactly here.
    pub anchor: Point,

    // Medium
    pub speed_of_sound: f64,
    /// Air density in kg/m^3, used for particle velocity.
    pub air_density: f64,

    // Engine
    /// Voxel grid side used for nearest-surface queries.
    pub voxel_subdivisions: usize,
    /// Worker threads for the step dispatch. `None` uses all cores.
    pub num_threads: Option<usize>,
}

impl WaveguideConfig {
    pub fn new() -> Self {
        Self {
            spacing: 0.1,
            anchor: Point::new(0.0, 0.0, 0.0),
            speed_of_sound: 340.0,
            air_density: 1.225,
            voxel_subdivisions: 32,
            num_threads: None,
        }
    }

    /// Mesh sample rate in Hz: c * sqrt(3) / spacing.
    pub fn sample_rate(&self) -> f64 {
        self.speed_of_sound / (self.spacing * COURANT_SQUARED.sqrt())
    }

    /// Sets the spacing that gives the requested sample rate.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.spacing = self.speed_of_sound / (sample_rate * COURANT_SQUARED.sqrt());
        self
    }

    /// Sets the spacing from a single- or multiple-band parameterization.
    pub fn with_mode(self, mode: WaveguideMode) -> Result<Self> {
        mode.validate()?;
        Ok(self.with_sample_rate(mode.sampling_frequency()))
    }

    pub fn with_anchor(mut self, anchor: Point) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(WaveguideError::config(format!(
                "spacing must be positive and finite, got {}",
                self.spacing
            )));
        }
        if !self.anchor.is_finite() {
            return Err(WaveguideError::config(format!(
                "anchor must be finite, got {}",
                self.anchor
            )));
        }
        if !(self.speed_of_sound.is_finite() && self.speed_of_sound > 0.0) {
            return Err(WaveguideError::config(format!(
                "speed of sound must be positive, got {}",
                self.speed_of_sound
            )));
        }
        if !(self.air_density.is_finite() && self.air_density > 0.0) {
            return Err(WaveguideError::config(format!(
                "air density must be positive, got {}",
                self.air_density
            )));
        }
        if self.voxel_subdivisions == 0 {
            return Err(WaveguideError::config("voxel subdivisions must be at least 1"));
        }
        if self.num_threads == Some(0) {
            return Err(WaveguideError::config("thread count must be at least 1"));
        }
        Ok(())
    }
}

impl Default for WaveguideConfig {
    fn default() -> Self {
        Self::new()
    }
}

use serde::{Deserialize, Serialize};

/// Number of octave bands used for frequency-dependent simulation (125 Hz to 4 kHz).
pub const NUM_OCTAVE_BANDS: usize = 6;

/// Center frequencies of the octave bands in Hz.
pub const OCTAVE_BAND_FREQUENCIES: [f64; NUM_OCTAVE_BANDS] =
    [125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0];

/// Lower and upper edge of an octave band in Hz.
pub fn octave_band_edges(band: usize) -> (f64, f64) {
    let centre = OCTAVE_BAND_FREQUENCIES[band];
    (centre / std::f64::consts::SQRT_2, centre * std::f64::consts::SQRT_2)
}

/// Acoustic surface material with frequency-dependent absorption and scattering.
///
/// Absorption and scattering coefficients are specified per octave band
/// (125, 250, 500, 1000, 2000, 4000 Hz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticMaterial {
    pub name: String,
    /// Absorption coefficients per octave band [0.0, 1.0].
    pub absorption: [f64; NUM_OCTAVE_BANDS],
    /// Scattering coefficients per octave band [0.0, 1.0].
    ///
    /// Carried along for geometric (ray-based) estimators that share the
    /// scene. The waveguide boundary filters depend on absorption only.
    pub scattering: [f64; NUM_OCTAVE_BANDS],
}

impl AcousticMaterial {
    pub fn new(
        name: &str,
        absorption: [f64; NUM_OCTAVE_BANDS],
        scattering: [f64; NUM_OCTAVE_BANDS],
    ) -> Self {
        Self {
            name: name.to_string(),
            absorption,
            scattering,
        }
    }

    /// Creates a material with uniform absorption across all bands.
    pub fn uniform(name: &str, absorption: f64, scattering: f64) -> Self {
        Self {
            name: name.to_string(),
            absorption: [absorption; NUM_OCTAVE_BANDS],
            scattering: [scattering; NUM_OCTAVE_BANDS],
        }
    }

    /// Perfectly reflecting material.
    pub fn rigid(name: &str) -> Self {
        Self::uniform(name, 0.0, 0.0)
    }

    /// Returns the first band whose absorption lies outside [0, 1], if any.
    pub fn invalid_band(&self) -> Option<(usize, f64)> {
        self.absorption
            .iter()
            .copied()
            .enumerate()
            .find(|(_, a)| !(0.0..=1.0).contains(a))
    }
}

//! Boundary filter synthesis.
//!
//! Each surface's per-band absorption becomes a cascade of peak biquads
//! (one per octave band), convolved into a single order-12 reflectance
//! filter and then mapped to the impedance domain. Synthesis is pure: the
//! same material and sample rate always give the same coefficients.

use std::f64::consts::PI;

use crate::sim::materials::{AcousticMaterial, NUM_OCTAVE_BANDS, octave_band_edges};
use crate::sim::waveguide::error::{Result, WaveguideError};

/// One biquad section per octave band.
pub const BIQUAD_SECTIONS: usize = NUM_OCTAVE_BANDS;

/// Order of the cascaded filter.
pub const FILTER_ORDER: usize = BIQUAD_SECTIONS * 2;

/// Number of coefficients in each polynomial of the cascaded filter.
pub const FILTER_TAPS: usize = FILTER_ORDER + 1;

/// Quality factor of every peak section.
pub const PEAK_Q: f64 = 1.414;

/// Absorption is capped here so the reflectance gain in dB stays finite.
pub const MAX_ABSORPTION: f64 = 0.999;

/// Running state of one cascaded filter (transposed direct form II).
pub type FilterMemory = [f64; FILTER_ORDER];

/// Peak filter parameters for one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDescriptor {
    pub gain_db: f64,
    pub centre: f64,
    pub q: f64,
}

/// Second-order (biquad) filter coefficients, normalized so that a0 = 1.
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Cookbook peaking EQ section.
    ///
    /// A section centred at or above Nyquist cannot be realised and
    /// passes the signal unchanged.
    pub fn peak(descriptor: &FilterDescriptor, sample_rate: f64) -> Self {
        if descriptor.centre >= sample_rate / 2.0 {
            return Self::identity();
        }
        let a = 10.0_f64.powf(descriptor.gain_db / 40.0);
        let w0 = 2.0 * PI * descriptor.centre / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * descriptor.q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Numerator `b` and denominator `a` of the cascaded filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalCoefficients {
    pub b: [f64; FILTER_TAPS],
    pub a: [f64; FILTER_TAPS],
}

impl CanonicalCoefficients {
    pub fn identity() -> Self {
        let mut b = [0.0; FILTER_TAPS];
        let mut a = [0.0; FILTER_TAPS];
        b[0] = 1.0;
        a[0] = 1.0;
        Self { b, a }
    }

    /// Cascades biquad sections into one filter by polynomial multiplication.
    pub fn convolve(sections: &[BiquadCoeffs; BIQUAD_SECTIONS]) -> Self {
        let mut out = Self::identity();
        for (i, section) in sections.iter().enumerate() {
            // Polynomials have degree 2 * i before this section
            let degree = 2 * i;
            out.b = poly_mul(&out.b, degree, [section.b0, section.b1, section.b2]);
            out.a = poly_mul(&out.a, degree, [1.0, section.a1, section.a2]);
        }
        out
    }

    /// Maps a reflectance filter R = b/a to the impedance filter
    /// Z = (1 + R) / (1 - R), i.e. `b_z = a + b`, `a_z = a - b`.
    ///
    /// The result is left unnormalized: for a rigid wall `a_z` is all zeros.
    pub fn to_impedance(&self) -> Self {
        let mut b = [0.0; FILTER_TAPS];
        let mut a = [0.0; FILTER_TAPS];
        for i in 0..FILTER_TAPS {
            b[i] = self.a[i] + self.b[i];
            a[i] = self.a[i] - self.b[i];
        }
        Self { b, a }
    }

    /// Reciprocal of an impedance filter, normalized so that `a[0] = 1`.
    ///
    /// Finite for any passive reflectance, including rigid walls whose
    /// admittance numerator is zero.
    pub fn admittance(&self) -> Self {
        let norm = self.b[0];
        Self {
            b: self.a.map(|v| v / norm),
            a: self.b.map(|v| v / norm),
        }
    }

    /// Magnitude of the frequency response at `freq`.
    pub fn magnitude(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let eval = |c: &[f64; FILTER_TAPS]| {
            let (re, im) = c
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(re, im), (k, v)| {
                    let phase = -w * k as f64;
                    (re + v * phase.cos(), im + v * phase.sin())
                });
            (re * re + im * im).sqrt()
        };
        eval(&self.b) / eval(&self.a)
    }
}

fn poly_mul(poly: &[f64; FILTER_TAPS], degree: usize, section: [f64; 3]) -> [f64; FILTER_TAPS] {
    let mut out = [0.0; FILTER_TAPS];
    for (i, p) in poly.iter().enumerate().take(degree + 1) {
        for (j, s) in section.iter().enumerate() {
            out[i + j] += p * s;
        }
    }
    out
}

/// Peak filter descriptor for `band` of a material.
pub fn compute_filter_descriptor(material: &AcousticMaterial, band: usize) -> FilterDescriptor {
    let absorption = material.absorption[band].min(MAX_ABSORPTION);
    // Pressure reflectance sqrt(1 - a), in dB
    let gain_db = 10.0 * (1.0 - absorption).log10();
    let (lower, upper) = octave_band_edges(band);
    FilterDescriptor {
        gain_db,
        centre: (lower + upper) / 2.0,
        q: PEAK_Q,
    }
}

pub fn to_filter_descriptors(
    material: &AcousticMaterial,
) -> Result<[FilterDescriptor; BIQUAD_SECTIONS]> {
    if let Some((band, value)) = material.invalid_band() {
        return Err(WaveguideError::config(format!(
            "surface '{}' has absorption {} in band {}, expected a value in [0, 1]",
            material.name, value, band
        )));
    }
    Ok(std::array::from_fn(|band| {
        compute_filter_descriptor(material, band)
    }))
}

pub fn get_peak_biquads_array(
    descriptors: &[FilterDescriptor; BIQUAD_SECTIONS],
    sample_rate: f64,
) -> [BiquadCoeffs; BIQUAD_SECTIONS] {
    std::array::from_fn(|band| BiquadCoeffs::peak(&descriptors[band], sample_rate))
}

/// Impedance-domain coefficients for one surface.
pub fn to_filter_coefficients(
    material: &AcousticMaterial,
    sample_rate: f64,
) -> Result<CanonicalCoefficients> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(WaveguideError::config(format!(
            "sample rate must be positive, got {}",
            sample_rate
        )));
    }
    let descriptors = to_filter_descriptors(material)?;
    let sections = get_peak_biquads_array(&descriptors, sample_rate);
    Ok(CanonicalCoefficients::convolve(&sections).to_impedance())
}

/// Impedance-domain coefficients for every surface, in surface order.
pub fn to_filter_coefficients_all(
    surfaces: &[AcousticMaterial],
    sample_rate: f64,
) -> Result<Vec<CanonicalCoefficients>> {
    surfaces
        .iter()
        .map(|s| to_filter_coefficients(s, sample_rate))
        .collect()
}

/// Output of a filter for input `u` given the current memory, without
/// advancing it.
pub fn filter_output(u: f64, memory: &FilterMemory, coeffs: &CanonicalCoefficients) -> f64 {
    coeffs.b[0] * u + memory[0]
}

/// Runs one sample through a filter in transposed direct form II,
/// updating `memory`, and returns the output.
pub fn filter_step(u: f64, memory: &mut FilterMemory, coeffs: &CanonicalCoefficients) -> f64 {
    let y = filter_output(u, memory, coeffs);
    for i in 0..FILTER_ORDER - 1 {
        memory[i] = coeffs.b[i + 1] * u - coeffs.a[i + 1] * y + memory[i + 1];
    }
    memory[FILTER_ORDER - 1] = coeffs.b[FILTER_ORDER] * u - coeffs.a[FILTER_ORDER] * y;
    y
}

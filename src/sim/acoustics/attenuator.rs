use crate::Vector;
use crate::sim::waveguide::simulation::RunStepResult;

/// Turns the per-step output of a waveguide run into a receiver signal.
pub trait Attenuator {
    /// Returns the gain applied to a pressure sample that arrives with
    /// the given acoustic intensity.
    fn attenuation(&self, intensity: Vector) -> f64;

    /// Applies the gain to every step of a run.
    fn process(&self, input: &[RunStepResult]) -> Vec<f64> {
        input
            .iter()
            .map(|r| r.pressure * self.attenuation(r.intensity))
            .collect()
    }
}

/// Passes pressure through unchanged.
pub struct NullAttenuator;

impl Attenuator for NullAttenuator {
    fn attenuation(&self, _intensity: Vector) -> f64 {
        1.0
    }
}

/// First-order microphone: gain = (1 - shape) + shape * cos(theta).
///
/// `theta` is the angle between `pointing` and the direction the sound
/// comes from, which is opposite to the intensity vector. `shape` 0 is
/// omnidirectional, 0.5 cardioid and 1 figure-of-eight.
#[derive(Debug, Clone, Copy)]
pub struct Microphone {
    pub pointing: Vector,
    pub shape: f64,
}

impl Microphone {
    pub fn new(pointing: Vector, shape: f64) -> Self {
        Self {
            pointing,
            shape: shape.clamp(0.0, 1.0),
        }
    }
}

impl Attenuator for Microphone {
    fn attenuation(&self, intensity: Vector) -> f64 {
        let omni = 1.0 - self.shape;
        let incoming = match (-intensity).normalize() {
            Some(v) => v,
            None => return omni,
        };
        let pointing = match self.pointing.normalize() {
            Some(v) => v,
            None => return omni,
        };
        omni + self.shape * incoming.dot(pointing)
    }
}

//! Run loop and run-state machine of a waveguide simulation.

use std::ops::ControlFlow;

use tracing::{error, info, warn};

use crate::sim::engine::FlatScene;
use crate::sim::waveguide::compute::ComputeContext;
use crate::sim::waveguide::config::WaveguideConfig;
use crate::sim::waveguide::error::{Result, WaveguideError};
use crate::sim::waveguide::intensity::IntensityEstimator;
use crate::sim::waveguide::program::{MeshProgram, RectangularProgram, TetrahedralProgram};
use crate::{Point, Vector};

/// Pressure and intensity sampled at the output node after one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStepResult {
    pub pressure: f64,
    pub intensity: Vector,
}

/// Parameters and progress of one run.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub source: usize,
    pub signal: Vec<f64>,
    pub output: usize,
    pub sample_rate: f64,
    /// Steps taken so far.
    pub counter: usize,
    intensity: IntensityEstimator,
}

impl RunInfo {
    /// Particle velocity at the output node.
    pub fn velocity(&self) -> Vector {
        self.intensity.velocity()
    }
}

#[derive(Debug, Clone)]
pub enum RunState {
    Uninitialized,
    Ready(RunInfo),
    Running(RunInfo),
    Finished(RunInfo),
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready(_) => "ready",
            Self::Running(_) => "running",
            Self::Finished(_) => "finished",
        }
    }

    pub fn run_info(&self) -> Option<&RunInfo> {
        match self {
            Self::Uninitialized => None,
            Self::Ready(info) | Self::Running(info) | Self::Finished(info) => Some(info),
        }
    }
}

pub struct Waveguide<T: MeshProgram> {
    program: T,
    context: ComputeContext,
    buffers: [Vec<f64>; 2],
    /// Buffer holding the latest pressure field; the other one holds the
    /// field before it.
    current: usize,
    air_density: f64,
    state: RunState,
}

pub type RectangularWaveguide = Waveguide<RectangularProgram>;
pub type TetrahedralWaveguide = Waveguide<TetrahedralProgram>;

impl<T: MeshProgram> Waveguide<T> {
    pub fn new(program: T, config: &WaveguideConfig) -> Result<Self> {
        config.validate()?;
        let context = ComputeContext::new(config.num_threads)?;
        let n = program.num_nodes();
        info!(
            "Waveguide with {} nodes at {:.1} Hz on {} threads",
            n,
            program.sample_rate(),
            context.num_threads()
        );
        Ok(Self {
            program,
            context,
            buffers: [vec![0.0; n], vec![0.0; n]],
            current: 1,
            air_density: config.air_density,
            state: RunState::Uninitialized,
        })
    }

    pub fn program(&self) -> &T {
        &self.program
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn sample_rate(&self) -> f64 {
        self.program.sample_rate()
    }

    /// Indices of the (previous, current) buffers.
    pub fn buffer_roles(&self) -> (usize, usize) {
        (1 - self.current, self.current)
    }

    /// Latest pressure at every node.
    pub fn pressure_field(&self) -> &[f64] {
        &self.buffers[self.current]
    }

    /// Prepares a run: resolves source and output to inside nodes and
    /// clears all pressure and filter state. Rejected while a run is in
    /// progress.
    pub fn init(
        &mut self,
        source: Point,
        signal: Vec<f64>,
        output: Point,
        sample_rate: f64,
    ) -> Result<()> {
        if let RunState::Running(_) = self.state {
            return Err(WaveguideError::state(
                "cannot init while a run is in progress; call finish() first",
            ));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(WaveguideError::config(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        let source_index = self.resolve(source, "source")?;
        let output_index = self.resolve(output, "output")?;
        let intensity = IntensityEstimator::new(&self.program, output_index)?;

        let mesh_rate = self.program.sample_rate();
        if ((sample_rate - mesh_rate) / mesh_rate).abs() > 1e-6 {
            warn!(
                "Requested sample rate {:.1} Hz differs from mesh sample rate {:.1} Hz",
                sample_rate, mesh_rate
            );
        }

        for buffer in self.buffers.iter_mut() {
            buffer.iter_mut().for_each(|v| *v = 0.0);
        }
        self.current = 1;
        self.program.reset();

        info!(
            "Run initialized: source node {}, output node {}, {} signal samples",
            source_index,
            output_index,
            signal.len()
        );
        self.state = RunState::Ready(RunInfo {
            source: source_index,
            signal,
            output: output_index,
            sample_rate,
            counter: 0,
            intensity,
        });
        Ok(())
    }

    fn resolve(&self, pt: Point, what: &str) -> Result<usize> {
        let index = self.program.index_for_coordinate(pt);
        if !self.program.inside(index) {
            return Err(WaveguideError::config(format!(
                "{} position {} is not inside the mesh",
                what, pt
            )));
        }
        Ok(index)
    }

    /// Advances the simulation by one step.
    pub fn run_step(&mut self) -> Result<RunStepResult> {
        let mut info = match std::mem::replace(&mut self.state, RunState::Uninitialized) {
            RunState::Ready(info) | RunState::Running(info) => info,
            other => {
                let name = other.name();
                self.state = other;
                return Err(WaveguideError::state(format!(
                    "cannot step a waveguide that is {}",
                    name
                )));
            }
        };
        match self.step_with(&mut info) {
            Ok(result) => {
                self.state = RunState::Running(info);
                Ok(result)
            }
            Err(e) => {
                // A failed dispatch leaves the buffers half written
                error!("Step {} failed, run finished: {}", info.counter, e);
                self.state = RunState::Finished(info);
                Err(e)
            }
        }
    }

    fn step_with(&mut self, info: &mut RunInfo) -> Result<RunStepResult> {
        let next = 1 - self.current;
        let [a, b] = &mut self.buffers;
        let (previous, current) = if next == 0 { (a, &*b) } else { (b, &*a) };

        self.program.run_step(&self.context, previous, current)?;

        // Hard source
        if let Some(&value) = info.signal.get(info.counter) {
            previous[info.source] = value;
        }

        let pressure = previous[info.output];
        let intensity = info
            .intensity
            .update(previous, 1.0 / info.sample_rate, self.air_density);

        info.counter += 1;
        self.current = next;
        Ok(RunStepResult {
            pressure,
            intensity,
        })
    }

    /// Runs `steps` steps, calling `callback` with the step index after
    /// each one. The callback may stop the run early by returning
    /// `ControlFlow::Break`. Ends in the finished state.
    pub fn run<F>(&mut self, steps: usize, mut callback: F) -> Result<Vec<RunStepResult>>
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        if !matches!(self.state, RunState::Ready(_) | RunState::Running(_)) {
            return Err(WaveguideError::state(format!(
                "cannot run a waveguide that is {}",
                self.state.name()
            )));
        }
        let mut results = Vec::with_capacity(steps);
        for step in 0..steps {
            results.push(self.run_step()?);
            if callback(step).is_break() {
                info!("Run stopped by caller after {} steps", step + 1);
                break;
            }
        }
        self.finish()?;
        Ok(results)
    }

    /// Ends a run driven step by step.
    pub fn finish(&mut self) -> Result<()> {
        self.state = match std::mem::replace(&mut self.state, RunState::Uninitialized) {
            RunState::Ready(info) | RunState::Running(info) | RunState::Finished(info) => {
                RunState::Finished(info)
            }
            RunState::Uninitialized => {
                return Err(WaveguideError::state("cannot finish a run that was never initialized"));
            }
        };
        Ok(())
    }

    pub fn init_and_run<F>(
        &mut self,
        source: Point,
        signal: Vec<f64>,
        output: Point,
        steps: usize,
        callback: F,
    ) -> Result<Vec<RunStepResult>>
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        let sample_rate = self.program.sample_rate();
        self.init(source, signal, output, sample_rate)?;
        self.run(steps, callback)
    }
}

impl RectangularWaveguide {
    /// Builds a rectangular waveguide with filtered boundaries for a scene.
    pub fn from_scene(scene: &FlatScene, config: &WaveguideConfig) -> Result<Self> {
        let program = RectangularProgram::from_scene(scene, config)?;
        Self::new(program, config)
    }
}

impl TetrahedralWaveguide {
    /// Builds a rigid tetrahedral waveguide for a scene.
    pub fn from_scene(scene: &FlatScene, config: &WaveguideConfig) -> Result<Self> {
        let program = TetrahedralProgram::from_scene(scene, config)?;
        Self::new(program, config)
    }
}

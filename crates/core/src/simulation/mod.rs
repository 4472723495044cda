//! Simulation engine: drives the integrator through an executor and emits frames
//!
//! `SimulationEngine` combines:
//! - the Grid State (field, potential, scratch plane)
//! - a `StepExecutor` chosen by an explicit `ExecutionContext`
//! - the leapfrog `Integrator`
//! - a `FrameSampler` and divergence monitoring
//!
//! Frames can be pulled one at a time ([`SimulationEngine::next_frame`], for
//! live display) or pushed into a [`FrameSink`] ([`SimulationEngine::run`],
//! for batch output such as a [`TrajectoryWriter`]).

pub mod sampler;
pub mod scenario;
pub mod trajectory;

pub use sampler::{Frame, FrameSampler, Observable};
pub use scenario::{PotentialPreset, ScenarioConfig};
pub use trajectory::{TrajectoryHeader, TrajectoryReader, TrajectoryWriter};

use crate::config::{BoundaryPolicy, SimulationConfig};
use crate::error::{SolverError, SolverResult};
use crate::grid::{GridState, WavePacket};
use crate::solver::{
    create_executor, Backend, ExecutionContext, FrameTimer, Integrator, ProfilerScope,
    StepExecutor,
};
use tracing::{debug, info, warn};

/// Consumer of frames emitted by [`SimulationEngine::run`]
pub trait FrameSink {
    /// Take ownership of the next frame
    ///
    /// # Errors
    ///
    /// Any error aborts the run and is returned from `run`.
    fn consume(&mut self, frame: Frame) -> SolverResult<()>;
}

impl FrameSink for Vec<Frame> {
    fn consume(&mut self, frame: Frame) -> SolverResult<()> {
        self.push(frame);
        Ok(())
    }
}

/// Totals reported at the end of [`SimulationEngine::run`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Frames emitted by this run
    pub frames: usize,
    /// Integrator steps taken since the engine was created
    pub steps: usize,
    /// Simulated time of the last frame
    pub time: f32,
    /// Total probability of the first frame of this run
    pub initial_probability: f32,
    /// Total probability of the last frame of this run
    pub final_probability: f32,
    /// Frames flagged as divergent during this run
    pub divergent_frames: usize,
    /// Mean wall-clock time per frame in milliseconds
    pub mean_frame_ms: f64,
}

impl RunSummary {
    /// `|final - initial| / initial` (0 when the run started from a zero field)
    #[must_use]
    pub fn probability_drift(&self) -> f32 {
        if self.initial_probability > 0.0 {
            (self.final_probability - self.initial_probability).abs() / self.initial_probability
        } else {
            0.0
        }
    }
}

/// Time-evolution driver
pub struct SimulationEngine {
    grid: GridState,
    config: SimulationConfig,
    executor: Box<dyn StepExecutor>,
    integrator: Integrator,
    sampler: FrameSampler,
    timer: FrameTimer,
    steps: usize,
    frames: usize,
    divergent_frames: usize,
    reference_probability: f32,
}

impl SimulationEngine {
    /// Validate the configuration, acquire the executor and upload the grid
    ///
    /// The reflective boundary (if selected) is applied to the initial field
    /// before upload; probability removed from the ring is logged and the
    /// field rescaled to its original total. A `dt` above
    /// [`SimulationConfig::stability_limit`] is logged but allowed.
    ///
    /// # Errors
    ///
    /// `InvalidConfig`/`InvalidStencil` from validation or when `config.dx`
    /// differs from the grid's spacing, `DeviceUnavailable` when the
    /// requested executor cannot be created.
    pub fn new(
        mut grid: GridState,
        config: SimulationConfig,
        context: ExecutionContext,
    ) -> SolverResult<Self> {
        config.validate()?;
        if (config.dx - grid.dx()).abs() > f32::EPSILON * grid.dx().max(1.0) {
            return Err(SolverError::InvalidConfig(format!(
                "config dx {} does not match grid dx {}",
                config.dx,
                grid.dx()
            )));
        }

        let limit = config.stability_limit(grid.potential().max_abs());
        if config.dt > limit {
            warn!(
                "dt = {} exceeds the leapfrog stability limit {:.5}; the field will likely diverge",
                config.dt, limit
            );
        }

        prepare_field(&mut grid, config.boundary);
        let reference_probability = grid.total_probability();
        let mut executor = create_executor(context, &grid, &config)?;
        executor.upload(&grid)?;

        info!(
            "Simulation engine ready: {}x{} grid, dt = {}, {} steps/frame, {:?} boundary, {} backend",
            grid.width(),
            grid.height(),
            config.dt,
            config.steps_per_frame,
            config.boundary,
            executor.backend()
        );

        Ok(Self {
            grid,
            integrator: Integrator::new(config.dt),
            config,
            executor,
            sampler: FrameSampler::default(),
            timer: FrameTimer::new(),
            steps: 0,
            frames: 0,
            divergent_frames: 0,
            reference_probability,
        })
    }

    /// Select the observable carried by subsequent frames
    #[must_use]
    pub fn with_observable(mut self, observable: Observable) -> Self {
        self.sampler = FrameSampler::new(observable);
        self
    }

    /// Current grid (synchronized after every frame)
    #[must_use]
    pub fn grid(&self) -> &GridState {
        &self.grid
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Observable carried by emitted frames
    #[must_use]
    pub fn observable(&self) -> Observable {
        self.sampler.observable()
    }

    /// Strategy executing the sweeps
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.executor.backend()
    }

    /// Integrator steps taken so far
    #[must_use]
    pub fn steps_taken(&self) -> usize {
        self.steps
    }

    /// Frames emitted so far
    #[must_use]
    pub fn frames_emitted(&self) -> usize {
        self.frames
    }

    /// Simulated time of the current state
    #[must_use]
    pub fn time(&self) -> f32 {
        self.steps as f32 * self.integrator.dt()
    }

    /// Per-frame wall-clock timing
    #[must_use]
    pub fn frame_timer(&self) -> &FrameTimer {
        &self.timer
    }

    /// Pull the next frame
    ///
    /// The first call returns frame 0 (the initial state, step 0). Every later
    /// call advances `steps_per_frame` steps, synchronizes and samples.
    ///
    /// # Errors
    ///
    /// Executor failures, or `NumericDivergence` when the frame diverges and
    /// `abort_on_divergence` is set.
    pub fn next_frame(&mut self) -> SolverResult<Frame> {
        let scope = ProfilerScope::new("frame");
        if self.frames > 0 {
            let steps = self.config.steps_per_frame;
            self.integrator
                .advance(self.executor.as_mut(), &mut self.grid, steps)?;
            self.executor.synchronize(&mut self.grid)?;
            self.steps += steps;
        }

        let frame = self
            .sampler
            .sample(&self.grid, self.frames, self.steps, self.time());
        self.frames += 1;

        let elapsed_ms = scope.elapsed_ms();
        self.timer.record(elapsed_ms);
        debug!(
            "Frame {} (step {}, t = {:.3}) in {:.2} ms, P = {:.6}",
            frame.index,
            frame.step,
            frame.time,
            elapsed_ms,
            frame.total_probability(self.grid.dx())
        );

        self.check_divergence(&frame)?;
        Ok(frame)
    }

    fn check_divergence(&mut self, frame: &Frame) -> SolverResult<()> {
        let peak = frame.peak_density();
        let cell_probability = peak * self.grid.cell_area();
        let over_bound = self
            .config
            .divergence_bound
            .is_some_and(|bound| cell_probability > bound * self.reference_probability);
        if frame.is_finite() && !over_bound {
            return Ok(());
        }

        self.divergent_frames += 1;
        warn!(
            "Numeric divergence at frame {} (step {}): peak density {} (cell probability {} vs initial total {})",
            frame.index, frame.step, peak, cell_probability, self.reference_probability
        );
        if self.config.abort_on_divergence {
            return Err(SolverError::NumericDivergence {
                frame: frame.index,
                peak,
            });
        }
        Ok(())
    }

    /// Emit exactly `frames` frames into `sink`, in order
    ///
    /// # Errors
    ///
    /// The first error from [`next_frame`](Self::next_frame) or the sink.
    pub fn run<S>(&mut self, frames: usize, sink: &mut S) -> SolverResult<RunSummary>
    where
        S: FrameSink + ?Sized,
    {
        let dx = self.grid.dx();
        let divergent_before = self.divergent_frames;
        let mut timer = FrameTimer::new();
        let mut initial_probability = 0.0;
        let mut final_probability = 0.0;
        let mut time = self.time();

        for i in 0..frames {
            let frame = self.next_frame()?;
            timer.record(self.timer.last_frame_time_ms());
            let probability = frame.total_probability(dx);
            if i == 0 {
                initial_probability = probability;
            }
            final_probability = probability;
            time = frame.time;
            sink.consume(frame)?;
        }

        let summary = RunSummary {
            frames,
            steps: self.steps,
            time,
            initial_probability,
            final_probability,
            divergent_frames: self.divergent_frames - divergent_before,
            mean_frame_ms: timer.mean_frame_time_ms(),
        };
        info!(
            "Run complete: {} frames, {} steps, t = {:.3}, probability drift {:.3e}, {:.2} ms/frame",
            summary.frames,
            summary.steps,
            summary.time,
            summary.probability_drift(),
            summary.mean_frame_ms
        );
        Ok(summary)
    }

    /// Replace the field with a fresh packet and start counting from frame 0
    ///
    /// The boundary is enforced the same way as in [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Executor upload failures.
    pub fn restart(&mut self, packet: &WavePacket) -> SolverResult<()> {
        self.grid.seed_wave_packet(packet);
        prepare_field(&mut self.grid, self.config.boundary);
        self.executor.upload(&self.grid)?;
        self.reference_probability = self.grid.total_probability();
        self.steps = 0;
        self.frames = 0;
        self.divergent_frames = 0;
        debug!("Engine restarted with packet at {:?}", packet.center);
        Ok(())
    }
}

/// Pin the boundary ring, keeping the caller's total probability
fn prepare_field(grid: &mut GridState, boundary: BoundaryPolicy) {
    let removed = grid.enforce_boundary(boundary);
    if removed > 0.0 {
        warn!(
            "Initial field had probability {:.3e} on the reflective ring; zeroed and renormalized",
            removed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Plane;
    use approx::assert_relative_eq;

    fn seeded_grid(n: usize) -> GridState {
        let mut grid = GridState::new(n, n, 1.0, Plane::new(n, n)).unwrap();
        grid.seed_wave_packet(&WavePacket {
            center: (n as f32 / 2.0, n as f32 / 2.0),
            width: 2.0,
            momentum: (1.0, 0.0),
        });
        grid
    }

    #[test]
    fn test_first_frame_is_initial_state() {
        let grid = seeded_grid(16);
        let expected = grid.total_probability();
        let mut engine =
            SimulationEngine::new(grid, SimulationConfig::default(), ExecutionContext::Sequential)
                .unwrap();
        let f0 = engine.next_frame().unwrap();
        assert_eq!((f0.index, f0.step), (0, 0));
        assert_eq!(f0.time, 0.0);
        assert_relative_eq!(f0.total_probability(1.0), expected, max_relative = 1e-5);
        for i in 0..16 {
            assert_eq!(engine.grid().density_at(i, 0), 0.0);
            assert_eq!(engine.grid().density_at(15, i), 0.0);
        }

        let f1 = engine.next_frame().unwrap();
        assert_eq!((f1.index, f1.step), (1, 20));
        assert_eq!(engine.steps_taken(), 20);
        assert_eq!(engine.frames_emitted(), 2);
    }

    #[test]
    fn test_run_emits_exact_frame_count() {
        let config = SimulationConfig {
            steps_per_frame: 5,
            ..SimulationConfig::default()
        };
        let mut engine =
            SimulationEngine::new(seeded_grid(16), config, ExecutionContext::Sequential).unwrap();
        let mut frames: Vec<Frame> = Vec::new();
        let summary = engine.run(7, &mut frames).unwrap();
        assert_eq!(frames.len(), 7);
        assert_eq!(summary.frames, 7);
        assert_eq!(summary.steps, 30);
        for (i, f) in frames.iter().enumerate() {
            assert_eq!(f.index, i);
            assert_eq!(f.step, i * 5);
        }
        assert_eq!(summary.divergent_frames, 0);
    }

    #[test]
    fn test_dx_mismatch_rejected() {
        let config = SimulationConfig {
            dx: 0.5,
            ..SimulationConfig::default()
        };
        let result = SimulationEngine::new(seeded_grid(8), config, ExecutionContext::Sequential);
        assert!(matches!(result, Err(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn test_divergence_aborts_when_requested() {
        // dt far above the stability limit of 0.5
        let config = SimulationConfig {
            dt: 2.0,
            steps_per_frame: 50,
            divergence_bound: Some(10.0),
            abort_on_divergence: true,
            ..SimulationConfig::default()
        };
        let mut engine =
            SimulationEngine::new(seeded_grid(16), config, ExecutionContext::Sequential).unwrap();
        engine.next_frame().unwrap();
        match engine.next_frame() {
            Err(SolverError::NumericDivergence { frame, .. }) => assert_eq!(frame, 1),
            other => panic!("expected NumericDivergence, got {other:?}"),
        }
    }

    #[test]
    fn test_divergence_only_warns_by_default() {
        let config = SimulationConfig {
            dt: 2.0,
            steps_per_frame: 50,
            divergence_bound: Some(10.0),
            ..SimulationConfig::default()
        };
        let mut engine =
            SimulationEngine::new(seeded_grid(16), config, ExecutionContext::Sequential).unwrap();
        let mut frames = Vec::new();
        let summary = engine.run(3, &mut frames).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(summary.divergent_frames >= 1);
    }

    #[test]
    fn test_fine_grid_packet_is_not_divergent() {
        // dx = 0.01 puts the peak density of a unit-norm packet near 1.6e3
        let n = 32;
        let mut grid = GridState::new(n, n, 0.01, Plane::new(n, n)).unwrap();
        grid.seed_wave_packet(&WavePacket {
            center: (16.0, 16.0),
            width: 1.0,
            momentum: (0.0, 0.0),
        });
        let config = SimulationConfig {
            dx: 0.01,
            dt: 1.0e-5,
            steps_per_frame: 10,
            abort_on_divergence: true,
            ..SimulationConfig::default()
        };
        assert!(config.dt < config.stability_limit(0.0));
        let mut engine = SimulationEngine::new(grid, config, ExecutionContext::Sequential).unwrap();
        let mut frames = Vec::new();
        let summary = engine.run(4, &mut frames).unwrap();
        assert!(frames[0].peak_density() > 1.0e3);
        assert_eq!(summary.divergent_frames, 0);
    }

    #[test]
    fn test_ring_probability_is_restored() {
        // Packet wide enough to reach the walls of a 16x16 box
        let mut grid = GridState::new(16, 16, 1.0, Plane::new(16, 16)).unwrap();
        grid.seed_wave_packet(&WavePacket {
            center: (8.0, 8.0),
            width: 4.0,
            momentum: (0.0, 0.0),
        });
        assert!(grid.density_at(0, 8) > 0.0);
        let engine = SimulationEngine::new(
            grid,
            SimulationConfig::default(),
            ExecutionContext::Sequential,
        )
        .unwrap();
        assert_eq!(engine.grid().density_at(0, 8), 0.0);
        assert_relative_eq!(engine.grid().total_probability(), 1.0, max_relative = 1e-5);
    }

    #[test]
    fn test_observable_follows_builder() {
        let engine = SimulationEngine::new(
            seeded_grid(8),
            SimulationConfig::default(),
            ExecutionContext::Sequential,
        )
        .unwrap();
        assert_eq!(engine.observable(), Observable::Density);
        let engine = engine.with_observable(Observable::Amplitude);
        assert_eq!(engine.observable(), Observable::Amplitude);
        assert_eq!(engine.time(), 0.0);
    }

    #[test]
    fn test_restart_resets_counters() {
        let mut engine = SimulationEngine::new(
            seeded_grid(16),
            SimulationConfig::default(),
            ExecutionContext::Sequential,
        )
        .unwrap();
        engine.next_frame().unwrap();
        engine.next_frame().unwrap();
        engine.restart(&WavePacket {
            center: (8.0, 8.0),
            width: 2.0,
            momentum: (0.0, 0.0),
        })
        .unwrap();
        assert_eq!(engine.steps_taken(), 0);
        assert_eq!(engine.grid().density_at(0, 8), 0.0);
        assert_relative_eq!(engine.grid().total_probability(), 1.0, max_relative = 1e-5);
        assert_eq!(engine.next_frame().unwrap().index, 0);
    }
}

//! Probability conservation and fixed-point checks

mod common;

use common::{packet_grid, packet_grid_with};
use schrodinger_core::{
    BoundaryPolicy, ExecutionContext, GridState, Integrator, PotentialField, SequentialExecutor,
    SimulationConfig, SimulationEngine, StencilCoefficients, StepExecutor, WavePacket,
};

fn centred_packet() -> WavePacket {
    WavePacket {
        center: (32.0, 32.0),
        width: 4.0,
        momentum: (5.0, 0.0),
    }
}

#[test]
fn test_zero_field_is_a_fixed_point() {
    let grid = GridState::new(32, 24, 1.0, PotentialField::zero(32, 24)).unwrap();
    for context in [
        ExecutionContext::Sequential,
        ExecutionContext::ThreadPool { threads: Some(2) },
    ] {
        let mut engine =
            SimulationEngine::new(grid.clone(), SimulationConfig::default(), context).unwrap();
        let mut frames = Vec::new();
        engine.run(10, &mut frames).unwrap();
        for frame in &frames {
            assert!(frame.density.iter().all(|&d| d == 0.0));
        }
        assert!(engine.grid().real().data.iter().all(|&v| v == 0.0));
        assert!(engine.grid().imag().data.iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_drift_bounded_by_step_count() {
    // Drift after k steps stays below k·dt² (plus float noise)
    let config = SimulationConfig::default();
    let integrator = Integrator::new(config.dt);
    let mut grid = packet_grid(64, 64, &centred_packet());
    grid.apply_boundary(config.boundary);
    let p0 = grid.total_probability();
    let mut exec = SequentialExecutor::new(&config, 64, 64);

    let mut steps = 0;
    for chunk in [10, 90, 400, 500] {
        integrator.advance(&mut exec, &mut grid, chunk).unwrap();
        exec.synchronize(&mut grid).unwrap();
        steps += chunk;
        let drift = (grid.total_probability() - p0).abs() / p0;
        let bound = steps as f32 * config.dt * config.dt + 1e-5;
        assert!(drift <= bound, "drift {drift} after {steps} steps exceeds {bound}");
    }
}

#[test]
fn test_thousand_steps_within_one_percent() {
    for stencil in [StencilCoefficients::five_point(), StencilCoefficients::nine_point()] {
        for boundary in [BoundaryPolicy::Reflective, BoundaryPolicy::Periodic] {
            let config = SimulationConfig {
                stencil,
                boundary,
                steps_per_frame: 100,
                ..SimulationConfig::default()
            };
            let mut engine = SimulationEngine::new(
                packet_grid(64, 64, &centred_packet()),
                config,
                ExecutionContext::Sequential,
            )
            .unwrap();
            let mut frames = Vec::new();
            let summary = engine.run(11, &mut frames).unwrap();
            assert_eq!(summary.steps, 1000);
            assert!(
                summary.probability_drift() < 0.01,
                "{boundary:?}/{stencil:?}: drift {}",
                summary.probability_drift()
            );
        }
    }
}

#[test]
fn test_conservation_in_harmonic_trap() {
    let config = SimulationConfig {
        steps_per_frame: 50,
        ..SimulationConfig::default()
    };
    let potential = PotentialField::harmonic(64, 64, 1.0, 1.0, 0.1);
    assert!(config.dt < config.stability_limit(potential.max_abs()));

    let packet = WavePacket {
        center: (28.0, 32.0),
        width: 3.0,
        momentum: (0.0, 2.0),
    };
    let mut engine = SimulationEngine::new(
        packet_grid_with(potential, &packet),
        config,
        ExecutionContext::ThreadPool { threads: None },
    )
    .unwrap();
    let mut frames = Vec::new();
    let summary = engine.run(20, &mut frames).unwrap();
    assert!(summary.probability_drift() < 0.01);
    assert_eq!(summary.divergent_frames, 0);
}

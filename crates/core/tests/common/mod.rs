//! Shared helpers for the integration suites

#![allow(dead_code)]

use schrodinger_core::{GridState, Plane, PotentialField, WavePacket};

/// Route solver logs to the test harness (`RUST_LOG=debug cargo test`)
#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Grid with a normalized packet over a zero potential
pub fn packet_grid(width: usize, height: usize, packet: &WavePacket) -> GridState {
    let mut grid = GridState::new(width, height, 1.0, PotentialField::zero(width, height))
        .expect("valid grid");
    grid.seed_wave_packet(packet);
    grid
}

/// Grid with a normalized packet over an arbitrary potential
pub fn packet_grid_with(potential: Plane, packet: &WavePacket) -> GridState {
    let (width, height) = potential.dimensions();
    let mut grid = GridState::new(width, height, 1.0, potential).expect("valid grid");
    grid.seed_wave_packet(packet);
    grid
}

/// Compare two fields cell by cell, reporting the worst offender
pub fn compare_fields(expected: &[f32], actual: &[f32], tolerance: f32) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "Field sizes don't match: {} vs {}",
        expected.len(),
        actual.len()
    );

    let mut max_diff = 0.0_f32;
    let mut max_diff_idx = 0;
    for (i, (&a, &b)) in expected.iter().zip(actual.iter()).enumerate() {
        let diff = (a - b).abs();
        if diff > max_diff {
            max_diff = diff;
            max_diff_idx = i;
        }
    }

    assert!(
        max_diff <= tolerance,
        "Fields differ by {max_diff} at index {max_diff_idx} (expected {}, got {}), tolerance {tolerance}",
        expected[max_diff_idx],
        actual[max_diff_idx]
    );
}

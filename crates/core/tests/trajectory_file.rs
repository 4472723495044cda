//! Trajectory file round trips through the engine

mod common;

use common::packet_grid;
use schrodinger_core::{
    ExecutionContext, Observable, SimulationConfig, SimulationEngine, SolverError,
    TrajectoryHeader, TrajectoryReader, TrajectoryWriter, WavePacket,
};
use std::fs;
use std::io::Cursor;

fn engine(observable: Observable) -> SimulationEngine {
    let packet = WavePacket {
        center: (12.0, 10.0),
        width: 2.0,
        momentum: (2.0, 1.0),
    };
    let config = SimulationConfig {
        steps_per_frame: 5,
        ..SimulationConfig::default()
    };
    SimulationEngine::new(packet_grid(24, 20, &packet), config, ExecutionContext::Sequential)
        .unwrap()
        .with_observable(observable)
}

#[test]
fn test_engine_into_writer_and_back() {
    let mut engine = engine(Observable::Amplitude);
    let mut writer = TrajectoryWriter::new(Cursor::new(Vec::new()), 24, 20).unwrap();
    engine.run(8, &mut writer).unwrap();
    assert_eq!(writer.frames_written(), 8);
    let bytes = writer.finish().unwrap().into_inner();

    let reader = TrajectoryReader::new(Cursor::new(bytes)).unwrap().with_timing(5, 0.01);
    assert_eq!(
        reader.header(),
        TrajectoryHeader {
            width: 24,
            height: 20,
            frames: 8
        }
    );
    let frames = reader.read_all().unwrap();
    assert_eq!(frames.len(), 8);
    assert_eq!(frames[7].step, 35);

    // f32 → f64 → f32 is lossless, so the last frame matches the live grid
    let grid = engine.grid();
    for y in 0..20 {
        for x in 0..24 {
            let stored = frames[7].amplitude.as_ref().unwrap()[y * 24 + x];
            let (re, im) = grid.amplitude_at(x, y);
            assert_eq!(stored, [re, im]);
        }
    }
}

#[test]
fn test_density_only_run_cannot_be_written() {
    let mut engine = engine(Observable::Density);
    let mut writer = TrajectoryWriter::new(Cursor::new(Vec::new()), 24, 20).unwrap();
    assert!(matches!(
        engine.run(2, &mut writer),
        Err(SolverError::MissingAmplitude)
    ));
}

#[test]
fn test_file_round_trip() {
    let path = std::env::temp_dir().join("schrodinger_core_trajectory_test.bin");

    let mut engine = engine(Observable::Amplitude);
    let mut writer = TrajectoryWriter::create(&path, 24, 20).unwrap();
    engine.run(3, &mut writer).unwrap();
    writer.finish().unwrap();

    let size = fs::metadata(&path).unwrap().len();
    assert_eq!(size, 16 + 3 * 24 * 20 * 16);

    let reader = TrajectoryReader::open(&path).unwrap();
    assert_eq!(reader.header().frames, 3);
    let frames: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
    assert_eq!(frames.len(), 3);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_unfinished_writer_reads_as_empty() {
    let mut engine = engine(Observable::Amplitude);
    let frame = engine.next_frame().unwrap();

    // Header still says 0 frames until finish() patches it
    let mut cursor = Cursor::new(Vec::new());
    let mut w = TrajectoryWriter::new(&mut cursor, 24, 20).unwrap();
    w.write_frame(&frame).unwrap();
    drop(w);
    let reader = TrajectoryReader::new(Cursor::new(cursor.into_inner())).unwrap();
    assert_eq!(reader.header().frames, 0);
    assert!(reader.read_all().unwrap().is_empty());
}

#[test]
fn test_bad_magic_rejected() {
    let mut bytes = b"HDF5".to_vec();
    bytes.extend_from_slice(&24_i32.to_le_bytes());
    bytes.extend_from_slice(&20_i32.to_le_bytes());
    bytes.extend_from_slice(&0_i32.to_le_bytes());
    match TrajectoryReader::new(Cursor::new(bytes)) {
        Err(SolverError::InvalidTrajectory(msg)) => assert!(msg.contains("magic")),
        Err(e) => panic!("expected InvalidTrajectory, got {e}"),
        Ok(_) => panic!("bad magic accepted"),
    }
}

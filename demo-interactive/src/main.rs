//! Interactive Schrödinger Solver Demo
//!
//! A terminal-based stepper for the wave packet solver. Advances the
//! simulation frame by frame, inspects cells and renders the probability
//! density as an ASCII heatmap.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package demo-interactive [scenario.json]
//! ```
//!
//! # Commands
//!
//! - `step [n]` - Advance n frames (default 1)
//! - `status` - Show simulation status
//! - `probe <x> <y>` - Show amplitude, density and potential at a cell
//! - `packet <x> <y> [px] [py] [width]` - Restart with a new wave packet
//! - `reset [w] [h]` - Rebuild the simulation, optionally with new dimensions
//! - `heatmap [size]` - Render the density as an ASCII heatmap
//! - `save <path>` - Write the current scenario as JSON
//! - `help` - Show available commands
//! - `quit` - Exit

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use schrodinger_core::{Frame, ScenarioConfig, SimulationEngine, WavePacket};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Largest lattice edge accepted from the prompt
const MAX_EDGE: usize = 1024;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║        Schrödinger Wave Packet - Interactive Stepper      ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();

    let mut rl = DefaultEditor::new().context("failed to create readline")?;

    let mut scenario = match std::env::args().nth(1) {
        Some(path) => ScenarioConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => {
            let mut scenario = ScenarioConfig::default();
            let (width, height) = prompt_dimensions(&mut rl, scenario.width, scenario.height);
            resize(&mut scenario, width, height);
            scenario
        }
    };

    let mut engine = build_engine(&scenario)?;
    let mut last = engine.next_frame()?;
    println!(
        "Created {}x{} lattice on the {} backend, packet at ({:.1}, {:.1})",
        scenario.width,
        scenario.height,
        engine.backend(),
        scenario.packet.center.0,
        scenario.packet.center.1
    );
    println!("\nType 'help' for available commands.\n");

    loop {
        let readline = rl.readline("psi> ");
        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                let parts: Vec<&str> = line.split_whitespace().collect();

                if parts.is_empty() {
                    continue;
                }

                match parts[0].to_lowercase().as_str() {
                    "step" | "s" => {
                        let count = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
                        match step_frames(&mut engine, count) {
                            Ok(frame) => last = frame,
                            Err(e) => println!("Step failed: {e}"),
                        }
                    }
                    "status" | "st" => show_status(&engine, &last),
                    "probe" | "p" => {
                        let x = parts.get(1).and_then(|s| s.parse().ok());
                        let y = parts.get(2).and_then(|s| s.parse().ok());
                        match (x, y) {
                            (Some(x), Some(y)) => show_probe(&engine, x, y),
                            _ => println!("Usage: probe <x> <y>"),
                        }
                    }
                    "packet" | "pk" => {
                        let arg = |i: usize| parts.get(i).and_then(|s| s.parse::<f32>().ok());
                        let (Some(x), Some(y)) = (arg(1), arg(2)) else {
                            println!("Usage: packet <x> <y> [px] [py] [width]");
                            continue;
                        };
                        let packet = WavePacket {
                            center: (x, y),
                            momentum: (
                                arg(3).unwrap_or(scenario.packet.momentum.0),
                                arg(4).unwrap_or(scenario.packet.momentum.1),
                            ),
                            width: arg(5).unwrap_or(scenario.packet.width),
                        };
                        match engine.restart(&packet).and_then(|()| engine.next_frame()) {
                            Ok(frame) => {
                                scenario.packet = packet;
                                last = frame;
                                println!("Packet reset: {packet:?}");
                            }
                            Err(e) => println!("Restart failed: {e}"),
                        }
                    }
                    "reset" | "r" => {
                        let width = parts.get(1).and_then(|s| s.parse().ok());
                        let height = parts.get(2).and_then(|s| s.parse().ok()).or(width);
                        if let (Some(w), Some(h)) = (width, height) {
                            resize(&mut scenario, w, h);
                        }
                        match build_engine(&scenario).and_then(|mut e| {
                            let frame = e.next_frame()?;
                            Ok((e, frame))
                        }) {
                            Ok((e, frame)) => {
                                engine = e;
                                last = frame;
                                println!(
                                    "Simulation reset on a {}x{} lattice",
                                    scenario.width, scenario.height
                                );
                            }
                            Err(e) => println!("Reset failed: {e:#}"),
                        }
                    }
                    "heatmap" | "hm" => {
                        let size = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(32);
                        show_heatmap(&engine, &last, size);
                    }
                    "save" => match parts.get(1) {
                        Some(path) => match scenario.save(path) {
                            Ok(()) => println!("Scenario written to {path}"),
                            Err(e) => println!("Save failed: {e}"),
                        },
                        None => println!("Usage: save <path>"),
                    },
                    "help" | "?" => show_help(),
                    "quit" | "q" | "exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => println!(
                        "Unknown command: {}. Type 'help' for available commands.",
                        parts[0]
                    ),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    Ok(())
}

/// Prompt for lattice dimensions, falling back to the defaults on empty input
fn prompt_dimensions(rl: &mut DefaultEditor, width: usize, height: usize) -> (usize, usize) {
    println!("Enter lattice dimensions (or press Enter for defaults):");
    let mut ask = |label: &str, default: usize| {
        rl.readline(&format!("  {label} in cells [{default}]: "))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(default)
            .clamp(3, MAX_EDGE)
    };
    let width = ask("Width", width);
    let height = ask("Height", height);
    println!();
    (width, height)
}

/// Change the lattice size, keeping the packet at the same relative position
fn resize(scenario: &mut ScenarioConfig, width: usize, height: usize) {
    let width = width.clamp(3, MAX_EDGE);
    let height = height.clamp(3, MAX_EDGE);
    let (cx, cy) = scenario.packet.center;
    scenario.packet.center = (
        cx / scenario.width as f32 * width as f32,
        cy / scenario.height as f32 * height as f32,
    );
    scenario.width = width;
    scenario.height = height;
}

fn build_engine(scenario: &ScenarioConfig) -> Result<SimulationEngine> {
    let grid = scenario.build_grid()?;
    let engine = SimulationEngine::new(grid, scenario.simulation, scenario.execution)?;
    Ok(engine)
}

/// Advance `count` frames and report timing
fn step_frames(engine: &mut SimulationEngine, count: usize) -> Result<Frame> {
    let count = count.max(1);
    let dx = engine.grid().dx();
    let start = Instant::now();
    let mut frame = engine.next_frame()?;
    for _ in 1..count {
        frame = engine.next_frame()?;
    }
    let elapsed = start.elapsed();
    println!(
        "Advanced {} frame(s) ({} steps) in {:.2} ms; t = {:.3}, P = {:.6}",
        count,
        count * engine.config().steps_per_frame,
        elapsed.as_secs_f64() * 1000.0,
        frame.time,
        frame.total_probability(dx)
    );
    Ok(frame)
}

fn show_status(engine: &SimulationEngine, frame: &Frame) {
    let config = engine.config();
    let grid = engine.grid();
    let (cx, cy) = frame.centroid();
    println!("\n═══════════════ SIMULATION STATUS ═══════════════");
    println!("Lattice:        {} x {} (dx = {})", grid.width(), grid.height(), grid.dx());
    println!("Backend:        {}", engine.backend());
    println!("Boundary:       {:?}", config.boundary);
    println!("Time step:      {} ({} steps/frame)", config.dt, config.steps_per_frame);
    println!("Frame:          {}", frame.index);
    println!("Steps taken:    {}", engine.steps_taken());
    println!("Time:           {:.4}", engine.time());
    println!("Probability:    {:.6}", frame.total_probability(grid.dx()));
    println!("Peak density:   {:.4e}", frame.peak_density());
    println!("Centroid:       ({cx:.2}, {cy:.2})");
    println!("Spread:         {:.3}", frame.spread());
    println!(
        "Frame time:     {:.2} ms (mean {:.2} ms)",
        engine.frame_timer().last_frame_time_ms(),
        engine.frame_timer().mean_frame_time_ms()
    );
    println!("═════════════════════════════════════════════════\n");
}

fn show_probe(engine: &SimulationEngine, x: usize, y: usize) {
    let grid = engine.grid();
    if x >= grid.width() || y >= grid.height() {
        println!(
            "Cell ({x}, {y}) is outside the {}x{} lattice",
            grid.width(),
            grid.height()
        );
        return;
    }
    let (re, im) = grid.amplitude_at(x, y);
    println!("Cell ({x}, {y}):");
    println!("  ψ         = {re:+.6e} {im:+.6e}i");
    println!("  |ψ|²      = {:.6e}", grid.density_at(x, y));
    println!("  arg ψ     = {:+.4} rad", im.atan2(re));
    println!("  V         = {}", grid.potential().get(x, y));
}

/// Display an ASCII heatmap of the probability density
/// Heatmap blocks per axis: at least 4, never more than the lattice has cells
fn heatmap_shape(size: usize, width: usize, height: usize) -> (usize, usize) {
    let size = size.max(4);
    (size.min(width), size.min(height))
}

fn show_heatmap(engine: &SimulationEngine, frame: &Frame, size: usize) {
    println!("\n═══════════════ DENSITY HEATMAP ═══════════════");

    let grid = engine.grid();
    let (cols, rows) = heatmap_shape(size, frame.width, frame.height);
    let cell_w = frame.width as f32 / cols as f32;
    let cell_h = frame.height as f32 / rows as f32;

    // Block average of density, and whether the block touches a potential wall
    let mut blocks = vec![0.0_f32; cols * rows];
    let mut counts = vec![0_u32; cols * rows];
    let mut walls = vec![false; cols * rows];
    for y in 0..frame.height {
        let by = ((y as f32 / cell_h) as usize).min(rows - 1);
        for x in 0..frame.width {
            let bx = ((x as f32 / cell_w) as usize).min(cols - 1);
            let i = by * cols + bx;
            blocks[i] += frame.density_at(x, y);
            counts[i] += 1;
            if grid.potential().get(x, y) > 0.0 {
                walls[i] = true;
            }
        }
    }
    for (value, &count) in blocks.iter_mut().zip(&counts) {
        if count > 0 {
            *value /= count as f32;
        }
    }

    let peak = blocks.iter().copied().fold(0.0_f32, f32::max);
    // Below this fraction of the peak a block reads as empty
    const FLOOR: f32 = 0.02;

    println!("Legend: · ≈ 0   # = potential wall");
    println!(
        "        ░ >{:.1e}  ▒ >{:.1e}  ▓ >{:.1e}  █ >{:.1e}",
        peak * FLOOR,
        peak * 0.25,
        peak * 0.5,
        peak * 0.75
    );
    println!("Frame {} at t = {:.3}\n", frame.index, frame.time);

    for by in 0..rows {
        print!("{:4} │ ", (by as f32 * cell_h) as usize);
        for bx in 0..cols {
            let i = by * cols + bx;
            let fraction = if peak > 0.0 { blocks[i] / peak } else { 0.0 };
            let c = if fraction >= 0.75 {
                '█'
            } else if fraction >= 0.5 {
                '▓'
            } else if fraction >= 0.25 {
                '▒'
            } else if fraction >= FLOOR {
                '░'
            } else if walls[i] {
                '#'
            } else {
                '·'
            };
            print!("{c} ");
        }
        println!();
    }

    print!("     └");
    for _ in 0..cols {
        print!("──");
    }
    println!();
    print!("       ");
    for bx in (0..cols).step_by(5) {
        print!("{:<10}", (bx as f32 * cell_w) as usize);
    }
    println!("\n");
    println!("═══════════════════════════════════════════════\n");
}

fn show_help() {
    println!("\n═══════════════ AVAILABLE COMMANDS ═══════════════");
    println!("  step [n], s [n]      - Advance n frames (default 1)");
    println!("  status, st           - Show simulation status");
    println!("  probe <x> <y>, p     - Show ψ, |ψ|² and V at a cell");
    println!("  packet <x> <y> [px] [py] [width], pk");
    println!("                       - Restart with a new packet (momentum in cycles per domain)");
    println!("  reset [w] [h], r     - Rebuild the simulation (optional: new width/height)");
    println!("  heatmap [size], hm   - Show density heatmap");
    println!("  save <path>          - Write the current scenario as JSON");
    println!("  help, ?              - Show this help");
    println!("  quit, q              - Exit");
    println!("══════════════════════════════════════════════════\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heatmap_shape_fits_small_lattices() {
        assert_eq!(heatmap_shape(40, 3, 3), (3, 3));
        assert_eq!(heatmap_shape(2, 3, 64), (3, 4));
        assert_eq!(heatmap_shape(40, 128, 96), (40, 40));
        assert_eq!(heatmap_shape(200, 128, 96), (128, 96));
    }
}

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use schrodinger_core::{
    BoundaryPolicy, ExecutionContext, Frame, FrameSink, Observable, PotentialPreset,
    ScenarioConfig, SimulationEngine, SolverResult, StencilCoefficients, TrajectoryWriter,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Headless Schrödinger wave packet run with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "schrodinger-demo")]
#[command(about = "Batch 2D time-dependent Schrödinger solver", long_about = None)]
struct Args {
    /// Scenario JSON file; flags below override its fields
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Lattice width in cells
    #[arg(long)]
    width: Option<usize>,

    /// Lattice height in cells
    #[arg(long)]
    height: Option<usize>,

    /// Frames to emit (frame 0 is the initial state)
    #[arg(short, long)]
    frames: Option<usize>,

    /// Integrator time step
    #[arg(long)]
    dt: Option<f32>,

    /// Integrator steps between frames
    #[arg(long)]
    steps_per_frame: Option<usize>,

    /// Edge rule
    #[arg(short, long, value_enum)]
    boundary: Option<BoundaryArg>,

    /// Laplacian stencil
    #[arg(long, value_enum)]
    stencil: Option<StencilArg>,

    /// Execution strategy
    #[arg(short = 'x', long, value_enum)]
    backend: Option<BackendArg>,

    /// Worker threads for the thread-pool backend (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Potential landscape
    #[arg(short, long, value_enum)]
    potential: Option<PotentialArg>,

    /// Packet centre as "x,y" in cells
    #[arg(long, value_parser = parse_pair)]
    center: Option<(f32, f32)>,

    /// Packet momentum as "px,py" in cycles per domain length
    #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
    momentum: Option<(f32, f32)>,

    /// Packet width in cells
    #[arg(long)]
    packet_width: Option<f32>,

    /// Write the complex amplitude of every frame to this trajectory file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the resolved scenario as JSON and exit
    #[arg(long)]
    dump_scenario: Option<PathBuf>,

    /// Print a status line every N frames (0 = never)
    #[arg(short, long, default_value_t = 10)]
    report_every: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoundaryArg {
    Reflective,
    Periodic,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StencilArg {
    FivePoint,
    NinePoint,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Sequential,
    ThreadPool,
    Gpu,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PotentialArg {
    Zero,
    Harmonic,
    Barrier,
    DoubleSlit,
    BoxWell,
}

fn parse_pair(s: &str) -> Result<(f32, f32), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"a,b\", got {s:?}"))?;
    let a = a.trim().parse().map_err(|e| format!("{a:?}: {e}"))?;
    let b = b.trim().parse().map_err(|e| format!("{b:?}: {e}"))?;
    Ok((a, b))
}

impl PotentialArg {
    /// Preset sized to the lattice, matching the proportions of the bundled scenarios
    fn preset(self, width: usize, height: usize) -> PotentialPreset {
        match self {
            Self::Zero => PotentialPreset::Zero,
            Self::Harmonic => PotentialPreset::Harmonic { omega: 0.05 },
            Self::Barrier => PotentialPreset::Barrier {
                x0: width * 5 / 8,
                thickness: 2,
                strength: 2.0,
            },
            Self::DoubleSlit => PotentialPreset::DoubleSlit {
                x0: width * 5 / 8,
                thickness: 2,
                slit_width: (height / 16).max(1),
                separation: (height / 5).max(2),
                strength: 50.0,
            },
            Self::BoxWell => PotentialPreset::BoxWell {
                size: width.min(height) / 2,
                depth: -1.0,
            },
        }
    }
}

/// Build the scenario: file (or defaults) first, then command-line overrides
fn resolve_scenario(args: &Args) -> Result<ScenarioConfig> {
    let mut scenario = match &args.scenario {
        Some(path) => ScenarioConfig::load(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };

    if let Some(width) = args.width {
        scenario.width = width;
    }
    if let Some(height) = args.height {
        scenario.height = height;
    }
    if let Some(frames) = args.frames {
        scenario.frames = frames;
    }
    if let Some(dt) = args.dt {
        scenario.simulation.dt = dt;
    }
    if let Some(steps) = args.steps_per_frame {
        scenario.simulation.steps_per_frame = steps;
    }
    if let Some(boundary) = args.boundary {
        scenario.simulation.boundary = match boundary {
            BoundaryArg::Reflective => BoundaryPolicy::Reflective,
            BoundaryArg::Periodic => BoundaryPolicy::Periodic,
        };
    }
    if let Some(stencil) = args.stencil {
        scenario.simulation.stencil = match stencil {
            StencilArg::FivePoint => StencilCoefficients::five_point(),
            StencilArg::NinePoint => StencilCoefficients::nine_point(),
        };
    }
    if let Some(backend) = args.backend {
        scenario.execution = match backend {
            BackendArg::Sequential => ExecutionContext::Sequential,
            BackendArg::ThreadPool => ExecutionContext::ThreadPool {
                threads: (args.threads > 0).then_some(args.threads),
            },
            BackendArg::Gpu => ExecutionContext::Gpu,
        };
    }
    if let Some(potential) = args.potential {
        scenario.potential = potential.preset(scenario.width, scenario.height);
    }
    if let Some(center) = args.center {
        scenario.packet.center = center;
    }
    if let Some(momentum) = args.momentum {
        scenario.packet.momentum = momentum;
    }
    if let Some(width) = args.packet_width {
        scenario.packet.width = width;
    }

    scenario
        .simulation
        .validate()
        .context("invalid simulation settings")?;
    Ok(scenario)
}

/// Prints progress and forwards frames to an optional trajectory file
struct ReportSink {
    every: usize,
    dx: f32,
    writer: Option<TrajectoryWriter<BufWriter<File>>>,
}

impl FrameSink for ReportSink {
    fn consume(&mut self, frame: Frame) -> SolverResult<()> {
        if frame.index.checked_rem(self.every) == Some(0) {
            let (cx, cy) = frame.centroid();
            println!(
                "  frame {:>5}  t = {:>8.3}  P = {:.6}  peak = {:.3e}  centroid = ({:>6.2}, {:>6.2})  spread = {:.2}",
                frame.index,
                frame.time,
                frame.total_probability(self.dx),
                frame.peak_density(),
                cx,
                cy,
                frame.spread()
            );
        }
        match self.writer.as_mut() {
            Some(writer) => writer.consume(frame),
            None => Ok(()),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let scenario = resolve_scenario(&args)?;

    if let Some(path) = &args.dump_scenario {
        scenario
            .save(path)
            .with_context(|| format!("writing scenario {}", path.display()))?;
        println!("Scenario written to {}", path.display());
        return Ok(());
    }
    if scenario.frames == 0 {
        bail!("nothing to do: --frames is 0");
    }

    println!("========================================");
    println!("SCHRÖDINGER SOLVER - HEADLESS RUN");
    println!("========================================");
    println!("Lattice: {} x {} (dx = {})", scenario.width, scenario.height, scenario.simulation.dx);
    println!(
        "Integrator: dt = {}, {} steps/frame, {} frames",
        scenario.simulation.dt, scenario.simulation.steps_per_frame, scenario.frames
    );
    println!("Boundary: {:?}", scenario.simulation.boundary);
    println!("Potential: {:?}", scenario.potential);
    println!("Packet: {:?}", scenario.packet);

    let grid = scenario.build_grid().context("building initial grid")?;
    let observable = if args.output.is_some() {
        Observable::Amplitude
    } else {
        Observable::Density
    };
    let mut engine = SimulationEngine::new(grid, scenario.simulation, scenario.execution)
        .context("creating simulation engine")?
        .with_observable(observable);
    println!("Backend: {}", engine.backend());
    println!("Observable: {:?}", engine.observable());
    println!("========================================");

    let writer = match &args.output {
        Some(path) => Some(
            TrajectoryWriter::create(path, scenario.width, scenario.height)
                .with_context(|| format!("creating trajectory {}", path.display()))?,
        ),
        None => None,
    };
    let mut sink = ReportSink {
        every: args.report_every,
        dx: scenario.simulation.dx,
        writer,
    };

    let started = Instant::now();
    let summary = engine.run(scenario.frames, &mut sink)?;
    let wall = started.elapsed();

    if let (Some(writer), Some(path)) = (sink.writer.take(), &args.output) {
        let frames = writer.frames_written();
        writer.finish().context("finalizing trajectory")?;
        info!("Wrote {} frames to {}", frames, path.display());
    }

    println!("========================================");
    println!("SUMMARY");
    println!("========================================");
    println!("Frames:            {}", summary.frames);
    println!("Steps:             {}", summary.steps);
    println!("Final time:        {:.4}", summary.time);
    println!("Initial P:         {:.6}", summary.initial_probability);
    println!("Final P:           {:.6}", summary.final_probability);
    println!("Relative drift:    {:.3e}", summary.probability_drift());
    println!("Divergent frames:  {}", summary.divergent_frames);
    println!("Mean frame time:   {:.2} ms", summary.mean_frame_ms);
    println!("Wall clock:        {:.2} s", wall.as_secs_f64());
    if let Some(path) = &args.output {
        println!("Trajectory:        {}", path.display());
    }

    Ok(())
}

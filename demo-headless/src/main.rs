use clap::Parser;
use plume_sim_core::{
    DispersionEngine, ExecutionMode, FieldData, Medium, ObstacleMask, PollutionSource,
    QualityPreset, SimulationParameters, SolverConfig, SourceKind, MAX_DENSITY,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Pollutant dispersion demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "plume-sim-demo")]
#[command(about = "Headless pollutant dispersion demo", long_about = None)]
struct Args {
    /// Number of ticks to run
    #[arg(short, long, default_value_t = 200)]
    steps: u32,

    /// Grid size N (overrides the quality preset)
    #[arg(short = 'n', long)]
    size: Option<usize>,

    /// Quality preset (low, medium, high, ultra)
    #[arg(short, long, default_value = "medium")]
    quality: String,

    /// Wind direction in degrees (0 = +x, 90 = +y)
    #[arg(long, default_value_t = 0.0)]
    wind_direction: f32,

    /// Wind speed
    #[arg(short, long, default_value_t = 2.0)]
    wind_speed: f32,

    /// Kinematic viscosity
    #[arg(long, default_value_t = 0.0001)]
    viscosity: f32,

    /// Pollutant diffusion rate
    #[arg(long, default_value_t = 0.0001)]
    diffusion: f32,

    /// Fraction of concentration kept per tick (0-1)
    #[arg(long, default_value_t = 0.995)]
    decay: f32,

    /// Units released per tick by each source
    #[arg(short, long, default_value_t = 50.0)]
    release_rate: f32,

    /// Simulate dispersion in water instead of air
    #[arg(long)]
    water: bool,

    /// Number of randomly placed sources
    #[arg(long, default_value_t = 3)]
    sources: u32,

    /// Number of randomly placed rectangular obstacles
    #[arg(long, default_value_t = 4)]
    obstacles: u32,

    /// Seed for source and obstacle placement
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Run the density step on the GPU when available
    #[arg(short, long)]
    parallel: bool,

    /// Report interval in ticks
    #[arg(long, default_value_t = 20)]
    report_interval: u32,

    /// Print an ASCII density map at the end
    #[arg(short, long)]
    map: bool,

    /// Run validation tests
    #[arg(short, long)]
    validate: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.validate {
        run_validation_tests();
        return;
    }

    println!("=== Pollutant Dispersion Demo ===\n");

    let preset = match args.quality.to_lowercase().as_str() {
        "low" => QualityPreset::Low,
        "high" => QualityPreset::High,
        "ultra" => QualityPreset::Ultra,
        "medium" => QualityPreset::Medium,
        other => {
            println!("Unknown quality '{}', using medium", other);
            QualityPreset::Medium
        }
    };
    let mut config = SolverConfig::from_quality(preset);
    if let Some(size) = args.size {
        config.grid_size = size;
    }
    if args.parallel {
        config.execution = ExecutionMode::Parallel;
    }

    let mut engine = match DispersionEngine::new(config) {
        Ok(engine) => engine,
        Err(err) => {
            error!("Cannot create engine: {}", err);
            std::process::exit(1);
        }
    };
    let n = engine.size();
    println!(
        "Grid: {}x{}, path: {:?}",
        n,
        n,
        engine.execution_mode()
    );
    if let Some(reason) = engine.fallback_reason() {
        println!("Parallel path unavailable: {}", reason);
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mask = random_obstacles(&mut rng, n, args.obstacles);
    if let Err(err) = engine.set_obstacles(&mask) {
        error!("Cannot place obstacles: {}", err);
        std::process::exit(1);
    }
    let sources = random_sources(&mut rng, &mask, args.sources);
    println!(
        "Placed {} obstacle cells and {} sources\n",
        mask.count(),
        sources.len()
    );
    for source in &sources {
        println!("  {:?} source at ({}, {})", source.kind, source.x, source.y);
    }

    let params = SimulationParameters {
        wind_direction: args.wind_direction,
        wind_speed: args.wind_speed,
        viscosity: args.viscosity,
        diffusion_rate: args.diffusion,
        decay_factor: args.decay,
        release_rate: args.release_rate,
        medium: if args.water { Medium::Water } else { Medium::Air },
        ..SimulationParameters::default()
    };

    println!("\nRunning simulation...\n");
    println!(" Tick | Total Mass | Max Density | Step (ms)");
    println!("------|------------|-------------|----------");

    let interval = args.report_interval.max(1);
    for tick in 1..=args.steps {
        engine.step_with(&params, &sources, tick % interval == 0);

        if tick % interval == 0 {
            println!(
                "{:5} | {:10.1} | {:11.2} | {:9.3}",
                tick,
                engine.total_mass(),
                engine.max_density(),
                engine.last_step_ms()
            );
        }
    }
    engine.synchronize();

    println!("\n=== Simulation Complete ===");
    println!("Ticks: {}", engine.tick());
    println!("Final mass: {:.1}", engine.total_mass());
    println!("Peak density: {:.2}", engine.max_density());
    if args.steps > 0 {
        println!("Mean step time: {:.3} ms", engine.average_step_ms());
    }

    if args.map {
        println!();
        print_density_map(&engine.density(), engine.obstacles());
    }

    info!("Demo finished after {} ticks", engine.tick());
}

/// Scatter `count` rectangular blocks over the interior, away from the edges
fn random_obstacles(rng: &mut StdRng, n: usize, count: u32) -> ObstacleMask {
    let mut mask = ObstacleMask::new(n);
    if n < 12 {
        return mask;
    }
    for _ in 0..count {
        let w = rng.random_range(1..=n / 10);
        let h = rng.random_range(2..=n / 6);
        let x0 = rng.random_range(2..n - 2 - w);
        let y0 = rng.random_range(2..n - 2 - h);
        mask.fill_rect(x0, y0, x0 + w, y0 + h);
    }
    mask
}

/// Pick `count` sources on free interior cells, cycling through the source kinds
fn random_sources(rng: &mut StdRng, mask: &ObstacleMask, count: u32) -> Vec<PollutionSource> {
    const KINDS: [SourceKind; 4] = [
        SourceKind::Industrial,
        SourceKind::Vehicular,
        SourceKind::Residential,
        SourceKind::Spill,
    ];
    let n = mask.size();
    let mut sources = Vec::new();
    if n < 3 {
        return sources;
    }

    let mut attempts = 0;
    while sources.len() < count as usize && attempts < 1000 {
        attempts += 1;
        let x = rng.random_range(1..n - 1);
        let y = rng.random_range(1..n - 1);
        if mask.is_blocked(x, y) {
            continue;
        }
        let kind = KINDS[sources.len() % KINDS.len()];
        sources.push(PollutionSource::new(x, y).with_kind(kind));
    }
    sources
}

fn print_density_map(density: &FieldData, obstacles: &ObstacleMask) {
    const SHADES: &[u8] = b" .:-=+*#%@";
    let n = density.size();
    let stride = n.div_ceil(64).max(1);

    for y in (0..n).step_by(stride).rev() {
        let row: String = (0..n)
            .step_by(stride)
            .map(|x| {
                if obstacles.is_blocked(x, y) {
                    return '|';
                }
                let level = (density.get(x, y) / MAX_DENSITY).clamp(0.0, 1.0);
                let shade = (level.sqrt() * (SHADES.len() - 1) as f32).round() as usize;
                char::from(SHADES[shade])
            })
            .collect();
        println!("{}", row);
    }
}

fn run_validation_tests() {
    println!("\n=== Running Validation Tests ===\n");

    println!("Test 1: Downwind Transport");
    let mut engine = match DispersionEngine::with_size(48) {
        Ok(engine) => engine,
        Err(err) => {
            error!("Cannot create engine: {}", err);
            return;
        }
    };
    let params = SimulationParameters {
        wind_speed: 4.0,
        decay_factor: 1.0,
        ..SimulationParameters::default()
    };
    let source = PollutionSource::new(24, 24);
    for _ in 0..60 {
        engine.step(&params, &[source]);
    }
    let density = engine.density();
    let downwind = density.get(30, 24);
    let upwind = density.get(18, 24);
    println!("  Downwind density: {:.2}", downwind);
    println!("  Upwind density: {:.2}", upwind);
    if downwind > upwind {
        println!("  ✓ PASS: Plume drifts downwind");
    } else {
        println!("  ✗ FAIL: Expected more pollutant downwind");
    }

    println!("\nTest 2: Obstacle Blocking");
    let mut engine = match DispersionEngine::with_size(32) {
        Ok(engine) => engine,
        Err(err) => {
            error!("Cannot create engine: {}", err);
            return;
        }
    };
    let mut mask = ObstacleMask::new(32);
    mask.fill_rect(14, 10, 16, 22);
    if let Err(err) = engine.set_obstacles(&mask) {
        error!("Cannot place obstacles: {}", err);
        return;
    }
    for _ in 0..60 {
        engine.step(&params, &[PollutionSource::new(8, 16)]);
    }
    let density = engine.density();
    let u = engine.velocity_x();
    let leaked = (10..=22)
        .flat_map(|y| (14..=16).map(move |x| (x, y)))
        .any(|(x, y)| density.get(x, y) != 0.0 || u.get(x, y) != 0.0);
    if leaked {
        println!("  ✗ FAIL: Pollutant or flow inside the obstacle");
    } else {
        println!("  ✓ PASS: Obstacle cells stay empty and still");
    }

    println!("\nTest 3: Decay");
    let mut engine = match DispersionEngine::with_size(16) {
        Ok(engine) => engine,
        Err(err) => {
            error!("Cannot create engine: {}", err);
            return;
        }
    };
    if let Err(err) = engine.add_density_source(8, 8, 200.0) {
        error!("Cannot add pollutant: {}", err);
        return;
    }
    let still = SimulationParameters {
        decay_factor: 0.5,
        ..SimulationParameters::still()
    };
    engine.step(&still, &[]);
    let value = engine.density().get(8, 8);
    println!("  Density after one tick at decay 0.5: {:.2}", value);
    if (value - 100.0).abs() < 1e-3 {
        println!("  ✓ PASS: Concentration halves");
    } else {
        println!("  ✗ FAIL: Expected 100.0");
    }

    println!("\n=== Validation Complete ===");
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Headless Bench Runner
// Seeded worlds, manual clock, per-run invariant checks, optional JSONL trace
//
// Usage:
//   cargo run --release --bin orbit-bench                         # 5 runs x 600 ticks
//   cargo run --release --bin orbit-bench -- --runs 20            # More seeds
//   cargo run --release --bin orbit-bench -- --ticks 3000         # Longer runs
//   cargo run --release --bin orbit-bench -- --speed 4.0          # Faster sim time
//   cargo run --release --bin orbit-bench -- --galaxies 8         # Denser clusters
//   cargo run --release --bin orbit-bench -- --config engine.json # Override parameters
//   cargo run --release --bin orbit-bench -- --time-series        # Enable JSONL output
//   cargo run --release --bin orbit-bench -- --seed 42            # Custom base seed

mod report;
mod runner;
mod time_series;

use orbital_engine::{EngineConfig, UniverseSpec};
use report::*;
use runner::RunPlan;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    ticks: u64,
    seed: u64,
    speed: f64,
    galaxies: Option<usize>,
    config: Option<PathBuf>,
    time_series: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 5,
        ticks: 600,
        seed: 0,
        speed: 1.0,
        galaxies: None,
        config: None,
        time_series: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(5);
                }
            }
            "--ticks" => {
                i += 1;
                if i < args.len() {
                    cli.ticks = args[i].parse().unwrap_or(600);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--speed" => {
                i += 1;
                if i < args.len() {
                    cli.speed = args[i].parse().unwrap_or(1.0);
                }
            }
            "--galaxies" => {
                i += 1;
                if i < args.len() {
                    cli.galaxies = args[i].parse().ok();
                }
            }
            "--config" => {
                i += 1;
                if i < args.len() {
                    cli.config = Some(PathBuf::from(&args[i]));
                }
            }
            "--time-series" => {
                cli.time_series = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

fn pass_fail(ok: bool) -> &'static str {
    if ok { "PASS" } else { "FAIL" }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();
    let cli = parse_args();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("  orbit-bench: {}", err);
            std::process::exit(2);
        }
    }
}

fn run(cli: &CliArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let mut universe = UniverseSpec::default();
    if let Some(g) = cli.galaxies {
        universe.galaxies_per_anomaly = g;
    }
    let plan = RunPlan { config, universe, ticks: cli.ticks, speed: cli.speed };

    let ts_dir = if cli.time_series {
        Some(Path::new("benchmark-results/time-series").to_path_buf())
    } else {
        None
    };

    println!("\n  Orbital Engine Bench v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  PRNG: ChaCha8Rng | Runs: {} | Ticks/run: {} | Speed: {}x | Base seed: {}",
        cli.runs, cli.ticks, cli.speed, cli.seed
    );
    println!(
        "  World: {} anomalies x {} galaxies x {} stars, {} entities\n",
        plan.universe.anomalies,
        plan.universe.galaxies_per_anomaly,
        plan.universe.stars_per_galaxy,
        plan.universe.entities
    );
    println!(
        "  {:<8} {:>6} {:>8} {:>8} {:>6} {:>10} {:>6} {:>6} {:>8}",
        "Seed", "Bodies", "Escaped", "Captured", "Wells", "PeakSpeed", "Links", "Locks", "Time"
    );
    println!("  {}", "-".repeat(78));

    let suite_start = Instant::now();
    let series = runner::run_series(&plan, cli.runs, cli.seed, ts_dir.as_deref())?;

    for r in &series.individual_runs {
        println!(
            "  {:<8} {:>6} {:>8} {:>8} {:>6} {:>10.1} {:>6} {:>6} {:>6}ms  {}",
            r.seed,
            r.bodies,
            r.escaped,
            r.captured,
            r.wells_fired,
            r.peak_speed,
            r.final_connections,
            r.final_orbit_locks,
            r.elapsed_ms,
            pass_fail(r.pass),
        );
    }

    let total = series.n_runs;
    let passed = series.individual_runs.iter().filter(|r| r.pass).count();
    let failed = total - passed;

    println!("  {}", "-".repeat(78));
    println!(
        "  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total,
        passed,
        failed,
        suite_start.elapsed().as_secs_f64()
    );
    println!("  Aggregates (mean ± 95% CI):");
    for (label, stats) in [
        ("Escapes", &series.escaped),
        ("Captures", &series.captured),
        ("Gravity wells", &series.wells_fired),
        ("Peak speed", &series.peak_speed),
        ("Final connections", &series.final_connections),
        ("Ticks/sec", &series.ticks_per_sec),
    ] {
        let half = (stats.ci_upper - stats.ci_lower) / 2.0;
        println!("    {:<20} {:>10.2} ± {:<8.2}", label, stats.mean, half);
    }
    println!(
        "    {:<20} {}\n",
        "Speed cap / walls",
        pass_fail(failed == 0)
    );

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let timestamp = format!("{}", ts);

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        base_seed: cli.seed,
        ticks_per_run: cli.ticks,
        simulation_speed: cli.speed,
        galaxies_per_anomaly: plan.universe.galaxies_per_anomaly,
        series,
    };

    let dir = Path::new("benchmark-results");
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("orbit-bench-{}.json", timestamp));
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, &json)?;
    println!("  Results saved to: {}\n", path.display());

    Ok(failed == 0)
}

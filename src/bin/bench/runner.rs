// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Headless Runner
// Drives the engine from a manual clock, one seed per run

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use orbital_engine::*;

use crate::report::{RunResult, SeriesReport};
use crate::time_series::TimeSeriesRecorder;

use std::path::Path;
use std::time::Instant;

/// Knobs shared by every run in a series.
pub struct RunPlan {
    pub config: EngineConfig,
    pub universe: UniverseSpec,
    pub ticks: u64,
    pub speed: f64,
}

/// Run one seeded world for `plan.ticks` ticks.
pub fn run_single(
    plan: &RunPlan,
    seed: u64,
    time_series_dir: Option<&Path>,
) -> Result<RunResult, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut engine = GravityEngine::new(plan.config.clone(), seed)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let world = seed_universe(&mut rng, &plan.universe, &plan.config.physics);

    // The store plays the role of the document database; flushes land here
    // synchronously and refreshes read back from it.
    let store = MemoryStore::with_records(world.bodies, world.entities);
    let clock = ManualClock::new(0);
    engine.refresh_from(&store, &store, clock.now_ms());
    engine.set_simulation_speed(plan.speed)?;
    engine.start();

    let bodies = engine.cache().bodies().count();
    let entities = engine.cache().entities().count();
    let max_velocity = plan.config.physics.max_velocity;
    let half_extent = plan.config.boundary.half_extent;

    let mut recorder = time_series_dir.map(|_| TimeSeriesRecorder::new());
    let mut result = RunResult {
        seed,
        pass: true,
        ticks: plan.ticks,
        bodies,
        entities,
        broadcasts: 0,
        flushes: 0,
        escaped: 0,
        captured: 0,
        wells_fired: 0,
        entities_docked: 0,
        peak_speed: 0.0,
        speed_cap_breaches: 0,
        out_of_bounds: 0,
        final_connections: 0,
        final_orbit_locks: 0,
        final_gravity_wells: 0,
        elapsed_ms: 0,
        ticks_per_sec: 0.0,
    };

    for _ in 0..plan.ticks {
        clock.advance(plan.config.scheduler.tick_interval_ms);
        let now = clock.now_ms();
        if engine.refresh_due(now) {
            engine.refresh_from(&store, &store, now);
        }

        let outcome = engine.tick(now);
        if let Some(batch) = &outcome.flush {
            let written = store
                .upsert_bodies(&batch.bodies)
                .and_then(|_| store.upsert_entities(&batch.entities));
            engine.apply_flush_result(batch, written);
            result.flushes += 1;
        }
        if outcome.broadcast.is_some() {
            result.broadcasts += 1;
        }
        result.escaped += outcome.escaped;
        result.captured += outcome.captured;
        result.wells_fired += outcome.wells_fired;
        result.entities_docked += outcome.entities_docked;

        for body in engine.cache().bodies().filter(|b| b.kind.is_movable()) {
            let speed = body.velocity.length();
            result.peak_speed = result.peak_speed.max(speed);
            if speed > max_velocity * (1.0 + 1e-9) {
                result.speed_cap_breaches += 1;
            }
            if (0..3).any(|axis| body.position.axis(axis).abs() > half_extent + 1e-6) {
                result.out_of_bounds += 1;
            }
        }

        if let Some(rec) = recorder.as_mut() {
            rec.record(&engine, &outcome, now);
        }
    }

    if let (Some(rec), Some(dir)) = (&recorder, time_series_dir) {
        let path = dir.join(format!("seed-{}.jsonl", seed));
        rec.write_jsonl(&path)?;
        log::info!("wrote {} tick snapshots to {}", rec.len(), path.display());
    }

    let status = engine.status();
    result.final_connections = status.connection_count;
    result.final_orbit_locks = status.orbit_lock_count;
    result.final_gravity_wells = status.gravity_well_count;
    result.pass = result.speed_cap_breaches == 0 && result.out_of_bounds == 0;

    let elapsed = start.elapsed();
    result.elapsed_ms = elapsed.as_millis();
    result.ticks_per_sec = if elapsed.as_secs_f64() > 0.0 {
        plan.ticks as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    Ok(result)
}

/// Seeds `base_seed..base_seed + runs`, aggregated.
pub fn run_series(
    plan: &RunPlan,
    runs: usize,
    base_seed: u64,
    time_series_dir: Option<&Path>,
) -> Result<SeriesReport, Box<dyn std::error::Error>> {
    let mut results = Vec::with_capacity(runs);
    for offset in 0..runs as u64 {
        let result = run_single(plan, base_seed + offset, time_series_dir)?;
        log::debug!(
            "seed {}: {} escaped, {} captured, {} wells, peak speed {:.1}",
            result.seed,
            result.escaped,
            result.captured,
            result.wells_fired,
            result.peak_speed
        );
        results.push(result);
    }
    Ok(SeriesReport::from_runs(results))
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Per-Tick JSONL Recorder
// One JSON line per tick for independent analysis

use orbital_engine::{BodyKind, ConnectionState, GravityEngine, TickOutcome};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub timestamp: u64,
    pub moved: usize,
    pub escaped: usize,
    pub captured: usize,
    pub wells_fired: usize,
    pub entities_docked: usize,
    pub flushed: bool,
    pub connections: usize,
    pub forming: usize,
    pub stable: usize,
    pub strained: usize,
    pub breaking: usize,
    pub orbit_locks: usize,
    pub gravity_wells: usize,
    pub escaped_galaxies: usize,
    pub max_speed: f64,
    pub mean_speed: f64,
}

impl TickSnapshot {
    pub fn capture(engine: &GravityEngine, outcome: &TickOutcome, now_ms: u64) -> Self {
        let records = engine.connections();
        let in_state = |s: ConnectionState| records.iter().filter(|r| r.state == s).count();

        let speeds: Vec<f64> = engine
            .cache()
            .bodies()
            .filter(|b| b.kind.is_movable())
            .map(|b| b.velocity.length())
            .collect();
        let max_speed = speeds.iter().cloned().fold(0.0, f64::max);
        let mean_speed = if speeds.is_empty() { 0.0 } else { speeds.iter().sum::<f64>() / speeds.len() as f64 };

        Self {
            tick: outcome.tick,
            timestamp: now_ms,
            moved: outcome.moved,
            escaped: outcome.escaped,
            captured: outcome.captured,
            wells_fired: outcome.wells_fired,
            entities_docked: outcome.entities_docked,
            flushed: outcome.flush.is_some(),
            connections: records.len(),
            forming: in_state(ConnectionState::Forming),
            stable: in_state(ConnectionState::Stable),
            strained: in_state(ConnectionState::Strained),
            breaking: in_state(ConnectionState::Breaking),
            orbit_locks: engine.orbit_locks().lock_count(),
            gravity_wells: engine.orbit_locks().well_count(),
            escaped_galaxies: engine.cache().of_kind(BodyKind::Galaxy).filter(|g| g.escaped).count(),
            max_speed,
            mean_speed,
        }
    }
}

/// Accumulates snapshots and writes them out as JSONL.
pub struct TimeSeriesRecorder {
    snapshots: Vec<TickSnapshot>,
}

impl TimeSeriesRecorder {
    pub fn new() -> Self {
        Self { snapshots: Vec::new() }
    }

    pub fn record(&mut self, engine: &GravityEngine, outcome: &TickOutcome, now_ms: u64) {
        self.snapshots.push(TickSnapshot::capture(engine, outcome, now_ms));
    }

    pub fn write_jsonl(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        for snapshot in &self.snapshots {
            let line = serde_json::to_string(snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}

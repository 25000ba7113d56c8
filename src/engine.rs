// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Engine Core

//! [`GravityEngine`] owns every piece of mutable simulation state and runs
//! one tick of the pipeline at a time:
//!
//! gravity → repulsion/boundary → integrate → connections → orbit locks →
//! entity docking → trails → throttled flush → broadcast.
//!
//! It performs no I/O. The tick hands back a [`TickOutcome`] and the caller
//! decides where the broadcast and the persistence batch go.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::broadcast::{assemble, TickBroadcast};
use crate::cache::{fetch_snapshot, BodyCache, CacheSnapshot, RefreshSummary};
use crate::config::EngineConfig;
use crate::connections::{ConnectionRecord, ConnectionTracker};
use crate::docking::synchronize;
use crate::error::{ConfigError, ControlError, StoreError};
use crate::gravity::apply_gravity;
use crate::integrator::{integrate, ForceMap};
use crate::orbit_lock::OrbitLockTracker;
use crate::repulsion::{apply_boundary, apply_peer_repulsion};
use crate::store::{BodyStore, EntityStore};
use crate::trail::PositionHistory;
use crate::types::*;
use crate::vector::Vec3;

// ─── TickOutcome ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub tick: u64,
    /// Present only when at least one galaxy or star moved.
    pub broadcast: Option<Arc<TickBroadcast>>,
    /// Present on flush ticks when something changed since the last flush.
    pub flush: Option<PersistBatch>,
    pub moved: usize,
    pub escaped: usize,
    pub captured: usize,
    pub wells_fired: usize,
    pub entities_docked: usize,
}

// ─── GravityEngine ───────────────────────────────────────────────────────────

pub struct GravityEngine {
    config: EngineConfig,
    cache: BodyCache,
    connections: ConnectionTracker,
    orbit_locks: OrbitLockTracker,
    trails: PositionHistory,
    rng: ChaCha8Rng,

    tick_counter: u64,
    simulation_speed: f64,
    running: bool,

    dirty_bodies: BTreeSet<BodyId>,
    dirty_entities: BTreeSet<EntityId>,

    last_refresh_ms: Option<u64>,
    refresh_in_flight: bool,
}

impl GravityEngine {
    pub fn new(config: EngineConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, seed))
    }

    /// Engine on the built-in defaults, which always validate.
    pub fn with_defaults(seed: u64) -> Self {
        Self::build(EngineConfig::default(), seed)
    }

    fn build(config: EngineConfig, seed: u64) -> Self {
        Self {
            trails: PositionHistory::new(config.scheduler.trail_length),
            simulation_speed: config.scheduler.default_speed,
            config,
            cache: BodyCache::new(),
            connections: ConnectionTracker::new(),
            orbit_locks: OrbitLockTracker::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick_counter: 0,
            running: false,
            dirty_bodies: BTreeSet::new(),
            dirty_entities: BTreeSet::new(),
            last_refresh_ms: None,
            refresh_in_flight: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &BodyCache {
        &self.cache
    }

    pub fn body(&self, id: &BodyId) -> Option<&CelestialBody> {
        self.cache.body(id)
    }

    pub fn entity(&self, id: &EntityId) -> Option<&DependentEntity> {
        self.cache.entity(id)
    }

    pub fn connection_tracker(&self) -> &ConnectionTracker {
        &self.connections
    }

    pub fn orbit_locks(&self) -> &OrbitLockTracker {
        &self.orbit_locks
    }

    pub fn trails(&self) -> &PositionHistory {
        &self.trails
    }

    pub fn tick_counter(&self) -> u64 {
        self.tick_counter
    }

    /// Current integration step in simulated seconds.
    pub fn dt(&self) -> f64 {
        self.config.scheduler.nominal_dt() * self.simulation_speed
    }

    // ─── Control surface ─────────────────────────────────────────────────

    /// Returns true if the engine was stopped before.
    pub fn start(&mut self) -> bool {
        let changed = !self.running;
        self.running = true;
        if changed {
            log::info!("simulation started at tick {}", self.tick_counter);
        }
        changed
    }

    /// Returns true if the engine was running before.
    pub fn stop(&mut self) -> bool {
        let changed = self.running;
        self.running = false;
        if changed {
            log::info!("simulation stopped at tick {}", self.tick_counter);
        }
        changed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn simulation_speed(&self) -> f64 {
        self.simulation_speed
    }

    /// Accept a speed inside the configured bounds and return the previous one.
    pub fn set_simulation_speed(&mut self, speed: f64) -> Result<f64, ControlError> {
        let s = &self.config.scheduler;
        if !speed.is_finite() || speed < s.min_speed || speed > s.max_speed {
            log::warn!("rejected simulation speed {}", speed);
            return Err(ControlError::SpeedOutOfRange {
                requested: speed,
                current: self.simulation_speed,
                min: s.min_speed,
                max: s.max_speed,
            });
        }
        let previous = self.simulation_speed;
        self.simulation_speed = speed;
        log::info!("simulation speed {} -> {}", previous, speed);
        Ok(previous)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.running,
            tick_rate: self.config.scheduler.tick_rate(),
            simulation_speed: self.simulation_speed,
            connection_count: self.connections.active_count(),
            orbit_lock_count: self.orbit_locks.lock_count(),
            gravity_well_count: self.orbit_locks.well_count(),
            tick_counter: self.tick_counter,
        }
    }

    /// Active (not yet broken) connections.
    pub fn connections(&self) -> Vec<ConnectionRecord> {
        self.connections.records()
    }

    // ─── Cache refresh ───────────────────────────────────────────────────

    pub fn refresh_due(&self, now_ms: u64) -> bool {
        if self.refresh_in_flight {
            return false;
        }
        match self.last_refresh_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.config.scheduler.cache_refresh_secs * 1_000,
        }
    }

    pub fn mark_refresh_started(&mut self) {
        self.refresh_in_flight = true;
    }

    /// Merge a refresh result. A failed read keeps the current working set.
    pub fn apply_refresh(
        &mut self,
        result: Result<CacheSnapshot, StoreError>,
        now_ms: u64,
    ) -> Option<RefreshSummary> {
        self.refresh_in_flight = false;
        self.last_refresh_ms = Some(now_ms);
        match result {
            Ok(snapshot) => {
                let summary = self.cache.apply_snapshot(snapshot);
                let cache = &self.cache;
                self.trails.retain(|id| cache.body(id).is_some());
                log::debug!(
                    "cache refreshed: {} added, {} removed, {} retained",
                    summary.added,
                    summary.removed,
                    summary.retained
                );
                Some(summary)
            }
            Err(err) => {
                log::warn!("cache refresh failed, keeping previous bodies: {}", err);
                None
            }
        }
    }

    /// Synchronous refresh straight from the stores.
    pub fn refresh_from(
        &mut self,
        bodies: &dyn BodyStore,
        entities: &dyn EntityStore,
        now_ms: u64,
    ) -> Option<RefreshSummary> {
        let result = fetch_snapshot(bodies, entities);
        self.apply_refresh(result, now_ms)
    }

    /// Replace the working set wholesale without touching refresh timing.
    pub fn load_snapshot(&mut self, snapshot: CacheSnapshot) -> RefreshSummary {
        let summary = self.cache.apply_snapshot(snapshot);
        let cache = &self.cache;
        self.trails.retain(|id| cache.body(id).is_some());
        summary
    }

    // ─── Persistence bookkeeping ─────────────────────────────────────────

    pub fn dirty_count(&self) -> usize {
        self.dirty_bodies.len() + self.dirty_entities.len()
    }

    /// Collect everything mutated since the last flush.
    pub fn take_flush_batch(&mut self) -> Option<PersistBatch> {
        if self.dirty_bodies.is_empty() && self.dirty_entities.is_empty() {
            return None;
        }
        let bodies = std::mem::take(&mut self.dirty_bodies)
            .into_iter()
            .filter_map(|id| self.cache.body(&id).map(BodyUpdate::from))
            .collect();
        let entities = std::mem::take(&mut self.dirty_entities)
            .into_iter()
            .filter_map(|id| self.cache.entity(&id).map(EntityUpdate::from))
            .collect();
        let batch = PersistBatch { tick: self.tick_counter, bodies, entities };
        (!batch.is_empty()).then_some(batch)
    }

    /// A failed flush puts its records back so the next flush retries them
    /// with whatever state is current by then.
    pub fn apply_flush_result(&mut self, batch: &PersistBatch, result: Result<(), StoreError>) {
        match result {
            Ok(()) => log::debug!(
                "flushed {} bodies and {} entities from tick {}",
                batch.bodies.len(),
                batch.entities.len(),
                batch.tick
            ),
            Err(err) => {
                log::warn!("flush of tick {} failed, will retry: {}", batch.tick, err);
                self.dirty_bodies.extend(batch.bodies.iter().map(|b| b.id.clone()));
                self.dirty_entities.extend(batch.entities.iter().map(|e| e.id.clone()));
            }
        }
    }

    // ─── Tick ────────────────────────────────────────────────────────────

    /// Advance the simulation by one step.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        self.tick_counter += 1;
        let tick = self.tick_counter;
        let dt = self.dt();

        // Forces
        let mut forces = ForceMap::new();
        let gravity = apply_gravity(&mut self.cache, &mut forces, &self.config.physics);
        apply_peer_repulsion(&self.cache, &mut forces, &self.config.physics);
        apply_boundary(&self.cache, &mut forces, &self.config.boundary);

        // Motion
        let displacements = integrate(&mut self.cache, &forces, &gravity.skipped, dt, &self.config);
        let moved = displacements.values().filter(|d| **d != Vec3::ZERO).count();
        self.dirty_bodies.extend(
            displacements
                .iter()
                .filter(|(_, d)| **d != Vec3::ZERO)
                .map(|(id, _)| id.clone()),
        );
        self.dirty_bodies.extend(gravity.escaped.iter().cloned());
        self.dirty_bodies.extend(gravity.captured.iter().map(|(id, _)| id.clone()));
        self.dirty_bodies.extend(gravity.orphaned.iter().cloned());

        // Connections and orbit locks
        self.connections.update(&self.cache, tick, &self.config.connections);
        let fired = self
            .orbit_locks
            .update(&mut self.cache, tick, dt, &mut self.rng, &self.config);
        self.dirty_bodies.extend(fired.iter().map(|w| w.galaxy_id.clone()));

        // Dependent entities
        let (bodies, entities) = self.cache.split_mut();
        let docking = synchronize(bodies, entities, &displacements);
        self.dirty_entities.extend(docking.dirty);

        // Trails
        if tick % self.config.scheduler.trail_sample_ticks == 0 {
            for galaxy in self.cache.of_kind(BodyKind::Galaxy) {
                self.trails.record(&galaxy.id, galaxy.position);
            }
        }

        let flush = if tick % self.config.scheduler.persist_every_ticks == 0 {
            self.take_flush_batch()
        } else {
            None
        };

        let broadcast = (moved > 0).then(|| {
            Arc::new(assemble(
                &self.cache,
                &self.trails,
                &self.connections,
                tick,
                self.simulation_speed,
                now_ms,
            ))
        });

        TickOutcome {
            tick,
            broadcast,
            flush,
            moved,
            escaped: gravity.escaped.len(),
            captured: gravity.captured.len(),
            wells_fired: fired.len(),
            entities_docked: docking.assigned.len(),
        }
    }
}

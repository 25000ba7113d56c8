// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Orbit Lock & Gravity Wells

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::BodyCache;
use crate::config::EngineConfig;
use crate::integrator::apply_impulse;
use crate::types::{BodyId, BodyKind};
use crate::vector::Vec3;

/// Continuous time a galaxy has spent inside its parent's connection band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrbitLock {
    pub anomaly_id: BodyId,
    pub first_tick: u64,
    pub days: f64,
}

/// One fired impulse, kept until its simulated duration runs out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GravityWellEvent {
    pub galaxy_id: BodyId,
    pub anomaly_id: BodyId,
    pub impulse: Vec3,
    pub fired_tick: u64,
    pub remaining_days: f64,
}

/// Random unit vector perpendicular to `axis`, scaled to `strength`.
pub fn perpendicular_impulse<R: Rng + ?Sized>(axis: Vec3, rng: &mut R, strength: f64) -> Vec3 {
    let raw = Vec3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    );
    let direction = match axis.normalized() {
        Some(unit) => (raw - unit * raw.dot(unit))
            .normalized()
            .or_else(|| unit.cross(Vec3::new(0.0, 0.0, 1.0)).normalized())
            .or_else(|| unit.cross(Vec3::new(1.0, 0.0, 0.0)).normalized()),
        None => raw.normalized(),
    };
    direction.unwrap_or(Vec3::new(1.0, 0.0, 0.0)) * strength
}

#[derive(Debug, Clone, Default)]
pub struct OrbitLockTracker {
    locks: BTreeMap<BodyId, OrbitLock>,
    wells: Vec<GravityWellEvent>,
}

impl OrbitLockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, galaxy: &BodyId) -> Option<&OrbitLock> {
        self.locks.get(galaxy)
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn wells(&self) -> &[GravityWellEvent] {
        &self.wells
    }

    pub fn well_count(&self) -> usize {
        self.wells.len()
    }

    /// Accumulate lock time, decay live wells and roll for new ones.
    /// Returns the wells fired this tick.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        cache: &mut BodyCache,
        tick: u64,
        dt: f64,
        rng: &mut R,
        config: &EngineConfig,
    ) -> Vec<GravityWellEvent> {
        let params = &config.orbit_lock;
        let elapsed_days = dt * params.sim_days_per_second;

        for well in &mut self.wells {
            well.remaining_days -= elapsed_days;
        }
        self.wells.retain(|w| w.remaining_days > 0.0);

        let band = config.connections.anomaly_connection_distance;
        let mut fired = Vec::new();

        let mut locked = BTreeMap::new();
        for galaxy in cache.of_kind(BodyKind::Galaxy) {
            let Some(parent) = galaxy
                .parent_id
                .as_ref()
                .and_then(|p| cache.resolve(p, BodyKind::Anomaly))
            else {
                continue;
            };
            if galaxy.position.distance(parent.position) > band {
                continue;
            }
            let lock = match self.locks.remove(&galaxy.id) {
                Some(lock) if lock.anomaly_id == parent.id => lock,
                _ => OrbitLock { anomaly_id: parent.id.clone(), first_tick: tick, days: 0.0 },
            };
            locked.insert(galaxy.id.clone(), (lock, galaxy.position - parent.position));
        }
        // Anything not re-inserted left the band, lost its parent or vanished.
        self.locks.clear();

        for (galaxy_id, (mut lock, axis)) in locked {
            lock.days += elapsed_days;
            if lock.days > params.lock_threshold_days && rng.gen::<f64>() < params.gravity_well_probability {
                let impulse = perpendicular_impulse(axis, rng, params.impulse_strength);
                if let Some(galaxy) = cache.body_mut(&galaxy_id) {
                    apply_impulse(galaxy, impulse, config.physics.max_velocity);
                }
                log::info!(
                    "gravity well fired on galaxy {} after {:.1} days locked to {}",
                    galaxy_id,
                    lock.days,
                    lock.anomaly_id
                );
                let event = GravityWellEvent {
                    galaxy_id: galaxy_id.clone(),
                    anomaly_id: lock.anomaly_id.clone(),
                    impulse,
                    fired_tick: tick,
                    remaining_days: params.gravity_well_duration_days,
                };
                self.wells.push(event.clone());
                fired.push(event);
                lock.days = 0.0;
                lock.first_tick = tick;
            }
            self.locks.insert(galaxy_id, lock);
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CelestialBody;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn locked_cache(x: f64) -> BodyCache {
        let mut cache = BodyCache::new();
        cache.insert_body(CelestialBody::anomaly("a1", Vec3::ZERO));
        cache.insert_body(CelestialBody::galaxy("g1", Vec3::new(x, 0.0, 0.0)).with_parent("a1"));
        cache
    }

    #[test]
    fn test_impulse_is_perpendicular() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let axis = Vec3::new(3.0, -1.0, 2.0);
        for _ in 0..50 {
            let imp = perpendicular_impulse(axis, &mut rng, 15.0);
            assert!((imp.length() - 15.0).abs() < 1e-9);
            assert!(imp.dot(axis).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lock_accumulates_and_clears() {
        let config = EngineConfig::default();
        let mut cache = locked_cache(1_000.0);
        let mut tracker = OrbitLockTracker::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let g1 = BodyId::from("g1");

        for tick in 1..=10 {
            tracker.update(&mut cache, tick, 0.1, &mut rng, &config);
        }
        let lock = tracker.lock(&g1).unwrap();
        assert!((lock.days - 1.0).abs() < 1e-9);
        assert_eq!(lock.first_tick, 1);

        cache.body_mut(&g1).unwrap().position = Vec3::new(3_000.0, 0.0, 0.0);
        tracker.update(&mut cache, 11, 0.1, &mut rng, &config);
        assert!(tracker.lock(&g1).is_none());
        assert_eq!(tracker.lock_count(), 0);
    }

    #[test]
    fn test_well_fires_resets_and_decays() {
        let mut config = EngineConfig::default();
        config.orbit_lock.gravity_well_probability = 1.0;
        config.orbit_lock.lock_threshold_days = 0.5;
        let mut cache = locked_cache(1_000.0);
        let mut tracker = OrbitLockTracker::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let g1 = BodyId::from("g1");

        let mut fired = Vec::new();
        let mut tick = 0;
        while fired.is_empty() {
            tick += 1;
            fired = tracker.update(&mut cache, tick, 0.1, &mut rng, &config);
            assert!(tick < 20, "well never fired");
        }
        assert_eq!(tick, 6);
        let event = &fired[0];
        assert!(event.impulse.x.abs() < 1e-9, "impulse must be perpendicular to the x axis");
        let galaxy = cache.body(&g1).unwrap();
        assert!((galaxy.velocity.length() - config.orbit_lock.impulse_strength).abs() < 1e-9);

        let lock = tracker.lock(&g1).unwrap();
        assert_eq!(lock.days, 0.0);
        assert_eq!(lock.first_tick, tick);
        assert_eq!(tracker.well_count(), 1);

        // Lock threshold is not reached again before the five-day well expires.
        config.orbit_lock.gravity_well_probability = 0.0;
        for t in tick + 1..=tick + 49 {
            tracker.update(&mut cache, t, 0.1, &mut rng, &config);
        }
        assert_eq!(tracker.well_count(), 1);
        for t in tick + 50..=tick + 51 {
            tracker.update(&mut cache, t, 0.1, &mut rng, &config);
        }
        assert_eq!(tracker.well_count(), 0);
    }

    #[test]
    fn test_parent_change_restarts_lock() {
        let config = EngineConfig::default();
        let mut cache = locked_cache(1_000.0);
        cache.insert_body(CelestialBody::anomaly("a2", Vec3::new(2_000.0, 0.0, 0.0)));
        let mut tracker = OrbitLockTracker::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let g1 = BodyId::from("g1");

        tracker.update(&mut cache, 1, 1.0, &mut rng, &config);
        tracker.update(&mut cache, 2, 1.0, &mut rng, &config);
        assert!((tracker.lock(&g1).unwrap().days - 2.0).abs() < 1e-9);

        cache.body_mut(&g1).unwrap().parent_id = Some(BodyId::from("a2"));
        tracker.update(&mut cache, 3, 1.0, &mut rng, &config);
        let lock = tracker.lock(&g1).unwrap();
        assert_eq!(lock.anomaly_id, BodyId::from("a2"));
        assert_eq!(lock.first_tick, 3);
        assert!((lock.days - 1.0).abs() < 1e-9);
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Universe Seeding

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cache::CacheSnapshot;
use crate::config::PhysicsParams;
use crate::gravity::inverse_square;
use crate::types::{CelestialBody, DependentEntity};
use crate::vector::Vec3;

/// Shape of a generated world. Used by the headless runner and tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UniverseSpec {
    pub anomalies: usize,
    pub galaxies_per_anomaly: usize,
    pub stars_per_galaxy: usize,
    pub entities: usize,
    /// Anomalies sit evenly spaced on a ring of this radius.
    pub ring_radius: f64,
    pub min_orbit: f64,
    pub max_orbit: f64,
    pub min_star_orbit: f64,
    pub max_star_orbit: f64,
}

impl Default for UniverseSpec {
    fn default() -> Self {
        Self {
            anomalies: 3,
            galaxies_per_anomaly: 4,
            stars_per_galaxy: 3,
            entities: 6,
            ring_radius: 8_000.0,
            min_orbit: 800.0,
            max_orbit: 2_000.0,
            min_star_orbit: 40.0,
            max_star_orbit: 120.0,
        }
    }
}

fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if let Some(unit) = v.normalized() {
            return unit;
        }
    }
}

/// Direction of travel for a near-circular orbit around `radial`.
fn tangent(radial: Vec3) -> Vec3 {
    radial
        .cross(Vec3::new(0.0, 0.0, 1.0))
        .normalized()
        .or_else(|| radial.cross(Vec3::new(0.0, 1.0, 0.0)).normalized())
        .unwrap_or(Vec3::new(1.0, 0.0, 0.0))
}

/// Speed for a circular orbit of radius `r` under the softened inverse-square law.
fn circular_speed(physics: &PhysicsParams, parent_mass: f64, r: f64) -> f64 {
    let accel = inverse_square(physics, parent_mass, 1.0, r);
    (accel * r).sqrt().min(physics.max_velocity * 0.9)
}

/// Generate a deterministic world for a given RNG state.
pub fn seed_universe<R: Rng + ?Sized>(rng: &mut R, spec: &UniverseSpec, physics: &PhysicsParams) -> CacheSnapshot {
    let mut snapshot = CacheSnapshot::default();
    let mut galaxies: Vec<(String, Vec3)> = Vec::new();

    for a in 0..spec.anomalies {
        let angle = a as f64 * std::f64::consts::TAU / spec.anomalies.max(1) as f64;
        let anomaly_pos = Vec3::new(angle.cos(), angle.sin(), 0.0) * spec.ring_radius;
        let anomaly_id = format!("anomaly-{}", a);
        snapshot
            .bodies
            .push(CelestialBody::anomaly(anomaly_id.as_str(), anomaly_pos).with_name(format!("Anomaly {}", a)));

        for g in 0..spec.galaxies_per_anomaly {
            let mut radial = random_unit(rng);
            radial.z *= 0.2;
            let radial = radial.normalized().unwrap_or(Vec3::new(1.0, 0.0, 0.0));
            let r = rng.gen_range(spec.min_orbit..=spec.max_orbit);
            let position = anomaly_pos + radial * r;
            let velocity = tangent(radial) * circular_speed(physics, physics.anomaly_mass, r);

            let galaxy_id = format!("galaxy-{}-{}", a, g);
            snapshot.bodies.push(
                CelestialBody::galaxy(galaxy_id.as_str(), position)
                    .with_parent(anomaly_id.as_str())
                    .with_velocity(velocity)
                    .with_name(format!("Galaxy {}-{}", a, g)),
            );

            for s in 0..spec.stars_per_galaxy {
                let star_radial = random_unit(rng);
                let sr = rng.gen_range(spec.min_star_orbit..=spec.max_star_orbit);
                let star_velocity = velocity + tangent(star_radial) * circular_speed(physics, physics.galaxy_mass, sr);
                snapshot.bodies.push(
                    CelestialBody::star(format!("star-{}-{}-{}", a, g, s), position + star_radial * sr)
                        .with_parent(galaxy_id.as_str())
                        .with_velocity(star_velocity),
                );
            }
            galaxies.push((galaxy_id, position));
        }
    }

    for e in 0..spec.entities {
        let id = format!("ship-{}", e);
        // Every third ship starts undocked somewhere in the ring.
        if galaxies.is_empty() || e % 3 == 2 {
            let position = random_unit(rng) * rng.gen_range(0.0..spec.ring_radius);
            snapshot.entities.push(DependentEntity::new(&id, position));
            continue;
        }
        let (galaxy_id, position) = &galaxies[e % galaxies.len()];
        let mut entity = DependentEntity::new(&id, *position);
        entity.docked_body_id = Some(galaxy_id.as_str().into());
        entity.docked_body_name = Some(galaxy_id.clone());
        snapshot.entities.push(entity);
    }

    snapshot
}

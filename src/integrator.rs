// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Integrator

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::BodyCache;
use crate::config::EngineConfig;
use crate::repulsion::enforce_wall;
use crate::types::{BodyId, CelestialBody};
use crate::vector::Vec3;

/// Net force accumulated per body during one tick.
pub type ForceMap = BTreeMap<BodyId, Vec3>;

/// Per-body movement produced by one integration pass.
pub type DisplacementMap = BTreeMap<BodyId, Vec3>;

/// Rescale `velocity` so its magnitude does not exceed `max`, keeping direction.
pub fn clamp_speed(velocity: Vec3, max: f64) -> Vec3 {
    let speed = velocity.length();
    if speed > max && speed > 0.0 {
        velocity * (max / speed)
    } else {
        velocity
    }
}

/// Add an instantaneous velocity change and re-apply the speed cap.
pub fn apply_impulse(body: &mut CelestialBody, impulse: Vec3, max_velocity: f64) {
    body.velocity = clamp_speed(body.velocity + impulse, max_velocity);
}

/// Semi-implicit Euler step for one body. Returns the displacement.
pub fn step_body(body: &mut CelestialBody, force: Vec3, dt: f64, config: &EngineConfig) -> Vec3 {
    let before = body.position;
    let mass = body.effective_mass(&config.physics);

    let mut velocity = body.velocity + (force / mass) * dt;
    if !velocity.is_finite() {
        log::warn!("{} {} produced a non-finite velocity, resetting to rest", body.kind, body.id);
        velocity = Vec3::ZERO;
    }
    body.velocity = clamp_speed(velocity, config.physics.max_velocity);
    body.position += body.velocity * dt;
    enforce_wall(&mut body.position, &mut body.velocity, &config.boundary);

    body.position - before
}

/// Integrate every movable body not listed in `skip`. Anomalies never move.
pub fn integrate(
    cache: &mut BodyCache,
    forces: &ForceMap,
    skip: &BTreeSet<BodyId>,
    dt: f64,
    config: &EngineConfig,
) -> DisplacementMap {
    let mut displacements = DisplacementMap::new();
    for body in cache.bodies.values_mut() {
        if !body.kind.is_movable() {
            continue;
        }
        if skip.contains(&body.id) {
            // Position holds, but a stored velocity still has to obey the cap.
            body.velocity = if body.velocity.is_finite() {
                clamp_speed(body.velocity, config.physics.max_velocity)
            } else {
                Vec3::ZERO
            };
            continue;
        }
        let force = forces.get(&body.id).copied().unwrap_or_default();
        let moved = step_body(body, force, dt, config);
        displacements.insert(body.id.clone(), moved);
    }
    displacements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BodyKind;

    #[test]
    fn test_clamp_preserves_direction() {
        let v = clamp_speed(Vec3::new(300.0, 400.0, 0.0), 50.0);
        assert!((v.length() - 50.0).abs() < 1e-9);
        assert!((v.x / v.y - 0.75).abs() < 1e-9);
        assert_eq!(clamp_speed(Vec3::new(1.0, 0.0, 0.0), 50.0), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_acceleration_then_position() {
        let config = EngineConfig::default();
        let mut g = CelestialBody::galaxy("g1", Vec3::ZERO);
        let force = Vec3::new(config.physics.galaxy_mass * 2.0, 0.0, 0.0);
        let moved = step_body(&mut g, force, 0.5, &config);
        // a = 2, v = 1, x = 0.5
        assert!((g.velocity.x - 1.0).abs() < f64::EPSILON);
        assert!((g.position.x - 0.5).abs() < f64::EPSILON);
        assert_eq!(moved, g.position);
    }

    #[test]
    fn test_non_finite_velocity_reset() {
        let config = EngineConfig::default();
        let mut g = CelestialBody::galaxy("g1", Vec3::ZERO);
        step_body(&mut g, Vec3::new(f64::NAN, 0.0, 0.0), 0.1, &config);
        assert_eq!(g.velocity, Vec3::ZERO);
        assert_eq!(g.position, Vec3::ZERO);
    }

    #[test]
    fn test_wall_clamp_after_one_pass() {
        let config = EngineConfig::default();
        let max = config.boundary.half_extent;
        let mut g = CelestialBody::galaxy("g1", Vec3::new(max + 1_000.0, 0.0, 0.0))
            .with_velocity(Vec3::new(20.0, 0.0, 0.0));
        step_body(&mut g, Vec3::ZERO, 0.1, &config);
        assert_eq!(g.position.x, max);
        assert!(g.velocity.x <= 0.0);
    }

    #[test]
    fn test_skipped_body_velocity_still_capped() {
        let config = EngineConfig::default();
        let mut cache = BodyCache::new();
        cache.insert_body(CelestialBody::star("s1", Vec3::new(3.0, 0.0, 0.0)).with_velocity(Vec3::new(500.0, 0.0, 0.0)));
        cache.insert_body(CelestialBody::star("s2", Vec3::ZERO).with_velocity(Vec3::new(f64::NAN, 0.0, 0.0)));

        let skip: BTreeSet<BodyId> = [BodyId::from("s1"), BodyId::from("s2")].into_iter().collect();
        let moved = integrate(&mut cache, &ForceMap::new(), &skip, 0.1, &config);

        assert!(moved.is_empty());
        let s1 = cache.body(&BodyId::from("s1")).unwrap();
        assert_eq!(s1.position, Vec3::new(3.0, 0.0, 0.0));
        assert!((s1.velocity.length() - config.physics.max_velocity).abs() < 1e-9);
        assert_eq!(cache.body(&BodyId::from("s2")).unwrap().velocity, Vec3::ZERO);
    }

    #[test]
    fn test_integrate_skips_anomalies_and_listed_bodies() {
        let config = EngineConfig::default();
        let mut cache = BodyCache::new();
        cache.insert_body(CelestialBody::anomaly("a1", Vec3::ZERO).with_velocity(Vec3::new(5.0, 0.0, 0.0)));
        cache.insert_body(CelestialBody::star("s1", Vec3::ZERO).with_velocity(Vec3::new(5.0, 0.0, 0.0)));
        cache.insert_body(CelestialBody::galaxy("g1", Vec3::ZERO).with_velocity(Vec3::new(5.0, 0.0, 0.0)));

        let skip: BTreeSet<BodyId> = [BodyId::from("s1")].into_iter().collect();
        let moved = integrate(&mut cache, &ForceMap::new(), &skip, 1.0, &config);

        assert_eq!(moved.len(), 1);
        assert_eq!(moved[&BodyId::from("g1")], Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(cache.body(&BodyId::from("a1")).unwrap().position, Vec3::ZERO);
        assert_eq!(cache.body(&BodyId::from("s1")).unwrap().position, Vec3::ZERO);
        assert_eq!(cache.count(BodyKind::Galaxy), 1);
    }
}

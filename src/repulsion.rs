// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Peer Repulsion & Boundary Containment

use crate::cache::BodyCache;
use crate::config::{BoundaryParams, PhysicsParams};
use crate::integrator::ForceMap;
use crate::types::{BodyId, BodyKind};
use crate::vector::Vec3;

// ---------------------------------------------------------------------------
// Peer repulsion
// ---------------------------------------------------------------------------

/// Repulsion magnitude between two galaxies `distance` apart, zero outside
/// the repulsion range. Two-tier: soft beyond the minimum safe separation,
/// `hard_repulsion_multiplier` times stronger inside it.
pub fn repulsion_magnitude(physics: &PhysicsParams, distance: f64) -> f64 {
    if distance >= physics.repulsion_distance {
        return 0.0;
    }
    let base = physics.repulsion_strength / (distance * distance + 1.0);
    if distance < physics.min_galaxy_separation {
        base * physics.hard_repulsion_multiplier
    } else {
        base
    }
}

/// Add galaxy/galaxy repulsion for every ordered pair in range.
///
/// Applied regardless of connection state, so a pair can be drawn as
/// breaking while also being pushed apart here.
pub fn apply_peer_repulsion(cache: &BodyCache, forces: &mut ForceMap, physics: &PhysicsParams) {
    let galaxies: Vec<(&BodyId, Vec3)> = cache
        .of_kind(BodyKind::Galaxy)
        .map(|g| (&g.id, g.position))
        .collect();

    for (i, &(id, pos)) in galaxies.iter().enumerate() {
        let mut total = Vec3::ZERO;
        for (j, &(_, other)) in galaxies.iter().enumerate() {
            if i == j {
                continue;
            }
            let d = pos.distance(other);
            let magnitude = repulsion_magnitude(physics, d);
            if magnitude == 0.0 {
                continue;
            }
            // Coincident galaxies split along x, lower id toward -x.
            let away = (pos - other)
                .normalized()
                .unwrap_or(if i < j { Vec3::new(-1.0, 0.0, 0.0) } else { Vec3::new(1.0, 0.0, 0.0) });
            total += away * magnitude;
        }
        if total != Vec3::ZERO {
            *forces.entry(id.clone()).or_default() += total;
        }
    }
}

// ---------------------------------------------------------------------------
// Boundary containment
// ---------------------------------------------------------------------------

/// Inward nudge for a position near the walls of the containment cube.
pub fn boundary_force(position: Vec3, boundary: &BoundaryParams) -> Vec3 {
    let mut force = Vec3::ZERO;
    for axis in 0..3 {
        let coord = position.axis(axis);
        let outward = coord.signum();
        let gap = boundary.half_extent - coord.abs();
        let push = if gap < boundary.hard_margin {
            boundary.hard_strength
        } else if gap < boundary.soft_margin {
            let depth = boundary.soft_margin - gap;
            boundary.soft_strength * (depth / boundary.soft_margin)
        } else {
            0.0
        };
        *force.axis_mut(axis) = -outward * push;
    }
    force
}

pub fn apply_boundary(cache: &BodyCache, forces: &mut ForceMap, boundary: &BoundaryParams) {
    for galaxy in cache.of_kind(BodyKind::Galaxy) {
        let nudge = boundary_force(galaxy.position, boundary);
        if nudge != Vec3::ZERO {
            *forces.entry(galaxy.id.clone()).or_default() += nudge;
        }
    }
}

/// One-sided wall: clamp any coordinate past the limit and zero the outward
/// velocity component. Returns true if anything was clamped.
pub fn enforce_wall(position: &mut Vec3, velocity: &mut Vec3, boundary: &BoundaryParams) -> bool {
    let limit = boundary.half_extent;
    let mut clamped = false;
    for axis in 0..3 {
        let coord = position.axis(axis);
        if coord.abs() > limit {
            let side = coord.signum();
            *position.axis_mut(axis) = side * limit;
            let v = velocity.axis_mut(axis);
            if *v * side > 0.0 {
                *v = 0.0;
            }
            clamped = true;
        }
    }
    clamped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CelestialBody;

    #[test]
    fn test_two_tier_repulsion() {
        let physics = PhysicsParams::default();
        let inside = repulsion_magnitude(&physics, physics.min_galaxy_separation - 1.0);
        let outside = repulsion_magnitude(&physics, physics.min_galaxy_separation + 1.0);
        assert!(inside > outside * 2.5, "hard tier should be ~3x: {} vs {}", inside, outside);
        assert_eq!(repulsion_magnitude(&physics, physics.repulsion_distance), 0.0);
    }

    #[test]
    fn test_repulsion_is_symmetric() {
        let physics = PhysicsParams::default();
        let mut cache = BodyCache::new();
        cache.insert_body(CelestialBody::galaxy("g1", Vec3::new(-50.0, 0.0, 0.0)));
        cache.insert_body(CelestialBody::galaxy("g2", Vec3::new(50.0, 0.0, 0.0)));
        let mut forces = ForceMap::new();
        apply_peer_repulsion(&cache, &mut forces, &physics);
        let f1 = forces[&BodyId::from("g1")];
        let f2 = forces[&BodyId::from("g2")];
        assert!(f1.x < 0.0 && f2.x > 0.0);
        assert!((f1.x + f2.x).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_galaxies_split() {
        let physics = PhysicsParams::default();
        let mut cache = BodyCache::new();
        cache.insert_body(CelestialBody::galaxy("a", Vec3::ZERO));
        cache.insert_body(CelestialBody::galaxy("b", Vec3::ZERO));
        let mut forces = ForceMap::new();
        apply_peer_repulsion(&cache, &mut forces, &physics);
        assert!(forces[&BodyId::from("a")].x < 0.0);
        assert!(forces[&BodyId::from("b")].x > 0.0);
    }

    #[test]
    fn test_boundary_zones() {
        let b = BoundaryParams::default();
        assert_eq!(boundary_force(Vec3::ZERO, &b), Vec3::ZERO);

        let soft = boundary_force(Vec3::new(b.half_extent - b.soft_margin / 2.0, 0.0, 0.0), &b);
        assert!(soft.x < 0.0 && soft.x > -b.soft_strength);

        let hard = boundary_force(Vec3::new(0.0, -(b.half_extent - b.hard_margin / 2.0), 0.0), &b);
        assert_eq!(hard.y, b.hard_strength);
        assert_eq!(hard.x, 0.0);
    }

    #[test]
    fn test_wall_clamps_and_zeroes_outward_velocity() {
        let b = BoundaryParams::default();
        let mut pos = Vec3::new(b.half_extent + 1_000.0, 0.0, -(b.half_extent + 5.0));
        let mut vel = Vec3::new(3.0, 1.0, 2.0);
        assert!(enforce_wall(&mut pos, &mut vel, &b));
        assert_eq!(pos.x, b.half_extent);
        assert_eq!(pos.z, -b.half_extent);
        assert_eq!(vel.x, 0.0);
        // Moving inward off the -z wall is left alone.
        assert_eq!(vel.z, 2.0);
        assert_eq!(vel.y, 1.0);
    }
}

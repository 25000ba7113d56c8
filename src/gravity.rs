// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Gravity Solver
//
// A captured galaxy feels only its designated parent anomaly. Summing every
// anomaly pulls the whole population toward their centroid, so forces from
// several attractors are combined only while a galaxy is still uncaptured.

use std::collections::BTreeSet;

use crate::cache::BodyCache;
use crate::config::PhysicsParams;
use crate::integrator::ForceMap;
use crate::types::{BodyId, BodyKind, CelestialBody};
use crate::vector::Vec3;

/// What the solver decided for one galaxy this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum GravityOutcome {
    /// Ordinary attraction toward the parent.
    Orbiting,
    /// Inside the minimum distance: pushed away from the parent.
    TooClose,
    /// Left the maximum orbit range; parent is cleared for good.
    Escaped { from: BodyId },
    /// Uncaptured galaxy adopted the nearest anomaly in range.
    Captured { by: BodyId },
    /// No parent and nothing within capture radius (or already escaped).
    Drifting,
    /// Parent id does not resolve to a cached anomaly.
    MissingParent { parent: BodyId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalaxyForce {
    pub force: Vec3,
    pub outcome: GravityOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct GravityReport {
    pub escaped: Vec<BodyId>,
    pub captured: Vec<(BodyId, BodyId)>,
    /// Galaxies whose parent no longer resolved; their parent was cleared.
    pub orphaned: Vec<BodyId>,
    /// Bodies that must not be integrated this tick.
    pub skipped: BTreeSet<BodyId>,
}

/// `G * m1 * m2 / (d² + ε)`.
pub fn inverse_square(physics: &PhysicsParams, m1: f64, m2: f64, distance: f64) -> f64 {
    physics.gravitational_constant * m1 * m2 / (distance * distance + physics.softening)
}

/// Unit vector from `from` toward `to`, +x when the points coincide.
fn direction(from: Vec3, to: Vec3) -> Vec3 {
    (to - from).normalized().unwrap_or(Vec3::new(1.0, 0.0, 0.0))
}

/// Net gravity on a galaxy. Pure: the caller applies the outcome.
pub fn galaxy_gravity(
    galaxy: &CelestialBody,
    cache: &BodyCache,
    physics: &PhysicsParams,
) -> GalaxyForce {
    let mass = galaxy.effective_mass(physics);

    if let Some(parent_id) = &galaxy.parent_id {
        let parent = match cache.resolve(parent_id, BodyKind::Anomaly) {
            Some(p) => p,
            None => {
                return GalaxyForce {
                    force: Vec3::ZERO,
                    outcome: GravityOutcome::MissingParent { parent: parent_id.clone() },
                }
            }
        };
        let d = galaxy.position.distance(parent.position);
        if d > physics.max_orbit_range {
            return GalaxyForce {
                force: Vec3::ZERO,
                outcome: GravityOutcome::Escaped { from: parent_id.clone() },
            };
        }
        let magnitude = inverse_square(physics, parent.effective_mass(physics), mass, d);
        let toward = direction(galaxy.position, parent.position);
        if d < physics.min_anomaly_distance {
            return GalaxyForce {
                force: -toward * (magnitude * physics.anomaly_repulsion_multiplier),
                outcome: GravityOutcome::TooClose,
            };
        }
        return GalaxyForce { force: toward * magnitude, outcome: GravityOutcome::Orbiting };
    }

    if galaxy.escaped {
        return GalaxyForce { force: Vec3::ZERO, outcome: GravityOutcome::Drifting };
    }

    // Uncaptured: sum every anomaly in range, remember the nearest.
    let mut force = Vec3::ZERO;
    let mut nearest: Option<(f64, &BodyId)> = None;
    for anomaly in cache.of_kind(BodyKind::Anomaly) {
        let d = galaxy.position.distance(anomaly.position);
        if d > physics.capture_radius {
            continue;
        }
        let magnitude = inverse_square(physics, anomaly.effective_mass(physics), mass, d);
        force += direction(galaxy.position, anomaly.position) * magnitude;
        // Strict `<` over id-ordered iteration breaks distance ties by id.
        if nearest.map_or(true, |(best, _)| d < best) {
            nearest = Some((d, &anomaly.id));
        }
    }

    match nearest {
        Some((_, id)) => GalaxyForce { force, outcome: GravityOutcome::Captured { by: id.clone() } },
        None => GalaxyForce { force: Vec3::ZERO, outcome: GravityOutcome::Drifting },
    }
}

/// Attraction of a star toward its parent galaxy, `None` when the parent
/// cannot be resolved.
pub fn star_gravity(star: &CelestialBody, cache: &BodyCache, physics: &PhysicsParams) -> Option<Vec3> {
    let parent = cache.resolve(star.parent_id.as_ref()?, BodyKind::Galaxy)?;
    let d = star.position.distance(parent.position);
    let magnitude = inverse_square(
        physics,
        parent.effective_mass(physics),
        star.effective_mass(physics),
        d,
    );
    Some(direction(star.position, parent.position) * magnitude)
}

/// Run the solver over every galaxy and star, accumulating into `forces` and
/// applying escape and capture transitions to the cache.
pub fn apply_gravity(cache: &mut BodyCache, forces: &mut ForceMap, physics: &PhysicsParams) -> GravityReport {
    let mut report = GravityReport::default();

    for id in cache.ids_of(BodyKind::Galaxy) {
        let result = match cache.body(&id) {
            Some(galaxy) => galaxy_gravity(galaxy, cache, physics),
            None => continue,
        };
        *forces.entry(id.clone()).or_default() += result.force;

        match result.outcome {
            GravityOutcome::Escaped { from } => {
                if let Some(galaxy) = cache.body_mut(&id) {
                    galaxy.parent_id = None;
                    galaxy.escaped = true;
                }
                log::info!("galaxy {} escaped orbit of {}", id, from);
                report.escaped.push(id);
            }
            GravityOutcome::Captured { by } => {
                if let Some(galaxy) = cache.body_mut(&id) {
                    galaxy.parent_id = Some(by.clone());
                }
                log::info!("galaxy {} captured by anomaly {}", id, by);
                report.captured.push((id, by));
            }
            GravityOutcome::MissingParent { parent } => {
                // Hold still this tick; with the dangling parent gone the
                // galaxy is open to capture from the next tick on.
                if let Some(galaxy) = cache.body_mut(&id) {
                    galaxy.parent_id = None;
                }
                log::warn!("galaxy {} lost its parent {}, holding position and releasing it", id, parent);
                report.skipped.insert(id.clone());
                report.orphaned.push(id);
            }
            GravityOutcome::Orbiting | GravityOutcome::TooClose | GravityOutcome::Drifting => {}
        }
    }

    for id in cache.ids_of(BodyKind::Star) {
        let Some(star) = cache.body(&id) else { continue };
        match star_gravity(star, cache, physics) {
            Some(force) => *forces.entry(id).or_default() += force,
            None => {
                log::warn!(
                    "star {} has no resolvable parent galaxy ({:?}), keeping position",
                    id,
                    star.parent_id
                );
                report.skipped.insert(id);
            }
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

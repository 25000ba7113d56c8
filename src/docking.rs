// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Dependent-Entity Synchronizer

use std::collections::{BTreeMap, BTreeSet};

use crate::integrator::DisplacementMap;
use crate::types::{BodyId, BodyKind, CelestialBody, DependentEntity, EntityId};
use crate::vector::Vec3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DockingReport {
    /// Entities that received a new dock this pass.
    pub assigned: Vec<(EntityId, BodyId)>,
    /// Entities whose stored record is now out of date.
    pub dirty: BTreeSet<EntityId>,
}

/// Closest galaxy to `position`; equal distances go to the lower id.
pub fn nearest_galaxy<'a>(
    bodies: impl IntoIterator<Item = &'a CelestialBody>,
    position: Vec3,
) -> Option<&'a CelestialBody> {
    let mut best: Option<(f64, &CelestialBody)> = None;
    for body in bodies.into_iter().filter(|b| b.kind == BodyKind::Galaxy) {
        let d = position.distance(body.position);
        let closer = match best {
            None => true,
            Some((best_d, best_body)) => d < best_d || (d == best_d && body.id < best_body.id),
        };
        if closer {
            best = Some((d, body));
        }
    }
    best.map(|(_, b)| b)
}

/// Keep parked entities riding on their bodies and dock the unassigned ones.
///
/// Entities in transit are left untouched. There is no maximum docking
/// range: the nearest galaxy always wins and the entity is moved onto it.
pub fn synchronize(
    bodies: &BTreeMap<BodyId, CelestialBody>,
    entities: &mut BTreeMap<EntityId, DependentEntity>,
    displacements: &DisplacementMap,
) -> DockingReport {
    let mut report = DockingReport::default();

    for entity in entities.values_mut() {
        if entity.is_in_transit() {
            continue;
        }

        let dock = entity
            .docked_body_id
            .as_ref()
            .filter(|_| entity.docked_body_name.is_some())
            .and_then(|id| bodies.get(id));

        match dock {
            Some(body) => {
                if let Some(&moved) = displacements.get(&body.id) {
                    if moved != Vec3::ZERO {
                        entity.position += moved;
                        report.dirty.insert(entity.id.clone());
                    }
                }
            }
            None => match nearest_galaxy(bodies.values(), entity.position) {
                Some(galaxy) => {
                    entity.docked_body_id = Some(galaxy.id.clone());
                    entity.docked_body_name = Some(galaxy.name.clone());
                    entity.position = galaxy.position;
                    log::debug!("entity {} docked at galaxy {}", entity.id, galaxy.id);
                    report.assigned.push((entity.id.clone(), galaxy.id.clone()));
                    report.dirty.insert(entity.id.clone());
                }
                None => log::debug!("no galaxy available to dock entity {}", entity.id),
            },
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bodies(list: Vec<CelestialBody>) -> BTreeMap<BodyId, CelestialBody> {
        list.into_iter().map(|b| (b.id.clone(), b)).collect()
    }

    fn entities(list: Vec<DependentEntity>) -> BTreeMap<EntityId, DependentEntity> {
        list.into_iter().map(|e| (e.id.clone(), e)).collect()
    }

    #[test]
    fn test_undocked_entity_snaps_to_nearest_galaxy() {
        let bodies = bodies(vec![
            CelestialBody::galaxy("far", Vec3::new(5_000.0, 0.0, 0.0)),
            CelestialBody::galaxy("near", Vec3::new(100.0, 0.0, 0.0)).with_name("Near One"),
            CelestialBody::anomaly("a1", Vec3::new(1.0, 0.0, 0.0)),
        ]);
        let mut ents = entities(vec![DependentEntity::new("ship", Vec3::ZERO)]);
        let report = synchronize(&bodies, &mut ents, &DisplacementMap::new());

        let ship = &ents[&EntityId::from("ship")];
        assert_eq!(ship.position, Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(ship.docked_body_id, Some(BodyId::from("near")));
        assert_eq!(ship.docked_body_name.as_deref(), Some("Near One"));
        assert_eq!(report.assigned, vec![(EntityId::from("ship"), BodyId::from("near"))]);
    }

    #[test]
    fn test_far_galaxy_is_still_assigned() {
        let bodies = bodies(vec![CelestialBody::galaxy("lonely", Vec3::new(1.0e6, 0.0, 0.0))]);
        let mut ents = entities(vec![DependentEntity::new("ship", Vec3::ZERO)]);
        synchronize(&bodies, &mut ents, &DisplacementMap::new());
        assert_eq!(ents[&EntityId::from("ship")].position.x, 1.0e6);
    }

    #[test]
    fn test_docked_entity_rides_along() {
        let bodies = bodies(vec![CelestialBody::galaxy("g1", Vec3::new(10.0, 0.0, 0.0))]);
        let mut ship = DependentEntity::new("ship", Vec3::new(7.0, 7.0, 7.0));
        ship.docked_body_id = Some(BodyId::from("g1"));
        ship.docked_body_name = Some("g1".into());
        let mut ents = entities(vec![ship]);

        let mut moved = DisplacementMap::new();
        moved.insert(BodyId::from("g1"), Vec3::new(1.0, -2.0, 0.5));
        let report = synchronize(&bodies, &mut ents, &moved);

        // Rides the displacement; it is not snapped onto the galaxy.
        assert_eq!(ents[&EntityId::from("ship")].position, Vec3::new(8.0, 5.0, 7.5));
        assert!(report.assigned.is_empty());
        assert!(report.dirty.contains(&EntityId::from("ship")));
    }

    #[test]
    fn test_missing_name_or_vanished_dock_reassigns() {
        let bodies = bodies(vec![CelestialBody::galaxy("g2", Vec3::new(0.0, 50.0, 0.0))]);
        let mut nameless = DependentEntity::new("a", Vec3::ZERO);
        nameless.docked_body_id = Some(BodyId::from("g2"));
        let mut orphan = DependentEntity::new("b", Vec3::ZERO);
        orphan.docked_body_id = Some(BodyId::from("gone"));
        orphan.docked_body_name = Some("Gone".into());
        let mut ents = entities(vec![nameless, orphan]);

        let report = synchronize(&bodies, &mut ents, &DisplacementMap::new());
        assert_eq!(report.assigned.len(), 2);
        assert_eq!(ents[&EntityId::from("b")].docked_body_id, Some(BodyId::from("g2")));
        assert_eq!(ents[&EntityId::from("a")].position, Vec3::new(0.0, 50.0, 0.0));
    }

    #[test]
    fn test_in_transit_is_ignored() {
        let bodies = bodies(vec![CelestialBody::galaxy("g1", Vec3::new(100.0, 0.0, 0.0))]);
        let mut ship = DependentEntity::new("ship", Vec3::ZERO);
        ship.navigation.is_in_transit = true;
        let mut ents = entities(vec![ship]);
        let report = synchronize(&bodies, &mut ents, &DisplacementMap::new());
        assert!(report.dirty.is_empty());
        assert!(ents[&EntityId::from("ship")].docked_body_id.is_none());
    }

    #[test]
    fn test_nearest_tie_breaks_by_id() {
        let list = vec![
            CelestialBody::galaxy("b", Vec3::new(-10.0, 0.0, 0.0)),
            CelestialBody::galaxy("a", Vec3::new(10.0, 0.0, 0.0)),
        ];
        assert_eq!(nearest_galaxy(&list, Vec3::ZERO).unwrap().id, BodyId::from("a"));
    }
}

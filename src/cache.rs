// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Body Cache

//! Working set of bodies and dependent entities owned by the engine.
//!
//! The cache is refreshed from persistence on a slow interval. A refresh adds
//! new records and drops deleted ones, but the in-memory physics state of a
//! body that is already being simulated wins over the stored copy: the store
//! only ever sees what the engine flushed, possibly several ticks ago.

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::store::{BodyStore, EntityStore};
use crate::types::*;

/// Everything read from persistence in one refresh.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub bodies: Vec<CelestialBody>,
    pub entities: Vec<DependentEntity>,
}

/// Read a full snapshot. Any failing read fails the whole refresh so a
/// partial world never replaces a complete one.
pub fn fetch_snapshot(
    bodies: &dyn BodyStore,
    entities: &dyn EntityStore,
) -> Result<CacheSnapshot, StoreError> {
    let mut snapshot = CacheSnapshot::default();
    for kind in BodyKind::ALL {
        snapshot.bodies.extend(bodies.load_bodies(kind)?);
    }
    snapshot.entities = entities.load_entities()?;
    Ok(snapshot)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub removed: usize,
    pub retained: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BodyCache {
    pub(crate) bodies: BTreeMap<BodyId, CelestialBody>,
    pub(crate) entities: BTreeMap<EntityId, DependentEntity>,
}

impl BodyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_body(&mut self, body: CelestialBody) {
        self.bodies.insert(body.id.clone(), body);
    }

    pub fn insert_entity(&mut self, entity: DependentEntity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    pub fn body(&self, id: &BodyId) -> Option<&CelestialBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: &BodyId) -> Option<&mut CelestialBody> {
        self.bodies.get_mut(id)
    }

    pub fn entity(&self, id: &EntityId) -> Option<&DependentEntity> {
        self.entities.get(id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = &CelestialBody> {
        self.bodies.values()
    }

    pub fn entities(&self) -> impl Iterator<Item = &DependentEntity> {
        self.entities.values()
    }

    /// Bodies of one kind in id order.
    pub fn of_kind(&self, kind: BodyKind) -> impl Iterator<Item = &CelestialBody> {
        self.bodies.values().filter(move |b| b.kind == kind)
    }

    pub fn ids_of(&self, kind: BodyKind) -> Vec<BodyId> {
        self.of_kind(kind).map(|b| b.id.clone()).collect()
    }

    /// Resolve an id only if it names a body of the expected kind.
    pub fn resolve(&self, id: &BodyId, kind: BodyKind) -> Option<&CelestialBody> {
        self.bodies.get(id).filter(|b| b.kind == kind)
    }

    pub fn count(&self, kind: BodyKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty() && self.entities.is_empty()
    }

    /// Borrow bodies read-only and entities mutably at the same time.
    pub(crate) fn split_mut(
        &mut self,
    ) -> (&BTreeMap<BodyId, CelestialBody>, &mut BTreeMap<EntityId, DependentEntity>) {
        (&self.bodies, &mut self.entities)
    }

    /// Merge a refreshed snapshot into the working set.
    pub fn apply_snapshot(&mut self, snapshot: CacheSnapshot) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        let mut next_bodies = BTreeMap::new();
        for stored in snapshot.bodies {
            let merged = match self.bodies.remove(&stored.id) {
                Some(live) if live.kind == stored.kind && stored.kind.is_movable() => {
                    summary.retained += 1;
                    CelestialBody {
                        name: stored.name,
                        mass: stored.mass,
                        escaped: live.escaped || stored.escaped,
                        parent_id: if live.escaped || stored.escaped {
                            None
                        } else {
                            live.parent_id.or(stored.parent_id)
                        },
                        ..live
                    }
                }
                Some(_) => {
                    summary.retained += 1;
                    stored
                }
                None => {
                    summary.added += 1;
                    stored
                }
            };
            next_bodies.insert(merged.id.clone(), merged);
        }
        summary.removed = self.bodies.len();
        self.bodies = next_bodies;

        let mut next_entities = BTreeMap::new();
        for stored in snapshot.entities {
            let merged = match self.entities.remove(&stored.id) {
                // Both sides agree the entity is parked: keep the live ride-along state.
                Some(live) if !live.is_in_transit() && !stored.is_in_transit() => DependentEntity {
                    name: stored.name,
                    navigation: stored.navigation,
                    ..live
                },
                _ => stored,
            };
            next_entities.insert(merged.id.clone(), merged);
        }
        self.entities = next_entities;

        summary
    }
}

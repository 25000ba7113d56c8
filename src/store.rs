// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Persistence Collaborators

//! The engine treats persistence as a plain document store reached through
//! two traits. [`MemoryStore`] implements both and backs the tests, the
//! wasm host and the headless runner.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::types::*;

/// Read and batched write access to stored celestial bodies.
pub trait BodyStore: Send + Sync {
    fn load_bodies(&self, kind: BodyKind) -> Result<Vec<CelestialBody>, StoreError>;
    fn upsert_bodies(&self, updates: &[BodyUpdate]) -> Result<(), StoreError>;
}

/// Read and batched write access to characters and ships with a world position.
pub trait EntityStore: Send + Sync {
    fn load_entities(&self) -> Result<Vec<DependentEntity>, StoreError>;
    fn upsert_entities(&self, updates: &[EntityUpdate]) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    bodies: Mutex<BTreeMap<BodyId, CelestialBody>>,
    entities: Mutex<BTreeMap<EntityId, DependentEntity>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_batches: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(bodies: Vec<CelestialBody>, entities: Vec<DependentEntity>) -> Self {
        let store = Self::new();
        for body in bodies {
            store.put_body(body);
        }
        for entity in entities {
            store.put_entity(entity);
        }
        store
    }

    pub fn put_body(&self, body: CelestialBody) {
        lock(&self.bodies).insert(body.id.clone(), body);
    }

    pub fn remove_body(&self, id: &BodyId) -> Option<CelestialBody> {
        lock(&self.bodies).remove(id)
    }

    pub fn put_entity(&self, entity: DependentEntity) {
        lock(&self.entities).insert(entity.id.clone(), entity);
    }

    pub fn body(&self, id: &BodyId) -> Option<CelestialBody> {
        lock(&self.bodies).get(id).cloned()
    }

    pub fn entity(&self, id: &EntityId) -> Option<DependentEntity> {
        lock(&self.entities).get(id).cloned()
    }

    /// Make every subsequent read fail until switched off again.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful batched writes so far.
    pub fn write_batches(&self) -> u64 {
        self.write_batches.load(Ordering::SeqCst)
    }

    fn check_write(&self, count: usize) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write { count, reason: "injected write failure".into() });
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked writer cannot leave a map half-updated, so the data stays usable.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BodyStore for MemoryStore {
    fn load_bodies(&self, kind: BodyKind) -> Result<Vec<CelestialBody>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read { kind, reason: "injected read failure".into() });
        }
        Ok(lock(&self.bodies).values().filter(|b| b.kind == kind).cloned().collect())
    }

    fn upsert_bodies(&self, updates: &[BodyUpdate]) -> Result<(), StoreError> {
        self.check_write(updates.len())?;
        let mut bodies = lock(&self.bodies);
        for update in updates {
            if let Some(body) = bodies.get_mut(&update.id) {
                body.position = update.position;
                body.velocity = update.velocity;
                body.parent_id = update.parent_id.clone();
                body.escaped = update.escaped;
            }
        }
        self.write_batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl EntityStore for MemoryStore {
    fn load_entities(&self) -> Result<Vec<DependentEntity>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        Ok(lock(&self.entities).values().cloned().collect())
    }

    fn upsert_entities(&self, updates: &[EntityUpdate]) -> Result<(), StoreError> {
        self.check_write(updates.len())?;
        let mut entities = lock(&self.entities);
        for update in updates {
            if let Some(entity) = entities.get_mut(&update.id) {
                entity.position = update.position;
                entity.docked_body_id = update.docked_body_id.clone();
                entity.docked_body_name = update.docked_body_name.clone();
            }
        }
        self.write_batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vec3;

    #[test]
    fn test_load_filters_by_kind() {
        let store = MemoryStore::with_records(
            vec![
                CelestialBody::anomaly("a1", Vec3::ZERO),
                CelestialBody::galaxy("g1", Vec3::new(1.0, 0.0, 0.0)),
                CelestialBody::galaxy("g2", Vec3::new(2.0, 0.0, 0.0)),
            ],
            vec![],
        );
        assert_eq!(store.load_bodies(BodyKind::Galaxy).unwrap().len(), 2);
        assert_eq!(store.load_bodies(BodyKind::Anomaly).unwrap().len(), 1);
        assert!(store.load_bodies(BodyKind::Star).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_only_touches_known_ids() {
        let store = MemoryStore::with_records(vec![CelestialBody::galaxy("g1", Vec3::ZERO)], vec![]);
        let update = BodyUpdate {
            id: BodyId::from("g1"),
            position: Vec3::new(5.0, 0.0, 0.0),
            velocity: Vec3::new(1.0, 0.0, 0.0),
            parent_id: None,
            escaped: true,
        };
        let ghost = BodyUpdate { id: BodyId::from("ghost"), ..update.clone() };
        store.upsert_bodies(&[update, ghost]).unwrap();
        let g1 = store.body(&BodyId::from("g1")).unwrap();
        assert_eq!(g1.position.x, 5.0);
        assert!(g1.escaped);
        assert!(store.body(&BodyId::from("ghost")).is_none());
        assert_eq!(store.write_batches(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        assert!(store.load_bodies(BodyKind::Galaxy).is_err());
        assert!(store.load_entities().is_err());
        store.set_fail_writes(true);
        assert!(matches!(
            store.upsert_bodies(&[]),
            Err(StoreError::Write { count: 0, .. })
        ));
        assert_eq!(store.write_batches(), 0);
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Type Definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PhysicsParams;
use crate::vector::Vec3;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Document-store identifier of a celestial body.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(pub String);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BodyId {
    fn from(s: String) -> Self { BodyId(s) }
}

impl From<&str> for BodyId {
    fn from(s: &str) -> Self { BodyId(s.to_string()) }
}

/// Document-store identifier of a character or ship.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self { EntityId(s.to_string()) }
}

// ─── Body Kind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Anomaly,
    Galaxy,
    Star,
}

impl BodyKind {
    pub const ALL: [BodyKind; 3] = [BodyKind::Anomaly, BodyKind::Galaxy, BodyKind::Star];

    /// Anomalies are pinned in place; everything else is integrated.
    pub fn is_movable(&self) -> bool {
        !matches!(self, BodyKind::Anomaly)
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BodyKind::Anomaly => "anomaly",
            BodyKind::Galaxy => "galaxy",
            BodyKind::Star => "star",
        };
        f.write_str(s)
    }
}

// ─── CelestialBody ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CelestialBody {
    pub id: BodyId,
    #[serde(default)]
    pub name: String,
    pub kind: BodyKind,
    pub position: Vec3,
    #[serde(default)]
    pub velocity: Vec3,
    /// Single designated gravitational parent.
    #[serde(default)]
    pub parent_id: Option<BodyId>,
    /// Once set the body is never re-captured by nearest-anomaly search.
    #[serde(default)]
    pub escaped: bool,
    #[serde(default)]
    pub mass: Option<f64>,
}

impl CelestialBody {
    pub fn new(id: impl Into<BodyId>, kind: BodyKind, position: Vec3) -> Self {
        let id = id.into();
        Self {
            name: id.0.clone(),
            id,
            kind,
            position,
            velocity: Vec3::ZERO,
            parent_id: None,
            escaped: false,
            mass: None,
        }
    }

    pub fn anomaly(id: impl Into<BodyId>, position: Vec3) -> Self {
        Self::new(id, BodyKind::Anomaly, position)
    }

    pub fn galaxy(id: impl Into<BodyId>, position: Vec3) -> Self {
        Self::new(id, BodyKind::Galaxy, position)
    }

    pub fn star(id: impl Into<BodyId>, position: Vec3) -> Self {
        Self::new(id, BodyKind::Star, position)
    }

    pub fn with_parent(mut self, parent: impl Into<BodyId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stored mass if the document carries one, otherwise the per-kind constant.
    pub fn effective_mass(&self, physics: &PhysicsParams) -> f64 {
        match self.mass {
            Some(m) if m > 0.0 && m.is_finite() => m,
            _ => match self.kind {
                BodyKind::Anomaly => physics.anomaly_mass,
                BodyKind::Galaxy => physics.galaxy_mass,
                BodyKind::Star => physics.star_mass,
            },
        }
    }
}

// ─── Dependent Entities ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    #[serde(default)]
    pub is_in_transit: bool,
    #[serde(default)]
    pub destination: Option<Vec3>,
    #[serde(default)]
    pub origin: Option<Vec3>,
}

/// Character or ship whose position is slaved to a body while not travelling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DependentEntity {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    /// Absolute world coordinates, never an offset from the dock.
    pub position: Vec3,
    #[serde(default)]
    pub docked_body_id: Option<BodyId>,
    #[serde(default)]
    pub docked_body_name: Option<String>,
    #[serde(default)]
    pub navigation: Navigation,
}

impl DependentEntity {
    pub fn new(id: &str, position: Vec3) -> Self {
        Self {
            id: EntityId::from(id),
            name: id.to_string(),
            position,
            docked_body_id: None,
            docked_body_name: None,
            navigation: Navigation::default(),
        }
    }

    pub fn is_in_transit(&self) -> bool {
        self.navigation.is_in_transit
    }

    pub fn is_docked(&self) -> bool {
        self.docked_body_id.is_some() && self.docked_body_name.is_some()
    }
}

// ─── Persistence Batches ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BodyUpdate {
    pub id: BodyId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub parent_id: Option<BodyId>,
    pub escaped: bool,
}

impl From<&CelestialBody> for BodyUpdate {
    fn from(body: &CelestialBody) -> Self {
        Self {
            id: body.id.clone(),
            position: body.position,
            velocity: body.velocity,
            parent_id: body.parent_id.clone(),
            escaped: body.escaped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityUpdate {
    pub id: EntityId,
    pub position: Vec3,
    pub docked_body_id: Option<BodyId>,
    pub docked_body_name: Option<String>,
}

impl From<&DependentEntity> for EntityUpdate {
    fn from(entity: &DependentEntity) -> Self {
        Self {
            id: entity.id.clone(),
            position: entity.position,
            docked_body_id: entity.docked_body_id.clone(),
            docked_body_name: entity.docked_body_name.clone(),
        }
    }
}

/// One throttled write: every body and entity mutated since the last flush.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistBatch {
    pub tick: u64,
    pub bodies: Vec<BodyUpdate>,
    pub entities: Vec<EntityUpdate>,
}

impl PersistBatch {
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty() && self.entities.is_empty()
    }
}

// ─── EngineStatus ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub running: bool,
    /// Nominal ticks per second before the speed multiplier.
    pub tick_rate: f64,
    pub simulation_speed: f64,
    pub connection_count: usize,
    pub orbit_lock_count: usize,
    pub gravity_well_count: usize,
    pub tick_counter: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_mass_falls_back_to_kind() {
        let physics = PhysicsParams::default();
        let g = CelestialBody::galaxy("g1", Vec3::ZERO);
        assert_eq!(g.effective_mass(&physics), physics.galaxy_mass);

        let mut heavy = CelestialBody::star("s1", Vec3::ZERO);
        heavy.mass = Some(42.0);
        assert_eq!(heavy.effective_mass(&physics), 42.0);

        heavy.mass = Some(-1.0);
        assert_eq!(heavy.effective_mass(&physics), physics.star_mass);
    }

    #[test]
    fn test_store_document_shape() {
        let json = r#"{"id":"g7","kind":"galaxy","position":{"x":1.0,"y":2.0,"z":3.0},"parentId":"a1"}"#;
        let body: CelestialBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.kind, BodyKind::Galaxy);
        assert_eq!(body.parent_id, Some(BodyId::from("a1")));
        assert_eq!(body.velocity, Vec3::ZERO);
        assert!(!body.escaped);
        assert!(body.mass.is_none());
    }

    #[test]
    fn test_entity_docked_requires_name() {
        let mut e = DependentEntity::new("ship-1", Vec3::ZERO);
        assert!(!e.is_docked());
        e.docked_body_id = Some(BodyId::from("g1"));
        assert!(!e.is_docked());
        e.docked_body_name = Some("Andromeda".into());
        assert!(e.is_docked());
    }
}

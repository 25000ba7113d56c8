// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Broadcast Assembly & Fan-out

//! The per-tick payload pushed to viewers, and the sinks that carry it.
//!
//! A tick only produces a [`TickBroadcast`]; handing it to a sink is the
//! scheduler's job. Sinks must never block the tick loop.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::cache::BodyCache;
use crate::connections::{ConnectionRecord, ConnectionTracker};
use crate::trail::PositionHistory;
use crate::types::*;
use crate::vector::Vec3;

// ─── Payload ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockedView {
    pub id: EntityId,
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalaxyView {
    pub id: BodyId,
    pub name: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub parent_id: Option<BodyId>,
    pub escaped: bool,
    pub trail: Vec<Vec3>,
    pub docked: Vec<DockedView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StarView {
    pub id: BodyId,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Travelling entity, passed through as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitView {
    pub id: EntityId,
    pub name: String,
    pub position: Vec3,
    pub navigation: Navigation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickBroadcast {
    pub tick: u64,
    pub galaxies: Vec<GalaxyView>,
    pub stars: Vec<StarView>,
    pub connections: Vec<ConnectionRecord>,
    pub in_transit: Vec<TransitView>,
    pub simulation_speed: f64,
    pub timestamp: u64,
}

impl TickBroadcast {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Build the outward payload from the engine's state after a tick.
pub fn assemble(
    cache: &BodyCache,
    trails: &PositionHistory,
    connections: &ConnectionTracker,
    tick: u64,
    simulation_speed: f64,
    timestamp: u64,
) -> TickBroadcast {
    let mut docked: BTreeMap<&BodyId, Vec<DockedView>> = BTreeMap::new();
    let mut in_transit = Vec::new();
    for entity in cache.entities() {
        if entity.is_in_transit() {
            in_transit.push(TransitView {
                id: entity.id.clone(),
                name: entity.name.clone(),
                position: entity.position,
                navigation: entity.navigation.clone(),
            });
        } else if let Some(body_id) = &entity.docked_body_id {
            docked.entry(body_id).or_default().push(DockedView {
                id: entity.id.clone(),
                name: entity.name.clone(),
                position: entity.position,
            });
        }
    }

    let galaxies = cache
        .of_kind(BodyKind::Galaxy)
        .map(|g| GalaxyView {
            id: g.id.clone(),
            name: g.name.clone(),
            position: g.position,
            velocity: g.velocity,
            parent_id: g.parent_id.clone(),
            escaped: g.escaped,
            trail: trails.trail(&g.id),
            docked: docked.remove(&g.id).unwrap_or_default(),
        })
        .collect();

    let stars = cache
        .of_kind(BodyKind::Star)
        .map(|s| StarView { id: s.id.clone(), position: s.position, velocity: s.velocity })
        .collect();

    TickBroadcast {
        tick,
        galaxies,
        stars,
        connections: connections.visible_records(),
        in_transit,
        simulation_speed,
        timestamp,
    }
}

// ─── Sinks ───────────────────────────────────────────────────────────────────

/// Fire-and-forget publication of tick payloads.
pub trait BroadcastSink: Send + Sync {
    fn publish(&self, broadcast: Arc<TickBroadcast>);
}

/// Discards every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl BroadcastSink for NullSink {
    fn publish(&self, _broadcast: Arc<TickBroadcast>) {}
}

/// Fans each payload out to every live subscriber over unbounded channels.
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Debug, Default)]
pub struct Broadcaster {
    subscribers: Mutex<Vec<Sender<Arc<TickBroadcast>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Arc<TickBroadcast>> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<Arc<TickBroadcast>>>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BroadcastSink for Broadcaster {
    fn publish(&self, broadcast: Arc<TickBroadcast>) {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(Arc::clone(&broadcast)).is_ok());
        let dropped = before - subscribers.len();
        if dropped > 0 {
            log::debug!("pruned {} disconnected broadcast subscribers", dropped);
        }
    }
}

impl<T: BroadcastSink + ?Sized> BroadcastSink for Arc<T> {
    fn publish(&self, broadcast: Arc<TickBroadcast>) {
        (**self).publish(broadcast)
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Position History

use std::collections::{BTreeMap, VecDeque};

use crate::types::BodyId;
use crate::vector::Vec3;

/// Bounded ring of recent positions per galaxy. Visual only; physics never
/// reads it.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    capacity: usize,
    trails: BTreeMap<BodyId, VecDeque<Vec3>>,
}

impl PositionHistory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, trails: BTreeMap::new() }
    }

    pub fn record(&mut self, id: &BodyId, position: Vec3) {
        if self.capacity == 0 {
            return;
        }
        let trail = self.trails.entry(id.clone()).or_default();
        if trail.len() == self.capacity {
            trail.pop_front();
        }
        trail.push_back(position);
    }

    /// Oldest first.
    pub fn trail(&self, id: &BodyId) -> Vec<Vec3> {
        self.trails.get(id).map(|t| t.iter().copied().collect()).unwrap_or_default()
    }

    /// Drop trails for bodies no longer simulated.
    pub fn retain(&mut self, mut keep: impl FnMut(&BodyId) -> bool) {
        self.trails.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Error Types

use crate::types::BodyKind;

/// Failures reported by the persistence collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read {kind} bodies: {reason}")]
    Read { kind: BodyKind, reason: String },

    #[error("batched write of {count} records failed: {reason}")]
    Write { count: usize, reason: String },
}

/// Invalid or unreadable engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A control request the engine refused. Never an internal failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("simulation speed {requested} outside [{min}, {max}]; keeping {current}")]
    SpeedOutOfRange {
        requested: f64,
        current: f64,
        min: f64,
        max: f64,
    },

    #[error("simulation loop is no longer running")]
    Disconnected,
}

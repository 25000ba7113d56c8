// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Configuration

//! Tunable constants for the engine, grouped by the stage that consumes them.
//!
//! Every group implements [`Default`] with the production values, and every
//! field may be omitted from a JSON config file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsParams,
    pub boundary: BoundaryParams,
    pub connections: ConnectionParams,
    pub orbit_lock: OrbitLockParams,
    pub scheduler: SchedulerParams,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject values that would make a stage misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.physics;
        positive("physics.gravitational_constant", p.gravitational_constant)?;
        positive("physics.anomaly_mass", p.anomaly_mass)?;
        positive("physics.galaxy_mass", p.galaxy_mass)?;
        positive("physics.star_mass", p.star_mass)?;
        positive("physics.softening", p.softening)?;
        positive("physics.max_velocity", p.max_velocity)?;
        if p.min_anomaly_distance >= p.max_orbit_range {
            return Err(invalid(
                "physics.min_anomaly_distance",
                "must be smaller than max_orbit_range",
            ));
        }

        let b = &self.boundary;
        positive("boundary.half_extent", b.half_extent)?;
        if b.hard_margin >= b.soft_margin {
            return Err(invalid("boundary.hard_margin", "must be smaller than soft_margin"));
        }
        if b.soft_margin >= b.half_extent {
            return Err(invalid("boundary.soft_margin", "must be smaller than half_extent"));
        }

        let c = &self.connections;
        positive("connections.anomaly_connection_distance", c.anomaly_connection_distance)?;
        positive("connections.galaxy_connection_distance", c.galaxy_connection_distance)?;
        if !(c.strained_ratio < c.breaking_ratio
            && c.breaking_ratio < c.critical_ratio
            && c.critical_ratio < 1.0
            && c.break_ratio > 1.0)
        {
            return Err(invalid(
                "connections",
                "ratios must satisfy strained < breaking < critical < 1 < break",
            ));
        }

        let o = &self.orbit_lock;
        if !(0.0..=1.0).contains(&o.gravity_well_probability) {
            return Err(invalid("orbit_lock.gravity_well_probability", "must be in [0, 1]"));
        }

        let s = &self.scheduler;
        if s.tick_interval_ms == 0 {
            return Err(invalid("scheduler.tick_interval_ms", "must be non-zero"));
        }
        if s.persist_every_ticks == 0 {
            return Err(invalid("scheduler.persist_every_ticks", "must be non-zero"));
        }
        if s.trail_sample_ticks == 0 {
            return Err(invalid("scheduler.trail_sample_ticks", "must be non-zero"));
        }
        if !(s.min_speed > 0.0 && s.min_speed <= s.default_speed && s.default_speed <= s.max_speed) {
            return Err(invalid(
                "scheduler.default_speed",
                "must satisfy 0 < min_speed <= default_speed <= max_speed",
            ));
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("expected a positive finite number, got {}", value)))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

// ---------------------------------------------------------------------------
// PhysicsParams
// ---------------------------------------------------------------------------

/// Gravity, repulsion and integration constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsParams {
    pub gravitational_constant: f64,
    pub anomaly_mass: f64,
    pub galaxy_mass: f64,
    pub star_mass: f64,
    /// Added to d² in the inverse-square law.
    pub softening: f64,
    pub max_velocity: f64,
    /// Beyond this distance from its parent a galaxy escapes for good.
    pub max_orbit_range: f64,
    /// Inside this distance the parent pushes instead of pulls.
    pub min_anomaly_distance: f64,
    pub anomaly_repulsion_multiplier: f64,
    /// Search radius for parentless galaxies.
    pub capture_radius: f64,
    pub repulsion_distance: f64,
    pub min_galaxy_separation: f64,
    pub repulsion_strength: f64,
    pub hard_repulsion_multiplier: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            gravitational_constant: 0.1,
            anomaly_mass: 5_000_000.0,
            galaxy_mass: 1_000.0,
            star_mass: 10.0,
            softening: 100.0,
            max_velocity: 40.0,
            max_orbit_range: 6_000.0,
            min_anomaly_distance: 200.0,
            anomaly_repulsion_multiplier: 2.0,
            capture_radius: 4_000.0,
            repulsion_distance: 800.0,
            min_galaxy_separation: 300.0,
            repulsion_strength: 20_000_000.0,
            hard_repulsion_multiplier: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// BoundaryParams
// ---------------------------------------------------------------------------

/// Cubic containment region `[-half_extent, half_extent]` on every axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoundaryParams {
    pub half_extent: f64,
    pub soft_margin: f64,
    pub hard_margin: f64,
    pub soft_strength: f64,
    pub hard_strength: f64,
}

impl Default for BoundaryParams {
    fn default() -> Self {
        Self {
            half_extent: 20_000.0,
            soft_margin: 2_000.0,
            hard_margin: 500.0,
            soft_strength: 200.0,
            hard_strength: 2_000.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionParams {
    pub anomaly_connection_distance: f64,
    pub galaxy_connection_distance: f64,
    pub max_anomaly_connections: usize,
    pub max_galaxy_connections: usize,
    /// Connections younger than this are always `forming`.
    pub stable_threshold_ticks: u64,
    pub strained_ratio: f64,
    pub breaking_ratio: f64,
    /// Above this the breaking edge is drawn red instead of orange.
    pub critical_ratio: f64,
    pub break_ratio: f64,
    /// How long a broken edge stays visible before removal.
    pub broken_display_ticks: u64,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            anomaly_connection_distance: 2_500.0,
            galaxy_connection_distance: 1_500.0,
            max_anomaly_connections: 2,
            max_galaxy_connections: 3,
            stable_threshold_ticks: 30,
            strained_ratio: 0.75,
            breaking_ratio: 0.85,
            critical_ratio: 0.95,
            break_ratio: 1.05,
            broken_display_ticks: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// OrbitLockParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrbitLockParams {
    /// Simulated days elapsed per simulated second.
    pub sim_days_per_second: f64,
    pub lock_threshold_days: f64,
    /// Per-tick firing chance once the lock threshold is exceeded.
    pub gravity_well_probability: f64,
    pub impulse_strength: f64,
    pub gravity_well_duration_days: f64,
}

impl Default for OrbitLockParams {
    fn default() -> Self {
        Self {
            sim_days_per_second: 1.0,
            lock_threshold_days: 30.0,
            gravity_well_probability: 0.002,
            impulse_strength: 15.0,
            gravity_well_duration_days: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SchedulerParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerParams {
    pub tick_interval_ms: u64,
    pub cache_refresh_secs: u64,
    pub persist_every_ticks: u64,
    pub trail_length: usize,
    pub trail_sample_ticks: u64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub default_speed: f64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            cache_refresh_secs: 30,
            persist_every_ticks: 50,
            trail_length: 60,
            trail_sample_ticks: 5,
            min_speed: 0.1,
            max_speed: 10.0,
            default_speed: 1.0,
        }
    }
}

impl SchedulerParams {
    /// Nominal tick period in seconds, before the speed multiplier.
    pub fn nominal_dt(&self) -> f64 {
        self.tick_interval_ms as f64 / 1000.0
    }

    pub fn tick_rate(&self) -> f64 {
        1000.0 / self.tick_interval_ms as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

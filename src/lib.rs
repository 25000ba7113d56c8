// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine

pub mod vector;
pub mod types;
pub mod error;
pub mod config;
pub mod clock;
pub mod store;
pub mod cache;

pub mod gravity;
pub mod repulsion;
pub mod integrator;
pub mod connections;
pub mod orbit_lock;
pub mod docking;
pub mod trail;
pub mod broadcast;

pub mod engine;
pub mod scheduler;
pub mod seed;

pub use types::*;
pub use vector::Vec3;
pub use error::{ConfigError, ControlError, StoreError};
pub use config::EngineConfig;
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{BodyStore, EntityStore, MemoryStore};
pub use cache::{BodyCache, CacheSnapshot};
pub use connections::{ColorHint, ConnectionRecord, ConnectionState};
pub use broadcast::{BroadcastSink, Broadcaster, NullSink, TickBroadcast};
pub use engine::{GravityEngine, TickOutcome};
pub use scheduler::{ControlHandle, PersistenceWorker, TickScheduler};
pub use seed::{seed_universe, UniverseSpec};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Browser-hosted engine. The JS side owns the timer and calls `tick`;
/// persistence goes to an in-memory store it can load from.
#[wasm_bindgen]
pub struct WasmOrbitalEngine {
    engine: GravityEngine,
    store: MemoryStore,
    now_ms: u64,
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

impl WasmOrbitalEngine {
    fn refresh(&mut self) {
        self.engine.refresh_from(&self.store, &self.store, self.now_ms);
    }
}

#[wasm_bindgen]
impl WasmOrbitalEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u32) -> Self {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        Self {
            engine: GravityEngine::with_defaults(seed as u64),
            store: MemoryStore::new(),
            now_ms: 0,
        }
    }

    /// Build from a (possibly partial) JSON config document.
    pub fn with_config(config_json: &str, seed: u32) -> Result<WasmOrbitalEngine, JsValue> {
        let config = EngineConfig::from_json_str(config_json).map_err(js_error)?;
        let mut host = WasmOrbitalEngine::new(seed);
        host.engine = GravityEngine::new(config, seed as u64).map_err(js_error)?;
        Ok(host)
    }

    /// Upsert body documents into the store and refresh the working set.
    pub fn load_bodies(&mut self, bodies: JsValue) -> Result<usize, JsValue> {
        let bodies: Vec<CelestialBody> = serde_wasm_bindgen::from_value(bodies)?;
        let count = bodies.len();
        for body in bodies {
            self.store.put_body(body);
        }
        self.refresh();
        Ok(count)
    }

    pub fn load_entities(&mut self, entities: JsValue) -> Result<usize, JsValue> {
        let entities: Vec<DependentEntity> = serde_wasm_bindgen::from_value(entities)?;
        let count = entities.len();
        for entity in entities {
            self.store.put_entity(entity);
        }
        self.refresh();
        Ok(count)
    }

    /// Fill the store with a generated world.
    pub fn seed_universe(&mut self, seed: u32) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
        let snapshot = seed_universe(&mut rng, &UniverseSpec::default(), &self.engine.config().physics);
        for body in snapshot.bodies {
            self.store.put_body(body);
        }
        for entity in snapshot.entities {
            self.store.put_entity(entity);
        }
        self.refresh();
    }

    pub fn start(&mut self) -> bool {
        self.engine.start()
    }

    pub fn stop(&mut self) -> bool {
        self.engine.stop()
    }

    /// Run one tick at host time `now_ms`. Returns the broadcast payload, or
    /// null when stopped or nothing moved.
    pub fn tick(&mut self, now_ms: f64) -> JsValue {
        self.now_ms = now_ms.max(0.0) as u64;
        if !self.engine.is_running() {
            return JsValue::NULL;
        }
        if self.engine.refresh_due(self.now_ms) {
            self.refresh();
        }
        let outcome = self.engine.tick(self.now_ms);
        if let Some(batch) = &outcome.flush {
            let written = self
                .store
                .upsert_bodies(&batch.bodies)
                .and_then(|_| self.store.upsert_entities(&batch.entities));
            self.engine.apply_flush_result(batch, written);
        }
        match outcome.broadcast {
            Some(payload) => serde_wasm_bindgen::to_value(payload.as_ref()).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }

    /// Run N ticks without returning payloads.
    pub fn run_batch(&mut self, ticks: u32, step_ms: f64) {
        for _ in 0..ticks {
            self.tick(self.now_ms as f64 + step_ms);
        }
    }

    /// Returns the previous speed; rejects values outside the allowed range.
    pub fn set_simulation_speed(&mut self, speed: f64) -> Result<f64, JsValue> {
        self.engine.set_simulation_speed(speed).map_err(js_error)
    }

    pub fn get_status(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.engine.status()).unwrap_or(JsValue::NULL)
    }

    pub fn get_connections(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.engine.connections()).unwrap_or(JsValue::NULL)
    }

    pub fn get_body(&self, id: &str) -> JsValue {
        match self.engine.body(&BodyId::from(id)) {
            Some(body) => serde_wasm_bindgen::to_value(body).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Tick Scheduler & Persistence Worker

//! The tick loop owns the engine outright. Everything else talks to it
//! through messages:
//!
//! - control requests arrive on a channel and are applied at the start of
//!   the next iteration;
//! - cache refreshes and flushes run on a background worker whose results
//!   are applied whenever they show up, never waited for;
//! - broadcasts are handed to the sink and forgotten.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::broadcast::BroadcastSink;
use crate::cache::{fetch_snapshot, CacheSnapshot};
use crate::clock::Clock;
use crate::connections::ConnectionRecord;
use crate::engine::{GravityEngine, TickOutcome};
use crate::error::{ControlError, StoreError};
use crate::store::{BodyStore, EntityStore};
use crate::types::{EngineStatus, PersistBatch};

// ---------------------------------------------------------------------------
// Control channel
// ---------------------------------------------------------------------------

pub enum ControlMessage {
    Start,
    Stop,
    SetSpeed { speed: f64, reply: Sender<Result<f64, ControlError>> },
    Status { reply: Sender<EngineStatus> },
    Connections { reply: Sender<Vec<ConnectionRecord>> },
    Shutdown,
}

/// Cloneable handle for talking to a running scheduler from other threads.
///
/// Queries block until the loop answers at its next iteration.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<ControlMessage>,
}

impl ControlHandle {
    fn send(&self, msg: ControlMessage) -> Result<(), ControlError> {
        self.tx.send(msg).map_err(|_| ControlError::Disconnected)
    }

    fn ask<T>(&self, build: impl FnOnce(Sender<T>) -> ControlMessage) -> Result<T, ControlError> {
        let (reply, rx) = mpsc::channel();
        self.send(build(reply))?;
        rx.recv().map_err(|_| ControlError::Disconnected)
    }

    pub fn start(&self) -> Result<(), ControlError> {
        self.send(ControlMessage::Start)
    }

    pub fn stop(&self) -> Result<(), ControlError> {
        self.send(ControlMessage::Stop)
    }

    pub fn shutdown(&self) -> Result<(), ControlError> {
        self.send(ControlMessage::Shutdown)
    }

    /// Returns the previous speed, or the rejection.
    pub fn set_simulation_speed(&self, speed: f64) -> Result<f64, ControlError> {
        self.ask(|reply| ControlMessage::SetSpeed { speed, reply })?
    }

    pub fn status(&self) -> Result<EngineStatus, ControlError> {
        self.ask(|reply| ControlMessage::Status { reply })
    }

    pub fn connections(&self) -> Result<Vec<ConnectionRecord>, ControlError> {
        self.ask(|reply| ControlMessage::Connections { reply })
    }
}

// ---------------------------------------------------------------------------
// Persistence worker
// ---------------------------------------------------------------------------

enum Job {
    Refresh,
    Flush(PersistBatch),
    Stop,
}

pub enum JobResult {
    Refreshed(Result<CacheSnapshot, StoreError>),
    Flushed(PersistBatch, Result<(), StoreError>),
}

/// Background thread for the only blocking I/O the engine does.
pub struct PersistenceWorker {
    jobs: Sender<Job>,
    results: Receiver<JobResult>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    pub fn spawn(bodies: Arc<dyn BodyStore>, entities: Arc<dyn EntityStore>) -> std::io::Result<Self> {
        let (jobs, job_rx) = mpsc::channel::<Job>();
        let (result_tx, results) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("orbital-persistence".into())
            .spawn(move || {
                for job in job_rx {
                    let result = match job {
                        Job::Refresh => JobResult::Refreshed(fetch_snapshot(bodies.as_ref(), entities.as_ref())),
                        Job::Flush(batch) => {
                            let written = write_batch(bodies.as_ref(), entities.as_ref(), &batch);
                            JobResult::Flushed(batch, written)
                        }
                        Job::Stop => break,
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { jobs, results, handle: Some(handle) })
    }

    pub fn request_refresh(&self) -> bool {
        self.jobs.send(Job::Refresh).is_ok()
    }

    /// Queue a batch. Hands it back if the worker is gone.
    pub fn request_flush(&self, batch: PersistBatch) -> Result<(), PersistBatch> {
        self.jobs.send(Job::Flush(batch)).map_err(|mpsc::SendError(job)| match job {
            Job::Flush(batch) => batch,
            _ => PersistBatch::default(),
        })
    }

    pub fn try_results(&self) -> Vec<JobResult> {
        self.results.try_iter().collect()
    }

    pub fn wait_result(&self, timeout: Duration) -> Option<JobResult> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Finish queued jobs, stop the thread and return results not yet collected.
    pub fn shutdown(mut self) -> Vec<JobResult> {
        self.stop_thread();
        self.results.try_iter().collect()
    }

    fn stop_thread(&mut self) {
        let _ = self.jobs.send(Job::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("persistence worker panicked");
            }
        }
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn write_batch(bodies: &dyn BodyStore, entities: &dyn EntityStore, batch: &PersistBatch) -> Result<(), StoreError> {
    if !batch.bodies.is_empty() {
        bodies.upsert_bodies(&batch.bodies)?;
    }
    if !batch.entities.is_empty() {
        entities.upsert_entities(&batch.entities)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TickScheduler
// ---------------------------------------------------------------------------

pub struct TickScheduler {
    engine: GravityEngine,
    clock: Box<dyn Clock>,
    sink: Box<dyn BroadcastSink>,
    worker: PersistenceWorker,
    control_tx: Sender<ControlMessage>,
    control_rx: Receiver<ControlMessage>,
    shutdown: bool,
    faults: u64,
}

impl TickScheduler {
    pub fn new(
        engine: GravityEngine,
        clock: Box<dyn Clock>,
        sink: Box<dyn BroadcastSink>,
        worker: PersistenceWorker,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel();
        Self { engine, clock, sink, worker, control_tx, control_rx, shutdown: false, faults: 0 }
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle { tx: self.control_tx.clone() }
    }

    pub fn engine(&self) -> &GravityEngine {
        &self.engine
    }

    /// Ticks that panicked and were contained.
    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    fn apply_control(&mut self) {
        while let Ok(msg) = self.control_rx.try_recv() {
            match msg {
                ControlMessage::Start => {
                    self.engine.start();
                }
                ControlMessage::Stop => {
                    self.engine.stop();
                }
                ControlMessage::SetSpeed { speed, reply } => {
                    let _ = reply.send(self.engine.set_simulation_speed(speed));
                }
                ControlMessage::Status { reply } => {
                    let _ = reply.send(self.engine.status());
                }
                ControlMessage::Connections { reply } => {
                    let _ = reply.send(self.engine.connections());
                }
                ControlMessage::Shutdown => self.shutdown = true,
            }
        }
    }

    fn apply_job_result(&mut self, result: JobResult, now_ms: u64) {
        match result {
            JobResult::Refreshed(snapshot) => {
                self.engine.apply_refresh(snapshot, now_ms);
            }
            JobResult::Flushed(batch, written) => self.engine.apply_flush_result(&batch, written),
        }
    }

    fn dispatch_flush(&mut self, batch: PersistBatch) {
        if let Err(batch) = self.worker.request_flush(batch) {
            self.engine
                .apply_flush_result(&batch, Err(StoreError::Unavailable("persistence worker stopped".into())));
        }
    }

    /// Block until the worker reports back once, and apply the result.
    pub fn wait_for_worker(&mut self, timeout: Duration) -> bool {
        match self.worker.wait_result(timeout) {
            Some(result) => {
                let now = self.clock.now_ms();
                self.apply_job_result(result, now);
                true
            }
            None => false,
        }
    }

    /// One loop iteration: control, background results, refresh scheduling,
    /// then a tick if running. A panic inside the tick is contained here.
    pub fn run_once(&mut self) -> Option<TickOutcome> {
        self.apply_control();
        let now = self.clock.now_ms();

        for result in self.worker.try_results() {
            self.apply_job_result(result, now);
        }

        if self.engine.refresh_due(now) {
            if self.worker.request_refresh() {
                self.engine.mark_refresh_started();
            } else {
                log::warn!("persistence worker unavailable, skipping cache refresh");
            }
        }

        if self.shutdown || !self.engine.is_running() {
            return None;
        }

        let engine = &mut self.engine;
        let sink = &self.sink;
        let ticked = panic::catch_unwind(AssertUnwindSafe(|| {
            let outcome = engine.tick(now);
            if let Some(broadcast) = &outcome.broadcast {
                sink.publish(Arc::clone(broadcast));
            }
            outcome
        }));

        match ticked {
            Ok(mut outcome) => {
                if let Some(batch) = outcome.flush.take() {
                    self.dispatch_flush(batch.clone());
                    outcome.flush = Some(batch);
                }
                Some(outcome)
            }
            Err(_) => {
                self.faults += 1;
                log::error!(
                    "tick {} panicked; continuing with in-memory state",
                    self.engine.tick_counter()
                );
                None
            }
        }
    }

    /// Drive the loop at the configured period until shut down, then flush
    /// whatever is still dirty. Returns the engine for inspection.
    pub fn run(mut self) -> GravityEngine {
        let period = Duration::from_millis(self.engine.config().scheduler.tick_interval_ms);
        log::info!("tick loop starting with a {:?} period", period);
        while !self.shutdown {
            let started = Instant::now();
            self.run_once();
            if let Some(rest) = period.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        self.finish()
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<GravityEngine>> {
        thread::Builder::new().name("orbital-tick".into()).spawn(move || self.run())
    }

    /// Final flush, then stop the worker and apply its last results.
    pub fn finish(mut self) -> GravityEngine {
        if let Some(batch) = self.engine.take_flush_batch() {
            log::info!("final flush of {} records", batch.bodies.len() + batch.entities.len());
            self.dispatch_flush(batch);
        }
        let now = self.clock.now_ms();
        let Self { mut engine, worker, .. } = self;
        for result in worker.shutdown() {
            match result {
                JobResult::Refreshed(snapshot) => {
                    engine.apply_refresh(snapshot, now);
                }
                JobResult::Flushed(batch, written) => engine.apply_flush_result(&batch, written),
            }
        }
        log::info!("tick loop stopped after {} ticks", engine.tick_counter());
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Broadcaster, NullSink, TickBroadcast};
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::types::{BodyId, CelestialBody};
    use crate::vector::Vec3;

    const WAIT: Duration = Duration::from_secs(5);

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_records(
            vec![
                CelestialBody::anomaly("a1", Vec3::ZERO),
                CelestialBody::galaxy("g1", Vec3::new(1_000.0, 0.0, 0.0)).with_parent("a1"),
            ],
            vec![],
        ))
    }

    fn scheduler(store: Arc<MemoryStore>, sink: Box<dyn BroadcastSink>) -> TickScheduler {
        let worker = PersistenceWorker::spawn(store.clone(), store).unwrap();
        TickScheduler::new(GravityEngine::with_defaults(5), Box::new(ManualClock::new(0)), sink, worker)
    }

    #[test]
    fn test_refresh_runs_in_background() {
        let mut sched = scheduler(store(), Box::new(NullSink));
        sched.handle().start().unwrap();

        // First iteration queues the refresh and ticks on the empty cache.
        let first = sched.run_once().unwrap();
        assert!(first.broadcast.is_none());
        assert!(sched.wait_for_worker(WAIT));
        assert!(sched.engine().body(&BodyId::from("g1")).is_some());

        let second = sched.run_once().unwrap();
        assert!(second.broadcast.is_some());
    }

    #[test]
    fn test_stopped_engine_does_not_tick() {
        let mut sched = scheduler(store(), Box::new(NullSink));
        assert!(sched.run_once().is_none());
        assert_eq!(sched.engine().tick_counter(), 0);
        sched.handle().start().unwrap();
        sched.handle().stop().unwrap();
        assert!(sched.run_once().is_none());
    }

    #[test]
    fn test_broadcasts_reach_subscribers() {
        let hub = Arc::new(Broadcaster::new());
        let rx = hub.subscribe();
        let mut sched = scheduler(store(), Box::new(Arc::clone(&hub)));
        sched.handle().start().unwrap();
        sched.run_once();
        sched.wait_for_worker(WAIT);
        sched.run_once();
        let payload: Arc<TickBroadcast> = rx.try_recv().unwrap();
        assert_eq!(payload.galaxies.len(), 1);
    }

    #[test]
    fn test_failed_flush_retried_next_time() {
        let store = store();
        let mut sched = scheduler(store.clone(), Box::new(NullSink));
        sched.handle().start().unwrap();
        sched.run_once();
        sched.wait_for_worker(WAIT);

        store.set_fail_writes(true);
        let every = sched.engine().config().scheduler.persist_every_ticks;
        let mut flushed = None;
        while flushed.is_none() {
            flushed = sched.run_once().and_then(|o| o.flush);
        }
        assert!(flushed.unwrap().tick <= every + 1);
        assert!(sched.wait_for_worker(WAIT));
        assert!(sched.engine().dirty_count() > 0, "failed batch must be re-marked dirty");
        assert_eq!(store.write_batches(), 0);

        store.set_fail_writes(false);
        let mut retried = None;
        while retried.is_none() {
            retried = sched.run_once().and_then(|o| o.flush);
        }
        assert!(sched.wait_for_worker(WAIT));
        assert!(store.write_batches() >= 1);
        let stored = store.body(&BodyId::from("g1")).unwrap();
        assert_ne!(stored.position, Vec3::new(1_000.0, 0.0, 0.0));
    }

    struct PanickingSink;

    impl BroadcastSink for PanickingSink {
        fn publish(&self, _broadcast: Arc<TickBroadcast>) {
            panic!("transport exploded");
        }
    }

    #[test]
    fn test_panic_is_contained() {
        let mut sched = scheduler(store(), Box::new(PanickingSink));
        sched.handle().start().unwrap();
        sched.run_once();
        sched.wait_for_worker(WAIT);

        assert!(sched.run_once().is_none());
        assert_eq!(sched.faults(), 1);
        assert!(sched.run_once().is_none());
        assert_eq!(sched.faults(), 2);
        assert_eq!(sched.engine().tick_counter(), 3);
    }

    #[test]
    fn test_control_handle_round_trip() {
        let sched = scheduler(store(), Box::new(NullSink));
        let handle = sched.handle();
        let join = sched.spawn().unwrap();

        handle.start().unwrap();
        assert!(matches!(
            handle.set_simulation_speed(0.05),
            Err(ControlError::SpeedOutOfRange { .. })
        ));
        assert_eq!(handle.set_simulation_speed(2.0), Ok(1.0));
        let status = handle.status().unwrap();
        assert!(status.running);
        assert_eq!(status.simulation_speed, 2.0);
        handle.connections().unwrap();

        handle.shutdown().unwrap();
        let engine = join.join().unwrap();
        assert!(engine.tick_counter() > 0);
        assert!(matches!(handle.status(), Err(ControlError::Disconnected)));
    }
}

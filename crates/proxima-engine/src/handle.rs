use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use proxima_geom::Position;
use proxima_visibility::{SettingsError, VisibilityRecord, VisibilitySettings};

use crate::engine::{EngineStats, ProximityEngine, VisibilityBatch};

/// Shared, lock-guarded engine. Cloned into the tick loop, the transport and any other
/// position source; every call takes the lock for its own duration only.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<ProximityEngine>>,
}

impl EngineHandle {
    pub fn new(settings: VisibilitySettings) -> Self {
        Self::from_engine(ProximityEngine::new(settings))
    }

    pub fn from_engine(engine: ProximityEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    // A panic mid-call cannot leave the maps out of step (every mutation is a single insert
    // or remove pair), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ProximityEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut ProximityEngine) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn set_observer_position(&self, position: Position) {
        self.lock().set_observer_position(position);
    }

    pub fn observer(&self) -> Option<Position> {
        self.lock().observer().cloned()
    }

    pub fn upsert_participant(&self, position: Position) {
        self.lock().upsert_participant(position);
    }

    pub fn remove_participant(&self, id: &str) -> bool {
        self.lock().remove_participant(id)
    }

    pub fn participant(&self, id: &str) -> Option<Position> {
        self.lock().participant(id).cloned()
    }

    pub fn settings(&self) -> VisibilitySettings {
        self.lock().settings()
    }

    pub fn set_settings(&self, settings: VisibilitySettings) -> Result<(), SettingsError> {
        self.lock().set_settings(settings)
    }

    pub fn set_world_scale(&self, scale: f32) {
        self.lock().set_world_scale(scale);
    }

    pub fn set_stale_after(&self, window: Duration) {
        self.lock().set_stale_after(window);
    }

    pub fn subscribe(&self) -> Receiver<VisibilityBatch> {
        self.lock().subscribe()
    }

    pub fn tick(&self, now: Instant) -> VisibilityBatch {
        self.lock().tick(now)
    }

    pub fn visible(&self) -> Vec<VisibilityRecord> {
        self.lock().visible()
    }

    pub fn record(&self, id: &str) -> Option<VisibilityRecord> {
        self.lock().record(id).cloned()
    }

    pub fn stats(&self) -> EngineStats {
        self.lock().stats()
    }
}

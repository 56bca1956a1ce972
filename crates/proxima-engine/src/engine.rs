use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use proxima_geom::Position;
use proxima_visibility::{SettingsError, VisibilityRecord, VisibilitySettings, advance};

/// Participants not heard from for this long are dropped on the next tick.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5);

/// Records that changed in one tick, plus ids removed since the previous tick.
#[derive(Clone, Debug, Default)]
pub struct VisibilityBatch {
    pub tick: u64,
    pub changed: Vec<VisibilityRecord>,
    pub removed: Vec<String>,
}

impl VisibilityBatch {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineStats {
    pub total: usize,
    pub visible: usize,
    pub hidden: usize,
    pub effective_sight_distance: f32,
    pub world_scale: f32,
    pub update_rate: f32,
    pub observer_set: bool,
}

/// Observer, participants and their fade records. Positions and records are only ever
/// inserted or removed together.
pub struct ProximityEngine {
    settings: VisibilitySettings,
    observer: Option<Position>,
    participants: HashMap<String, Position>,
    records: HashMap<String, VisibilityRecord>,
    world_scale: f32,
    stale_after: Duration,
    pending_removed: Vec<String>,
    subscribers: Vec<Sender<VisibilityBatch>>,
    ticks: u64,
}

impl ProximityEngine {
    pub fn new(settings: VisibilitySettings) -> Self {
        Self {
            settings,
            observer: None,
            participants: HashMap::new(),
            records: HashMap::new(),
            world_scale: 1.0,
            stale_after: DEFAULT_STALE_AFTER,
            pending_removed: Vec::new(),
            subscribers: Vec::new(),
            ticks: 0,
        }
    }

    pub fn settings(&self) -> VisibilitySettings {
        self.settings
    }

    /// Takes effect on the next tick. Invalid settings leave the current ones in place.
    pub fn set_settings(&mut self, settings: VisibilitySettings) -> Result<(), SettingsError> {
        settings.validate()?;
        self.settings = settings;
        log::info!(
            target: "engine",
            "settings updated: sight={} fade={} duration={}s rate={}s",
            settings.sight_distance,
            settings.fade_distance,
            settings.fade_duration,
            settings.update_rate
        );
        Ok(())
    }

    pub fn set_observer_position(&mut self, position: Position) {
        log::trace!(
            target: "engine",
            "observer at ({:.2}, {:.2}, {:.2})",
            position.coords.x,
            position.coords.y,
            position.coords.z
        );
        self.observer = Some(position);
    }

    pub fn observer(&self) -> Option<&Position> {
        self.observer.as_ref()
    }

    pub fn upsert_participant(&mut self, position: Position) {
        if !self.records.contains_key(&position.id) {
            log::debug!(target: "engine", "tracking {} ({})", position.name, position.id);
            self.pending_removed.retain(|id| id != &position.id);
            self.records.insert(
                position.id.clone(),
                VisibilityRecord::new(position.id.clone(), position.captured_at),
            );
        }
        self.participants.insert(position.id.clone(), position);
    }

    /// Drops the participant and its record. Returns false if the id was not tracked.
    pub fn remove_participant(&mut self, id: &str) -> bool {
        let had_position = self.participants.remove(id).is_some();
        let had_record = self.records.remove(id).is_some();
        if had_position || had_record {
            log::info!(target: "engine", "removed {} from tracking", id);
            self.pending_removed.push(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn participant(&self, id: &str) -> Option<&Position> {
        self.participants.get(id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn set_world_scale(&mut self, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            log::warn!(target: "engine", "ignoring world scale {}", scale);
            return;
        }
        self.world_scale = scale;
        log::info!(target: "engine", "world scale set to {}", scale);
    }

    pub fn world_scale(&self) -> f32 {
        self.world_scale
    }

    pub fn set_stale_after(&mut self, window: Duration) {
        self.stale_after = window;
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Receives every non-empty batch produced by later ticks.
    pub fn subscribe(&mut self) -> Receiver<VisibilityBatch> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// One evaluation pass: evict stale participants, advance every record, publish changes.
    pub fn tick(&mut self, now: Instant) -> VisibilityBatch {
        self.ticks = self.ticks.wrapping_add(1);
        let mut removed = std::mem::take(&mut self.pending_removed);

        let stale: Vec<String> = self
            .participants
            .iter()
            .filter(|(_, p)| p.age(now) > self.stale_after)
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            self.participants.remove(&id);
            self.records.remove(&id);
            log::info!(target: "engine", "evicted stale participant {}", id);
            removed.push(id);
        }

        let mut ids: Vec<&String> = self.participants.keys().collect();
        ids.sort_unstable();

        let settings = self.settings;
        let mut changed = Vec::new();
        for id in ids {
            let distance = match (&self.observer, self.participants.get(id)) {
                (Some(observer), Some(p)) => {
                    observer.distance_to(p, settings.use_vertical_distance)
                }
                _ => f32::INFINITY,
            };
            if let Some(record) = self.records.get_mut(id) {
                if advance(record, distance, &settings, self.world_scale, now) {
                    changed.push(record.clone());
                }
            }
        }

        let batch = VisibilityBatch {
            tick: self.ticks,
            changed,
            removed,
        };
        if !batch.is_empty() {
            self.subscribers.retain(|tx| tx.send(batch.clone()).is_ok());
        }
        batch
    }

    /// Records with any opacity, ordered by id.
    pub fn visible(&self) -> Vec<VisibilityRecord> {
        let mut out: Vec<VisibilityRecord> = self
            .records
            .values()
            .filter(|r| r.is_visible())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn record(&self, id: &str) -> Option<&VisibilityRecord> {
        self.records.get(id)
    }

    pub fn stats(&self) -> EngineStats {
        let total = self.participants.len();
        let visible = self.records.values().filter(|r| r.is_visible()).count();
        EngineStats {
            total,
            visible,
            hidden: total.saturating_sub(visible),
            effective_sight_distance: self.settings.effective_sight_distance(self.world_scale),
            world_scale: self.world_scale,
            update_rate: self.settings.update_rate,
            observer_set: self.observer.is_some(),
        }
    }
}

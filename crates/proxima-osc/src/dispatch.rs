use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use proxima_engine::{EngineHandle, Position};
use proxima_geom::heading_from_quaternion;

use crate::codec::{self, OscArg};
use crate::route::{Inbound, Router};

const OBSERVER_NAME: &str = "LocalUser";

/// Notifications for things the engine itself does not track.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Joined { id: String, name: String },
    Left { id: String, name: Option<String> },
    Parameter { name: String, value: OscArg },
}

/// Fallback display name for ids that never announced one.
pub fn default_display_name(id: &str) -> String {
    let short: String = id.chars().take(8).collect();
    format!("User_{}", short)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the receive thread and the transport's public handle.
#[derive(Default)]
pub(crate) struct Shared {
    names: Mutex<HashMap<String, String>>,
    subscribers: Mutex<Vec<Sender<TransportEvent>>>,
    pub(crate) received: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) sent: AtomicU64,
    pub(crate) send_failures: AtomicU64,
}

impl Shared {
    pub(crate) fn subscribe(&self) -> Receiver<TransportEvent> {
        let (tx, rx) = unbounded();
        lock(&self.subscribers).push(tx);
        rx
    }

    fn publish(&self, event: TransportEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn known_users(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.names).keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn known_user_count(&self) -> usize {
        lock(&self.names).len()
    }

    pub(crate) fn display_name(&self, id: &str) -> String {
        lock(&self.names)
            .get(id)
            .cloned()
            .unwrap_or_else(|| default_display_name(id))
    }
}

/// Applies routed messages to the engine and the name cache.
pub(crate) struct Dispatcher {
    engine: EngineHandle,
    router: Router,
    local_user_id: String,
    avatar_parameters: bool,
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub(crate) fn new(
        engine: EngineHandle,
        router: Router,
        local_user_id: String,
        avatar_parameters: bool,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            engine,
            router,
            local_user_id,
            avatar_parameters,
            shared,
        }
    }

    /// Decode, route and apply one datagram. Faults are logged and counted, never returned.
    pub(crate) fn handle_datagram(&self, buf: &[u8], now: Instant) {
        let messages = match codec::decode(buf) {
            Ok(m) => m,
            Err(e) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!(target: "osc", "dropping {}-byte datagram: {}", buf.len(), e);
                return;
            }
        };
        for msg in messages {
            self.shared.received.fetch_add(1, Ordering::Relaxed);
            match self.router.route(&msg) {
                Ok(inbound) => self.apply(inbound, now),
                Err(e) => {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!(target: "osc", "dropping message: {}", e);
                }
            }
        }
    }

    pub(crate) fn apply(&self, inbound: Inbound, now: Instant) {
        match inbound {
            Inbound::HeadPosition(coords) => {
                let heading = self.engine.observer().and_then(|o| o.heading);
                let mut pos = Position::new(self.local_user_id.as_str(), OBSERVER_NAME, coords, now);
                pos.heading = heading;
                self.engine.set_observer_position(pos);
            }
            Inbound::HeadRotation { x, y, z, w } => {
                let heading = heading_from_quaternion(x, y, z, w);
                if !heading.is_finite() {
                    return;
                }
                self.engine.with(|e| {
                    if let Some(obs) = e.observer().cloned() {
                        e.set_observer_position(obs.with_heading(heading));
                    }
                });
            }
            Inbound::UserPosition { id, coords } => {
                let name = self.shared.display_name(&id);
                self.engine
                    .upsert_participant(Position::new(id, name, coords, now));
            }
            Inbound::UserJoin { id, name } => {
                let name = name.unwrap_or_else(|| default_display_name(&id));
                log::info!(target: "osc", "user joined: {} ({})", name, id);
                lock(&self.shared.names).insert(id.clone(), name.clone());
                self.shared.publish(TransportEvent::Joined { id, name });
            }
            Inbound::UserLeave { id } => {
                let name = lock(&self.shared.names).remove(&id);
                self.engine.remove_participant(&id);
                log::info!(target: "osc", "user left: {} ({})", name.as_deref().unwrap_or(&id), id);
                self.shared.publish(TransportEvent::Left { id, name });
            }
            Inbound::AvatarParameter { name, value } => {
                if self.avatar_parameters {
                    log::trace!(target: "osc", "parameter {} = {}", name, value);
                    self.shared.publish(TransportEvent::Parameter { name, value });
                }
            }
            Inbound::InstanceUsers(users) => {
                let mut names = lock(&self.shared.names);
                for user in users {
                    if user.id.is_empty() || names.contains_key(&user.id) {
                        continue;
                    }
                    let name = user
                        .display_name
                        .unwrap_or_else(|| default_display_name(&user.id));
                    log::info!(target: "osc", "discovered user: {} ({})", name, user.id);
                    names.insert(user.id, name);
                }
            }
            Inbound::WorldScale(scale) => {
                log::info!(target: "osc", "world scale {}", scale);
                self.engine.set_world_scale(scale);
            }
            Inbound::VisibilityAck { path, args } => {
                log::debug!(target: "osc", "visibility response {}: {:?}", path, args);
            }
        }
    }
}

//! In-memory event bus holding the open event streams of every room.
//!
//! Each room has at most one host stream and one stream per joined device.
//! Streams are one-way and ordered; the bus never buffers for disconnected
//! clients, so a reconnecting client must re-read state explicitly.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

struct StreamEntry {
    id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

#[derive(Default)]
struct RoomChannels {
    host: Option<StreamEntry>,
    players: HashMap<String, StreamEntry>,
}

/// Registry of live event streams, keyed by room.
pub struct EventBus {
    rooms: DashMap<String, RoomChannels>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Open (or replace) the host stream of a room. The returned id lets the
    /// forwarder deregister exactly the stream it owns, so a reconnect that
    /// replaced the entry is never torn down by the stale forwarder.
    pub fn register_host(&self, room_id: &str) -> (Uuid, mpsc::Receiver<ServerEvent>) {
        let (entry, receiver) = self.make_stream();
        let id = entry.id;
        self.rooms.entry(room_id.to_string()).or_default().host = Some(entry);
        (id, receiver)
    }

    /// Open (or replace) the stream of one device in a room.
    pub fn register_player(
        &self,
        room_id: &str,
        device_id: &str,
    ) -> (Uuid, mpsc::Receiver<ServerEvent>) {
        let (entry, receiver) = self.make_stream();
        let id = entry.id;
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .players
            .insert(device_id.to_string(), entry);
        (id, receiver)
    }

    pub fn unregister_host(&self, room_id: &str, stream_id: Uuid) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            if room.host.as_ref().is_some_and(|entry| entry.id == stream_id) {
                room.host = None;
            }
        }
    }

    pub fn unregister_player(&self, room_id: &str, device_id: &str, stream_id: Uuid) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            if room
                .players
                .get(device_id)
                .is_some_and(|entry| entry.id == stream_id)
            {
                room.players.remove(device_id);
            }
        }
    }

    /// Deliver to the host stream if present; a failed send drops the stream.
    pub fn broadcast_host<T: Serialize>(&self, room_id: &str, name: &str, payload: &T) {
        let Some(event) = encode(name, payload) else {
            return;
        };
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            let failed = match &room.host {
                Some(entry) => entry.tx.try_send(event).is_err(),
                None => false,
            };
            if failed {
                room.host = None;
            }
        }
    }

    /// Deliver to every live player stream of the room, pruning dead ones.
    pub fn broadcast_players<T: Serialize>(&self, room_id: &str, name: &str, payload: &T) {
        let Some(event) = encode(name, payload) else {
            return;
        };
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.players
                .retain(|_, entry| entry.tx.try_send(event.clone()).is_ok());
        }
    }

    /// Deliver to the listed devices only (e.g. the mafia chat fan-out).
    pub fn broadcast_devices<T: Serialize>(
        &self,
        room_id: &str,
        devices: &[String],
        name: &str,
        payload: &T,
    ) {
        let Some(event) = encode(name, payload) else {
            return;
        };
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            let mut dead = Vec::new();
            for device_id in devices {
                if let Some(entry) = room.players.get(device_id) {
                    if entry.tx.try_send(event.clone()).is_err() {
                        dead.push(device_id.clone());
                    }
                }
            }
            for device_id in dead {
                room.players.remove(&device_id);
            }
        }
    }

    pub fn broadcast_all<T: Serialize>(&self, room_id: &str, name: &str, payload: &T) {
        self.broadcast_host(room_id, name, payload);
        self.broadcast_players(room_id, name, payload);
    }

    /// Drop every stream of a room.
    pub fn release_room(&self, room_id: &str) {
        self.rooms.remove(room_id);
    }

    fn make_stream(&self) -> (StreamEntry, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        // Handshake frame delivered before the stream is handed out.
        let _ = tx.try_send(ServerEvent::connect());
        (
            StreamEntry {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }
}

fn encode<T: Serialize>(name: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(name, payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialize event payload");
            None
        }
    }
}

//! In-memory state of every room this device knows about.
//!
//! The registry is plain data: it never touches the network and never
//! awaits. Each mutator keeps the classification invariants intact, so
//! protocol handlers only decide *which* mutation applies.

use chrono::{DateTime, Duration, Utc};
use common::{
    ConnMethod, DeviceId, DiscoveredRoom, ListenedRoom, ListenerRecord, LivenessEntry,
    NetworkLocation, RoomData, ServiceStatus, StoredListenerSnapshot,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::adapter::{ConnAdapter, RoomRepository};

#[derive(Clone, Default)]
pub struct RoomRegistry {
    pub(crate) conn_method: ConnMethod,
    pub(crate) conn_adapter: Option<Arc<dyn ConnAdapter>>,
    pub(crate) repository: Option<Arc<dyn RoomRepository>>,
    pub(crate) status: ServiceStatus,
    pub(crate) current_device: Option<String>,

    // Receiver side
    rooms_to_discover: BTreeMap<DeviceId, DiscoveredRoom>,
    rooms_listening_to: BTreeMap<DeviceId, ListenedRoom>,
    stored_listeners: Vec<StoredListenerSnapshot>,

    // Emitter side
    current_listeners: BTreeMap<DeviceId, ListenerRecord>,
    incoming_responder: Option<String>,

    scheduled_to_check: HashMap<DeviceId, LivenessEntry>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovered(&self) -> Vec<DiscoveredRoom> {
        self.rooms_to_discover.values().cloned().collect()
    }

    pub fn listened_rooms(&self) -> Vec<ListenedRoom> {
        self.rooms_listening_to.values().cloned().collect()
    }

    pub fn listeners(&self) -> Vec<ListenerRecord> {
        self.current_listeners.values().cloned().collect()
    }

    pub fn incoming_responder(&self) -> Option<&str> {
        self.incoming_responder.as_deref()
    }

    pub fn stored_listeners(&self) -> &[StoredListenerSnapshot] {
        &self.stored_listeners
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn conn_method(&self) -> ConnMethod {
        self.conn_method
    }

    pub fn current_device(&self) -> Option<&str> {
        self.current_device.as_deref()
    }

    pub fn discovered_room(&self, device_id: &str) -> Option<&DiscoveredRoom> {
        self.rooms_to_discover.get(device_id)
    }

    pub fn listened_room(&self, device_id: &str) -> Option<&ListenedRoom> {
        self.rooms_listening_to.get(device_id)
    }

    pub fn listener(&self, device_id: &str) -> Option<&ListenerRecord> {
        self.current_listeners.get(device_id)
    }

    pub fn liveness(&self, device_id: &str) -> Option<&LivenessEntry> {
        self.scheduled_to_check.get(device_id)
    }

    pub fn liveness_count(&self) -> usize {
        self.scheduled_to_check.len()
    }

    /// Listeners, listened rooms and discovered rooms as location-only
    /// tuples, in that order. Nothing is de-duplicated.
    pub fn merged_rooms(&self) -> Vec<RoomData> {
        let listeners = self.current_listeners.values().map(|x| RoomData {
            device_id: x.device_id.clone(),
            location: x.location.clone(),
        });
        let listening_to = self.rooms_listening_to.values().map(|x| RoomData {
            device_id: x.device_id.clone(),
            location: x.location.clone(),
        });
        let to_discover = self.rooms_to_discover.values().map(|x| RoomData {
            device_id: x.device_id.clone(),
            location: x.location.clone(),
        });
        listeners.chain(listening_to).chain(to_discover).collect()
    }

    /// Inserts a discovered room unless the device is already discovered
    /// or already listened to. Returns whether it was inserted.
    pub fn insert_discovered(&mut self, room: DiscoveredRoom) -> bool {
        if self.rooms_listening_to.contains_key(&room.device_id)
            || self.rooms_to_discover.contains_key(&room.device_id)
        {
            return false;
        }
        self.rooms_to_discover.insert(room.device_id.clone(), room);
        true
    }

    pub fn remove_discovered(&mut self, device_id: &str) -> Option<DiscoveredRoom> {
        self.rooms_to_discover.remove(device_id)
    }

    /// Moves a discovered room into the listened set, connected and
    /// without a pending help request.
    pub fn promote(&mut self, device_id: &str) -> Option<ListenedRoom> {
        let discovered = self.rooms_to_discover.remove(device_id)?;
        let listened = ListenedRoom::from(discovered);
        self.rooms_listening_to
            .insert(listened.device_id.clone(), listened.clone());
        Some(listened)
    }

    pub fn remove_listened(&mut self, device_id: &str) -> Option<ListenedRoom> {
        self.rooms_listening_to.remove(device_id)
    }

    pub fn mark_disconnected(&mut self, device_id: &str) -> bool {
        match self.rooms_listening_to.get_mut(device_id) {
            Some(room) => {
                room.disconnected = true;
                room.needs_assist = false;
                true
            }
            None => false,
        }
    }

    pub fn mark_connected(&mut self, device_id: &str) -> bool {
        match self.rooms_listening_to.get_mut(device_id) {
            Some(room) => {
                room.disconnected = false;
                true
            }
            None => false,
        }
    }

    pub fn set_needs_assist(&mut self, device_id: &str, needs_assist: bool) -> bool {
        match self.rooms_listening_to.get_mut(device_id) {
            Some(room) => {
                room.needs_assist = needs_assist;
                true
            }
            None => false,
        }
    }

    /// Keyed by device id: a repeated announcement replaces the record.
    pub fn upsert_listener(&mut self, record: ListenerRecord) {
        self.current_listeners.insert(record.device_id.clone(), record);
    }

    pub fn remove_listener(&mut self, device_id: &str) -> Option<ListenerRecord> {
        self.current_listeners.remove(device_id)
    }

    pub fn set_incoming_responder(&mut self, responder_name: impl Into<String>) {
        self.incoming_responder = Some(responder_name.into());
    }

    pub fn record_ping(
        &mut self,
        device_id: DeviceId,
        location: NetworkLocation,
        at: DateTime<Utc>,
    ) {
        self.scheduled_to_check.insert(
            device_id,
            LivenessEntry {
                last_ping_at: at,
                location,
            },
        );
    }

    pub fn remove_liveness(&mut self, device_id: &str) -> Option<LivenessEntry> {
        self.scheduled_to_check.remove(device_id)
    }

    /// Devices whose last ping is older than `threshold` at `now`.
    pub fn stale_devices(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<DeviceId> {
        let mut stale: Vec<DeviceId> = self
            .scheduled_to_check
            .iter()
            .filter(|(_, entry)| now.signed_duration_since(entry.last_ping_at) > threshold)
            .map(|(id, _)| id.clone())
            .collect();
        stale.sort();
        stale
    }

    /// Replaces the stored-listener mirror.
    pub fn seed_stored_listeners(&mut self, listeners: Vec<StoredListenerSnapshot>) {
        self.stored_listeners = listeners;
    }
}

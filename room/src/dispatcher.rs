//! Protocol handlers: one per inbound event.
//!
//! Each handler runs to completion against a locked registry. Unmet
//! preconditions are silent no-ops; nothing here fails.

use chrono::{DateTime, Utc};
use common::{
    DeviceId, DiscoveredRoom, ListenedRoom, ListenerRecord, NetworkLocation, RoomMessage,
};
use log::{debug, warn};
use std::net::SocketAddr;

use crate::registry::RoomRegistry;
use crate::store::RoomStore;

/// A decoded inbound event, with the sender's location where it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    AdvertiseResponse { device_id: DeviceId, location: NetworkLocation },
    BroadcastStop { device_id: DeviceId },
    Listening { device_id: DeviceId, responder_name: String, location: NetworkLocation },
    NotListening { device_id: DeviceId },
    RequestHelp { device_id: DeviceId },
    RequestStop { device_id: DeviceId },
    RespondToHelp { responder_name: String },
    StatusResponse { device_id: DeviceId, location: NetworkLocation },
    Invalid { raw: String },
}

impl RoomEvent {
    /// Maps a wire message onto the event it feeds. Requests that the
    /// transport answers itself (`advertise`, `statusRequest`) map to `None`.
    pub fn from_message(message: RoomMessage, from: SocketAddr) -> Option<Self> {
        let location = NetworkLocation::from(from);
        let event = match message {
            RoomMessage::Advertise { .. } | RoomMessage::StatusRequest { .. } => return None,
            RoomMessage::RespondToAdvertise { app_id } => RoomEvent::AdvertiseResponse {
                device_id: app_id,
                location,
            },
            RoomMessage::BroadcastStop { app_id } => RoomEvent::BroadcastStop { device_id: app_id },
            RoomMessage::Listening { app_id, responder_name } => RoomEvent::Listening {
                device_id: app_id,
                responder_name,
                location,
            },
            RoomMessage::NotListening { app_id } => RoomEvent::NotListening { device_id: app_id },
            RoomMessage::RequestHelp { app_id } => RoomEvent::RequestHelp { device_id: app_id },
            RoomMessage::RequestStop { app_id } => RoomEvent::RequestStop { device_id: app_id },
            RoomMessage::RespondToHelp { responder_name } => {
                RoomEvent::RespondToHelp { responder_name }
            }
            RoomMessage::ImOkay { app_id } => RoomEvent::StatusResponse {
                device_id: app_id,
                location,
            },
        };
        Some(event)
    }

    pub fn invalid(raw: &[u8]) -> Self {
        RoomEvent::Invalid {
            raw: String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

/// Applies an event to the registry. `now` stamps liveness refreshes.
pub fn apply(registry: &mut RoomRegistry, event: RoomEvent, now: DateTime<Utc>) {
    match event {
        RoomEvent::AdvertiseResponse { device_id, location } => {
            on_advertise_response(registry, device_id, location)
        }
        RoomEvent::BroadcastStop { device_id } => on_broadcast_stop(registry, device_id.as_str()),
        RoomEvent::Listening { device_id, responder_name, location } => {
            on_receiver_listening(registry, device_id, responder_name, location)
        }
        RoomEvent::NotListening { device_id } => on_not_listening(registry, device_id.as_str()),
        RoomEvent::RequestHelp { device_id } => {
            on_emitter_request_help(registry, device_id.as_str())
        }
        RoomEvent::RequestStop { device_id } => {
            on_emitter_stops_help_request(registry, device_id.as_str())
        }
        RoomEvent::RespondToHelp { responder_name } => {
            on_respond_to_help(registry, responder_name)
        }
        RoomEvent::StatusResponse { device_id, location } => {
            on_status_response(registry, device_id, location, now)
        }
        RoomEvent::Invalid { raw } => on_invalid_message(&raw),
    }
}

pub fn on_advertise_response(
    registry: &mut RoomRegistry,
    device_id: DeviceId,
    location: NetworkLocation,
) {
    if registry.listened_room(device_id.as_str()).is_some() {
        return;
    }
    let inserted = registry.insert_discovered(DiscoveredRoom {
        device_id: device_id.clone(),
        location,
    });
    if inserted {
        debug!("Discovered room {}", device_id);
    }
}

pub fn on_broadcast_stop(registry: &mut RoomRegistry, device_id: &str) {
    if registry.remove_discovered(device_id).is_some() {
        debug!("Room {} stopped broadcasting, removed from discovery", device_id);
        return;
    }
    if registry.mark_disconnected(device_id) {
        debug!("Room {} stopped broadcasting, marked disconnected", device_id);
    }
}

/// Receiver side, before telling the emitter this device listens.
pub fn on_start_listening(registry: &mut RoomRegistry, device_id: &str) -> Option<ListenedRoom> {
    let listened = registry.promote(device_id);
    if listened.is_some() {
        debug!("Now listening to room {}", device_id);
    }
    listened
}

/// Emitter side: a receiver announced it listens to this device.
pub fn on_receiver_listening(
    registry: &mut RoomRegistry,
    device_id: DeviceId,
    responder_name: String,
    location: NetworkLocation,
) {
    debug!("{} ({}) is listening from {}", responder_name, device_id, location);
    registry.upsert_listener(ListenerRecord {
        device_id,
        location,
        responder_name,
    });
}

pub fn on_not_listening(registry: &mut RoomRegistry, device_id: &str) {
    if registry.remove_listened(device_id).is_some() {
        debug!("Stopped listening to room {}", device_id);
    }
}

pub fn on_emitter_request_help(registry: &mut RoomRegistry, device_id: &str) {
    if registry.set_needs_assist(device_id, true) {
        debug!("Room {} requests help", device_id);
    }
}

pub fn on_emitter_stops_help_request(registry: &mut RoomRegistry, device_id: &str) {
    if registry.set_needs_assist(device_id, false) {
        debug!("Room {} no longer needs help", device_id);
    }
}

/// Emitter side: someone answered the outstanding help request.
pub fn on_respond_to_help(registry: &mut RoomRegistry, responder_name: String) {
    debug!("{} responded to the help request", responder_name);
    registry.set_incoming_responder(responder_name);
}

pub fn on_invalid_message(raw: &str) {
    warn!("[Invalid schema]: {}", raw);
}

pub fn on_status_response(
    registry: &mut RoomRegistry,
    device_id: DeviceId,
    location: NetworkLocation,
    now: DateTime<Utc>,
) {
    if registry.mark_connected(device_id.as_str()) {
        // Keep the location already on record for listened rooms.
        let location = registry
            .liveness(device_id.as_str())
            .map(|entry| entry.location.clone())
            .unwrap_or(location);
        registry.record_ping(device_id, location, now);
        return;
    }
    registry.record_ping(device_id, location, now);
}

/// Forgets a silent device: dropped from discovery, or marked
/// disconnected if listened to, and always dropped from the listeners.
pub fn on_device_clean_up(registry: &mut RoomRegistry, device_id: &str) {
    if registry.remove_discovered(device_id).is_some() {
        debug!("Cleaned up discovered room {}", device_id);
    } else if registry.mark_disconnected(device_id) {
        debug!("Cleaned up listened room {}, marked disconnected", device_id);
    }
    if registry.remove_listener(device_id).is_some() {
        debug!("Cleaned up listener {}", device_id);
    }
}

/// Sink for decoded inbound events. Every event is applied under the
/// store's lock, in delivery order.
#[derive(Clone)]
pub struct EventDispatcher {
    store: RoomStore,
    local_id: Option<DeviceId>,
}

impl EventDispatcher {
    pub fn new(store: RoomStore) -> Self {
        Self {
            store,
            local_id: None,
        }
    }

    /// Datagrams carrying `local_id` (our own broadcasts echoed back) are
    /// dropped before dispatch.
    pub fn with_local_id(store: RoomStore, local_id: DeviceId) -> Self {
        Self {
            store,
            local_id: Some(local_id),
        }
    }

    pub fn dispatch(&self, event: RoomEvent) {
        let now = Utc::now();
        self.store.update(|registry| apply(registry, event, now));
    }

    /// Decodes a datagram and dispatches it. Returns the decoded message
    /// when it is a request the transport must answer itself.
    pub fn dispatch_datagram(&self, bytes: &[u8], from: SocketAddr) -> Option<RoomMessage> {
        let message = match RoomMessage::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!("Failed to decode datagram from {}: {}", from, e);
                self.dispatch(RoomEvent::invalid(bytes));
                return None;
            }
        };
        if self.local_id.is_some() && message.app_id() == self.local_id.as_ref() {
            return None;
        }
        match RoomEvent::from_message(message.clone(), from) {
            Some(event) => {
                self.dispatch(event);
                None
            }
            None => Some(message),
        }
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }
}

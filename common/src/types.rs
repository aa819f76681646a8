use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::borrow::Borrow;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

use crate::error::Result;

/// Stable identifier of a device across sessions (the app id on the wire).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkLocation {
    pub address: String,
    pub port: u16,
}

impl NetworkLocation {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.address.parse::<IpAddr>()?, self.port))
    }
}

impl From<SocketAddr> for NetworkLocation {
    fn from(addr: SocketAddr) -> Self {
        Self {
            address: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for NetworkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

/// An emitter seen through an advertisement response and not yet engaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredRoom {
    pub device_id: DeviceId,
    pub location: NetworkLocation,
}

/// An emitter this device listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenedRoom {
    pub device_id: DeviceId,
    pub location: NetworkLocation,
    pub disconnected: bool,
    pub needs_assist: bool,
}

impl From<DiscoveredRoom> for ListenedRoom {
    fn from(room: DiscoveredRoom) -> Self {
        Self {
            device_id: room.device_id,
            location: room.location,
            disconnected: false,
            needs_assist: false,
        }
    }
}

/// A receiver currently listening to this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerRecord {
    pub device_id: DeviceId,
    pub location: NetworkLocation,
    pub responder_name: String,
}

/// Location-only view of any tracked room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomData {
    pub device_id: DeviceId,
    pub location: NetworkLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessEntry {
    pub last_ping_at: DateTime<Utc>,
    pub location: NetworkLocation,
}

/// A persisted listening relationship as the repository stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredListener {
    pub app_id: DeviceId,
    pub name: String,
    pub last_seen: DateTime<Utc>,
}

/// Read-only mirror of a [`StoredListener`], without its app id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredListenerSnapshot {
    pub name: String,
    pub last_seen: DateTime<Utc>,
}

impl From<StoredListener> for StoredListenerSnapshot {
    fn from(listener: StoredListener) -> Self {
        Self {
            name: listener.name,
            last_seen: listener.last_seen,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    Up,
    #[default]
    Down,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnMethod {
    #[default]
    None,
    Udp,
}

impl ConnMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnMethod::None => "none",
            ConnMethod::Udp => "udp",
        }
    }
}

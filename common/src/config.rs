use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, RoomError};

/// Node-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_address: String,
    pub data_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load from environment
        Ok(Self {
            bind_address: std::env::var("ROOM_BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            data_path: std::env::var("ROOM_DATA_PATH")
                .unwrap_or_else(|_| "room-data.json".to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub broadcast_addr: String,
    pub discovery_interval: Duration,
    pub liveness_interval: Duration,
    /// Devices whose last status response is older than this are cleaned up.
    pub stale_after: Duration,
    pub ping_interval: Duration,
    pub max_packet_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: 41234,
            broadcast_addr: "255.255.255.255".to_string(),
            discovery_interval: Duration::from_secs(2),
            liveness_interval: Duration::from_secs(5),
            stale_after: Duration::from_secs(15),
            ping_interval: Duration::from_secs(3),
            max_packet_size: 1024,
        }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(port) = parse_var(&lookup, "ROOM_PORT")? {
            config.port = port;
        }
        if let Some(addr) = lookup("ROOM_BROADCAST_ADDR") {
            config.broadcast_addr = addr;
        }
        if let Some(ms) = parse_var(&lookup, "ROOM_DISCOVERY_INTERVAL_MS")? {
            config.discovery_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "ROOM_LIVENESS_INTERVAL_MS")? {
            config.liveness_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "ROOM_STALE_AFTER_MS")? {
            config.stale_after = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "ROOM_PING_INTERVAL_MS")? {
            config.ping_interval = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var(&lookup, "ROOM_MAX_PACKET_SIZE")? {
            config.max_packet_size = size;
        }
        Ok(config)
    }

    pub fn broadcast_target(&self) -> Result<SocketAddr> {
        let ip = self.broadcast_addr.parse::<IpAddr>().map_err(|_| {
            RoomError::ConfigError(format!("invalid broadcast address: {:?}", self.broadcast_addr))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RoomError::ConfigError(format!("invalid value for {}: {:?}", key, raw))),
        None => Ok(None),
    }
}

use common::{DiscoveryConfig, RoomMessage};
use log::{debug, error, info, warn};
use room::{ConnAdapter, EventDispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::discovery::UdpAdapter;
use crate::Role;

/// Feeds inbound datagrams to the dispatcher and answers the requests
/// the transport owns.
pub struct DiscoveryListener {
    adapter: Arc<UdpAdapter>,
    dispatcher: EventDispatcher,
    role: Role,
    max_packet_size: usize,
}

impl DiscoveryListener {
    pub fn new(
        adapter: Arc<UdpAdapter>,
        dispatcher: EventDispatcher,
        role: Role,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            adapter,
            dispatcher,
            role,
            max_packet_size: config.max_packet_size,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.start_listening().await })
    }

    pub async fn start_listening(&self) {
        let socket = self.adapter.socket();
        let mut buf = vec![0; self.max_packet_size];
        if let Ok(addr) = socket.local_addr() {
            info!("Listening for room events on {}", addr);
        }

        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => self.handle_datagram(&buf[..len], addr),
                Err(e) => {
                    warn!("UDP receive error: {}", e);
                    continue;
                }
            }
        }
    }

    pub fn handle_datagram(&self, data: &[u8], addr: SocketAddr) {
        let Some(request) = self.dispatcher.dispatch_datagram(data, addr) else {
            return;
        };
        let app_id = self.adapter.app_id().clone();
        let reply = match request {
            RoomMessage::Advertise { .. } if self.role.emits() => {
                RoomMessage::RespondToAdvertise { app_id }
            }
            RoomMessage::StatusRequest { .. } => RoomMessage::ImOkay { app_id },
            other => {
                debug!("Ignoring {} from {}", other.name(), addr);
                return;
            }
        };
        if let Err(e) = self.adapter.send_to(addr.port(), &addr.ip().to_string(), reply) {
            error!("Failed to answer {}: {}", addr, e);
        }
    }
}

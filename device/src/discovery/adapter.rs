use async_trait::async_trait;
use common::{DeviceId, DiscoveryConfig, Result, RoomError, RoomMessage};
use log::{debug, error};
use room::ConnAdapter;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;

/// UDP transport: unicast replies plus broadcast advertisements.
pub struct UdpAdapter {
    socket: Arc<UdpSocket>,
    app_id: DeviceId,
    broadcast_target: SocketAddr,
}

impl UdpAdapter {
    pub async fn bind(
        bind_address: &str,
        app_id: DeviceId,
        config: &DiscoveryConfig,
    ) -> Result<Self> {
        let ip = bind_address.parse::<IpAddr>().map_err(|_| {
            RoomError::ConfigError(format!("invalid bind address: {:?}", bind_address))
        })?;
        let socket = UdpSocket::bind(SocketAddr::new(ip, config.port)).await?;
        let broadcast_target = config.broadcast_target()?;
        Self::with_socket(socket, app_id, broadcast_target)
    }

    pub fn with_socket(
        socket: UdpSocket,
        app_id: DeviceId,
        broadcast_target: SocketAddr,
    ) -> Result<Self> {
        socket.set_broadcast(true)?;
        debug!(
            "UDP adapter bound to {} broadcasting to {}",
            socket.local_addr()?,
            broadcast_target
        );
        Ok(Self {
            socket: Arc::new(socket),
            app_id,
            broadcast_target,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn app_id(&self) -> &DeviceId {
        &self.app_id
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    async fn broadcast(&self, message: RoomMessage) -> Result<()> {
        let data = message.encode()?;
        self.socket.send_to(&data, self.broadcast_target).await?;
        debug!("Broadcast {} ({} bytes)", message.name(), data.len());
        Ok(())
    }

    /// Tells every listener this device is going away.
    pub async fn broadcast_stop(&self) -> Result<()> {
        self.broadcast(RoomMessage::BroadcastStop {
            app_id: self.app_id.clone(),
        })
        .await
    }
}

#[async_trait]
impl ConnAdapter for UdpAdapter {
    fn send_to(&self, port: u16, address: &str, message: RoomMessage) -> Result<()> {
        let data = message.encode()?;
        let target = SocketAddr::new(address.parse::<IpAddr>()?, port);
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RoomError::InternalError(e.to_string()))?;
        let socket = self.socket();
        let event = message.name();

        runtime.spawn(async move {
            match socket.send_to(&data, target).await {
                Ok(_) => debug!("Sent {} to {}", event, target),
                Err(e) => error!("Failed to send {} to {}: {}", event, target, e),
            }
        });
        Ok(())
    }

    async fn send_discovery(&self) -> Result<()> {
        self.broadcast(RoomMessage::Advertise {
            app_id: self.app_id.clone(),
        })
        .await
    }

    async fn request_help(&self) -> Result<()> {
        self.broadcast(RoomMessage::RequestHelp {
            app_id: self.app_id.clone(),
        })
        .await
    }
}

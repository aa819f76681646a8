use async_trait::async_trait;
use common::{DeviceId, Result, RoomMessage, StoredListener};

/// Transport capabilities the room store drives.
#[async_trait]
pub trait ConnAdapter: Send + Sync {
    /// Fire-and-forget unicast. Delivery is never awaited.
    fn send_to(&self, port: u16, address: &str, message: RoomMessage) -> Result<()>;

    /// Transmits a single discovery advertisement. An error means the
    /// broadcast channel is no longer usable.
    async fn send_discovery(&self) -> Result<()>;

    /// Signals a help request to whoever listens to this device.
    async fn request_help(&self) -> Result<()>;
}

/// Identity and history lookups backed by local persistence.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn current_app_id(&self) -> Result<DeviceId>;

    async fn current_name(&self) -> Result<String>;

    /// Previously persisted listening relationships.
    async fn listening_to(&self) -> Result<Vec<StoredListener>>;
}

//! The room store: the registry behind a single lock, plus the commands
//! that need the transport or the repository.
//!
//! Every mutation goes through [`RoomStore::update`], so handlers, sweeps
//! and commands never interleave. The lock is never held across an await.

use common::{
    ConnMethod, DeviceId, ListenedRoom, ListenerRecord, DiscoveredRoom, Result, RoomData,
    RoomError, RoomMessage, ServiceStatus, StoredListenerSnapshot,
};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::adapter::{ConnAdapter, RoomRepository};
use crate::dispatcher;
use crate::registry::RoomRegistry;

#[derive(Clone, Default)]
pub struct RoomStore {
    inner: Arc<Mutex<RoomRegistry>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<R>(&self, f: impl FnOnce(&RoomRegistry) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut RoomRegistry) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Consistent copy of the whole registry.
    pub fn snapshot(&self) -> RoomRegistry {
        self.inner.lock().clone()
    }

    pub fn update_connection_method(
        &self,
        conn_method: ConnMethod,
        conn_adapter: Option<Arc<dyn ConnAdapter>>,
    ) {
        info!("Connection method set to {}", conn_method.as_str());
        self.update(|registry| {
            registry.status = if conn_adapter.is_some() {
                ServiceStatus::Up
            } else {
                ServiceStatus::Down
            };
            registry.conn_method = conn_method;
            registry.conn_adapter = conn_adapter;
        });
    }

    pub fn connection_method(&self) -> ConnMethod {
        self.read(|registry| registry.conn_method())
    }

    pub fn adapter(&self) -> Result<Arc<dyn ConnAdapter>> {
        self.read(|registry| registry.conn_adapter.clone())
            .ok_or(RoomError::AdapterNotSet)
    }

    pub fn status(&self) -> ServiceStatus {
        self.read(|registry| registry.status())
    }

    pub fn update_service_status(&self, status: ServiceStatus) {
        self.update(|registry| registry.status = status);
    }

    pub fn current_device(&self) -> Option<String> {
        self.read(|registry| registry.current_device().map(str::to_string))
    }

    pub fn set_current_device(&self, device: Option<String>) {
        self.update(|registry| registry.current_device = device);
    }

    /// Sets the repository and seeds the stored-listener mirror from it.
    pub async fn sync_database(&self, repository: Arc<dyn RoomRepository>) -> Result<()> {
        self.update(|registry| registry.repository = Some(Arc::clone(&repository)));
        let stored = repository.listening_to().await?;
        if !stored.is_empty() {
            info!("Loaded {} stored listeners", stored.len());
        }
        let snapshot: Vec<_> = stored.into_iter().map(StoredListenerSnapshot::from).collect();
        self.update(|registry| registry.seed_stored_listeners(snapshot));
        Ok(())
    }

    pub fn repository(&self) -> Result<Arc<dyn RoomRepository>> {
        self.read(|registry| registry.repository.clone())
            .ok_or(RoomError::RepositoryNotSet)
    }

    pub async fn app_id(&self) -> Result<DeviceId> {
        self.repository()?.current_app_id().await
    }

    pub async fn current_name(&self) -> Result<String> {
        self.repository()?.current_name().await
    }

    pub fn get_discovered(&self) -> Vec<DiscoveredRoom> {
        self.read(|registry| registry.discovered())
    }

    pub fn get_listened_rooms(&self) -> Vec<ListenedRoom> {
        self.read(|registry| registry.listened_rooms())
    }

    pub fn get_listeners(&self) -> Vec<ListenerRecord> {
        self.read(|registry| registry.listeners())
    }

    pub fn get_merged_rooms(&self) -> Vec<RoomData> {
        self.read(|registry| registry.merged_rooms())
    }

    pub fn get_incoming_responder(&self) -> Option<String> {
        self.read(|registry| registry.incoming_responder().map(str::to_string))
    }

    pub fn get_stored_listeners(&self) -> Vec<StoredListenerSnapshot> {
        self.read(|registry| registry.stored_listeners().to_vec())
    }

    pub fn start_listening(&self, device_id: &str) -> Option<ListenedRoom> {
        self.update(|registry| dispatcher::on_start_listening(registry, device_id))
    }

    pub fn clean_up(&self, device_id: &str) {
        self.update(|registry| dispatcher::on_device_clean_up(registry, device_id));
    }

    /// Starts listening to a discovered room and tells its emitter.
    /// Returns `None` when the room was not in discovery.
    pub async fn add_to_listening_to(&self, device_id: &str) -> Result<Option<ListenedRoom>> {
        if self.read(|registry| registry.discovered_room(device_id).is_none()) {
            debug!("[RoomStore] No emitter {} in discovery rooms", device_id);
            return Ok(None);
        }
        let adapter = self.adapter()?;
        let repository = self.repository()?;
        let app_id = repository.current_app_id().await?;
        let responder_name = repository.current_name().await?;

        let Some(room) = self.start_listening(device_id) else {
            return Ok(None);
        };
        let message = RoomMessage::Listening {
            app_id,
            responder_name,
        };
        adapter.send_to(room.location.port, &room.location.address, message)?;
        Ok(Some(room))
    }

    /// Answers a help request. Nothing is sent to an unknown or
    /// disconnected emitter; returns whether a response went out.
    pub async fn respond_to_help(&self, device_id: &str) -> Result<bool> {
        let emitter = self.read(|registry| registry.listened_room(device_id).cloned());
        let emitter = match emitter {
            Some(emitter) if !emitter.disconnected => emitter,
            _ => return Ok(false),
        };
        let adapter = self.adapter()?;
        let message = RoomMessage::RespondToHelp {
            responder_name: self.current_name().await?,
        };
        adapter.send_to(emitter.location.port, &emitter.location.address, message)?;
        Ok(true)
    }

    /// Stops listening locally and tells the emitter. Returns whether the
    /// room was listened to.
    pub async fn delete_listening_to(&self, device_id: &str) -> Result<bool> {
        if self.read(|registry| registry.listened_room(device_id).is_none()) {
            return Ok(false);
        }
        let adapter = self.adapter()?;
        let app_id = self.repository()?.current_app_id().await?;

        let Some(listening_to) = self.update(|registry| registry.remove_listened(device_id))
        else {
            return Ok(false);
        };
        let message = RoomMessage::NotListening { app_id };
        adapter.send_to(listening_to.location.port, &listening_to.location.address, message)?;
        Ok(true)
    }

    pub async fn request_help(&self) -> Result<()> {
        self.adapter()?.request_help().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::on_advertise_response;
    use crate::mock::{MemoryRepository, RecordingAdapter};
    use chrono::Utc;
    use common::{NetworkLocation, StoredListener};

    fn advertise(store: &RoomStore, device_id: &str) {
        let location = NetworkLocation::new("10.0.0.5", 9000);
        store.update(|r| on_advertise_response(r, device_id.into(), location));
    }

    fn store_with(adapter: &Arc<RecordingAdapter>) -> RoomStore {
        let store = RoomStore::new();
        let conn_adapter: Arc<dyn ConnAdapter> = adapter.clone();
        store.update_connection_method(ConnMethod::Udp, Some(conn_adapter));
        store
    }

    #[tokio::test]
    async fn test_sync_database_seeds_snapshot() {
        let store = RoomStore::new();
        let repository = MemoryRepository::new("me", "Ana").with_listening_to(vec![StoredListener {
            app_id: "dev1".into(),
            name: "Room 4".to_string(),
            last_seen: Utc::now(),
        }]);
        store.sync_database(Arc::new(repository)).await.unwrap();

        let stored = store.get_stored_listeners();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Room 4");
        assert_eq!(store.app_id().await.unwrap().as_str(), "me");
    }

    #[tokio::test]
    async fn test_sync_database_twice_replaces_snapshot() {
        let store = RoomStore::new();
        let stored = vec![StoredListener {
            app_id: "dev1".into(),
            name: "Room 4".to_string(),
            last_seen: Utc::now(),
        }];
        let repository = Arc::new(MemoryRepository::new("me", "Ana").with_listening_to(stored));
        store.sync_database(repository.clone()).await.unwrap();
        store.sync_database(repository).await.unwrap();
        assert_eq!(store.get_stored_listeners().len(), 1);

        store.sync_database(Arc::new(MemoryRepository::new("me", "Ana"))).await.unwrap();
        assert!(store.get_stored_listeners().is_empty());
    }

    #[tokio::test]
    async fn test_failed_identity_lookup_keeps_discovery() {
        let adapter = Arc::new(RecordingAdapter::new());
        let store = store_with(&adapter);
        let repository = MemoryRepository::new("me", "Ana").unavailable();
        store.sync_database(Arc::new(repository)).await.unwrap();
        advertise(&store, "dev1");

        let err = store.add_to_listening_to("dev1").await.unwrap_err();
        assert!(matches!(err, RoomError::StorageError(_)));
        assert_eq!(store.get_discovered().len(), 1);
        assert!(store.get_listened_rooms().is_empty());
        assert!(adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_identity_lookup_keeps_listened_room() {
        let adapter = Arc::new(RecordingAdapter::new());
        let store = store_with(&adapter);
        let repository = MemoryRepository::new("me", "Ana").unavailable();
        store.sync_database(Arc::new(repository)).await.unwrap();
        advertise(&store, "dev1");
        store.start_listening("dev1");

        assert!(store.delete_listening_to("dev1").await.is_err());
        assert_eq!(store.get_listened_rooms().len(), 1);
        assert!(adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_identity_without_repository() {
        let store = RoomStore::new();
        let err = store.current_name().await.unwrap_err();
        assert!(matches!(err, RoomError::RepositoryNotSet));
    }

    #[tokio::test]
    async fn test_request_help_without_adapter() {
        let store = RoomStore::new();
        let err = store.request_help().await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_request_help_delegates_to_adapter() {
        let adapter = Arc::new(RecordingAdapter::new());
        let store = store_with(&adapter);
        store.request_help().await.unwrap();
        assert_eq!(adapter.help_requests(), 1);
    }

    #[test]
    fn test_connection_method_drives_status() {
        let adapter = Arc::new(RecordingAdapter::new());
        let store = store_with(&adapter);
        assert_eq!(store.status(), ServiceStatus::Up);
        assert_eq!(store.connection_method(), ConnMethod::Udp);

        store.update_connection_method(ConnMethod::None, None);
        assert_eq!(store.status(), ServiceStatus::Down);
        assert!(matches!(store.adapter(), Err(RoomError::AdapterNotSet)));
    }

    #[tokio::test]
    async fn test_delete_listening_to_notifies_emitter() {
        let adapter = Arc::new(RecordingAdapter::new());
        let store = store_with(&adapter);
        store.sync_database(Arc::new(MemoryRepository::new("me", "Ana"))).await.unwrap();
        advertise(&store, "dev1");
        store.start_listening("dev1");

        assert!(store.delete_listening_to("dev1").await.unwrap());
        assert!(store.get_listened_rooms().is_empty());
        assert_eq!(
            adapter.sent(),
            vec![(
                NetworkLocation::new("10.0.0.5", 9000),
                RoomMessage::NotListening { app_id: "me".into() }
            )]
        );
        assert!(!store.delete_listening_to("dev1").await.unwrap());
    }

    #[test]
    fn test_current_device_roundtrip() {
        let store = RoomStore::new();
        assert!(store.current_device().is_none());
        store.set_current_device(Some("pixel".to_string()));
        assert_eq!(store.current_device().as_deref(), Some("pixel"));
    }
}

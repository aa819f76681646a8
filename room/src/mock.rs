//! In-memory collaborators for embedding the store without a network or
//! a disk, mostly useful in tests.

use async_trait::async_trait;
use common::{DeviceId, NetworkLocation, Result, RoomError, RoomMessage, StoredListener};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::adapter::{ConnAdapter, RoomRepository};

/// Records every outbound message instead of sending it.
#[derive(Default)]
pub struct RecordingAdapter {
    sent: Mutex<Vec<(NetworkLocation, RoomMessage)>>,
    discoveries: AtomicUsize,
    help_requests: AtomicUsize,
    broken: AtomicBool,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(NetworkLocation, RoomMessage)> {
        self.sent.lock().clone()
    }

    pub fn discoveries(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    pub fn help_requests(&self) -> usize {
        self.help_requests.load(Ordering::SeqCst)
    }

    /// Makes every later discovery broadcast fail.
    pub fn break_channel(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnAdapter for RecordingAdapter {
    fn send_to(&self, port: u16, address: &str, message: RoomMessage) -> Result<()> {
        self.sent
            .lock()
            .push((NetworkLocation::new(address, port), message));
        Ok(())
    }

    async fn send_discovery(&self) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(RoomError::NetworkError("broadcast channel closed".to_string()));
        }
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn request_help(&self) -> Result<()> {
        self.help_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemoryRepository {
    app_id: DeviceId,
    name: String,
    listening_to: Vec<StoredListener>,
    unavailable: bool,
}

impl MemoryRepository {
    pub fn new(app_id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
            listening_to: Vec::new(),
            unavailable: false,
        }
    }

    pub fn with_listening_to(mut self, listening_to: Vec<StoredListener>) -> Self {
        self.listening_to = listening_to;
        self
    }

    /// Makes the identity lookups fail with a storage error.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(RoomError::StorageError("repository unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RoomRepository for MemoryRepository {
    async fn current_app_id(&self) -> Result<DeviceId> {
        self.check()?;
        Ok(self.app_id.clone())
    }

    async fn current_name(&self) -> Result<String> {
        self.check()?;
        Ok(self.name.clone())
    }

    async fn listening_to(&self) -> Result<Vec<StoredListener>> {
        Ok(self.listening_to.clone())
    }
}

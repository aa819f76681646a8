use async_trait::async_trait;
use common::{DeviceId, Result, RoomError, StoredListener};
use log::info;
use parking_lot::RwLock;
use room::RoomRepository;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalData {
    app_id: DeviceId,
    name: String,
    #[serde(default)]
    listening_to: Vec<StoredListener>,
}

/// Identity and listening history kept in a single JSON file.
pub struct JsonRepository {
    path: PathBuf,
    data: RwLock<LocalData>,
}

impl JsonRepository {
    /// Opens the file, creating it with a fresh app id when missing. A
    /// given `name` replaces the stored one.
    pub async fn open(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existing = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(serde_json::from_slice::<LocalData>(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(RoomError::StorageError(e.to_string())),
        };

        let created = existing.is_none();
        let mut data = existing.unwrap_or_else(|| LocalData {
            app_id: DeviceId::generate(),
            name: "Unnamed room".to_string(),
            listening_to: Vec::new(),
        });
        let renamed = match name {
            Some(name) if name != data.name => {
                data.name = name.to_string();
                true
            }
            _ => false,
        };

        let repository = Self {
            path,
            data: RwLock::new(data),
        };
        if created || renamed {
            repository.persist().await?;
        }
        if created {
            info!("Created local data at {}", repository.path.display());
        }
        Ok(repository)
    }

    async fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&*self.data.read())?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| RoomError::StorageError(e.to_string()))
    }
}

#[async_trait]
impl RoomRepository for JsonRepository {
    async fn current_app_id(&self) -> Result<DeviceId> {
        Ok(self.data.read().app_id.clone())
    }

    async fn current_name(&self) -> Result<String> {
        Ok(self.data.read().name.clone())
    }

    async fn listening_to(&self) -> Result<Vec<StoredListener>> {
        Ok(self.data.read().listening_to.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.json");

        let first = JsonRepository::open(&path, Some("Ana")).await.unwrap();
        let app_id = first.current_app_id().await.unwrap();
        assert!(path.exists());

        let second = JsonRepository::open(&path, None).await.unwrap();
        assert_eq!(second.current_app_id().await.unwrap(), app_id);
        assert_eq!(second.current_name().await.unwrap(), "Ana");
    }

    #[tokio::test]
    async fn test_reads_stored_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.json");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"appId":"me","name":"Ana","listeningTo":["#,
                r#"{"appId":"dev1","name":"Room 4","lastSeen":"2024-05-01T10:00:00Z"}]}"#,
            ),
        )
        .await
        .unwrap();

        let repository = JsonRepository::open(&path, None).await.unwrap();
        let stored = repository.listening_to().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Room 4");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.json");
        tokio::fs::write(&path, b"{nope").await.unwrap();

        let err = JsonRepository::open(&path, None).await.err().unwrap();
        assert!(matches!(err, RoomError::SerializationError(_)));
    }
}

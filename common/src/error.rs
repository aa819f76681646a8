use std::net::AddrParseError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RoomError>;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("No adapter set in room store")]
    AdapterNotSet,
    #[error("Repository not set in room store")]
    RepositoryNotSet,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RoomError {
    /// Missing collaborators halt the calling feature instead of being absorbed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AdapterNotSet | Self::RepositoryNotSet | Self::ConfigError(_)
        )
    }
}

impl From<std::io::Error> for RoomError {
    fn from(err: std::io::Error) -> Self {
        RoomError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        RoomError::SerializationError(err.to_string())
    }
}

impl From<AddrParseError> for RoomError {
    fn from(err: AddrParseError) -> Self {
        RoomError::NetworkError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_kind() {
        assert!(RoomError::AdapterNotSet.is_configuration());
        assert!(RoomError::RepositoryNotSet.is_configuration());
        assert!(!RoomError::NetworkError("down".to_string()).is_configuration());
    }

    #[test]
    fn test_io_error_maps_to_network() {
        let err: RoomError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, RoomError::NetworkError(_)));
    }
}

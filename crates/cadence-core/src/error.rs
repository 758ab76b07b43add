//! Unified error types for Cadence.

use thiserror::Error;

/// Result type alias using CadenceError.
pub type Result<T> = std::result::Result<T, CadenceError>;

#[derive(Error, Debug)]
pub enum CadenceError {
    // Scheduling input errors
    #[error("Invalid recurrence pattern: {0}")]
    InvalidRecurrence(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Backend errors
    #[error("Notification backend error: {0}")]
    Backend(String),

    // Persistence errors
    #[error("Registry persistence failed: {0}")]
    RegistryPersistence(String),

    #[error("Settings storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid notification settings: {0}")]
    InvalidSettings(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CadenceError {
    pub fn recurrence(msg: impl Into<String>) -> Self {
        Self::InvalidRecurrence(msg.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::RegistryPersistence(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CadenceError::RegistryPersistence("disk full".into());
        assert!(err.to_string().contains("disk full"));
        assert!(err.to_string().starts_with("Registry persistence failed"));
    }

    #[test]
    fn test_error_constructors() {
        let e1 = CadenceError::recurrence("weekday 9");
        assert!(matches!(e1, CadenceError::InvalidRecurrence(_)));

        let e2 = CadenceError::backend("offline");
        assert!(matches!(e2, CadenceError::Backend(_)));

        let e3 = CadenceError::registry("locked");
        assert!(matches!(e3, CadenceError::RegistryPersistence(_)));

        let e4 = CadenceError::settings("bad time");
        assert!(matches!(e4, CadenceError::InvalidSettings(_)));
    }

    #[test]
    fn test_every_variant_is_reachable() {
        let io: CadenceError = std::io::Error::other("gone").into();
        let json: CadenceError = serde_json::from_str::<u32>("x").unwrap_err().into();
        let all = [
            CadenceError::recurrence("a"),
            CadenceError::request("b"),
            CadenceError::backend("c"),
            CadenceError::registry("d"),
            CadenceError::storage("e"),
            CadenceError::settings("f"),
            CadenceError::config("g"),
            io,
            json,
        ];
        // Exhaustive: a new variant has to be added here along with its origin.
        for err in &all {
            let tag = match err {
                CadenceError::InvalidRecurrence(_) => "recurrence",
                CadenceError::InvalidRequest(_) => "request",
                CadenceError::Backend(_) => "backend",
                CadenceError::RegistryPersistence(_) => "registry",
                CadenceError::StorageUnavailable(_) => "storage",
                CadenceError::InvalidSettings(_) => "settings",
                CadenceError::Config(_) => "config",
                CadenceError::Io(_) => "io",
                CadenceError::Json(_) => "json",
            };
            assert!(!tag.is_empty() && !err.to_string().is_empty());
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CadenceError = io_err.into();
        assert!(matches!(err, CadenceError::Io(_)));
    }
}

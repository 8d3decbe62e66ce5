//! Error types for Tunesync core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Tunesync core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing keys, unreadable env file, bad paths).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Playlist id failed validation before any request was made.
    #[error("Invalid playlist id '{id}': {reason}")]
    InvalidPlaylistId {
        /// The offending playlist id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// OAuth token could not be loaded or refreshed.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Playlist retrieval from the metadata service failed.
    #[error("Failed to fetch playlist '{playlist_id}': {reason}")]
    PlaylistFetch {
        /// The playlist that was requested.
        playlist_id: String,
        /// Error message.
        reason: String,
    },

    /// The external download tool could not be located or started.
    #[error("Downloader unavailable: {0}")]
    DownloaderUnavailable(String),

    /// File system operation failed.
    #[error("File system error at {path}: {message}")]
    FileSystem {
        /// Path where the error occurred.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = Error::Configuration("missing PLAYLIST_ID".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing PLAYLIST_ID");
    }

    #[test]
    fn test_playlist_fetch_display() {
        let err = Error::PlaylistFetch {
            playlist_id: "PLabc".to_string(),
            reason: "HTTP 403".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to fetch playlist 'PLabc': HTTP 403");
    }

    #[test]
    fn test_file_system_error_display() {
        let err = Error::FileSystem {
            path: PathBuf::from("/music/folder"),
            message: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/music/folder"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

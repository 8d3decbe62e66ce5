//! Track data model shared by the playlist source, queue, and downloader.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One song entry within a playlist.
///
/// Immutable once fetched from the playlist source; the id is an opaque
/// string assigned by the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque video id.
    pub video_id: String,
    /// Display title.
    pub title: String,
}

impl Track {
    /// Create a new track.
    pub fn new(video_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
        }
    }

    /// The watch URL handed to the download tool.
    #[must_use]
    pub fn watch_url(&self) -> String {
        format!("https://music.youtube.com/watch?v={}", self.video_id)
    }

    /// The `[<id>]` tag embedded in downloaded filenames.
    ///
    /// The downloader's output template places the video id in square
    /// brackets, which is what the library scanner matches against.
    #[must_use]
    pub fn id_tag(&self) -> String {
        format!("[{}]", self.video_id)
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.title, self.video_id)
    }
}

/// Outcome of a single download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The track was downloaded and converted; `path` is the local MP3.
    Success {
        /// Local path of the written file.
        path: PathBuf,
    },
    /// The attempt failed. The message is the tool's stderr tail, carried
    /// for logging only; nothing branches on its content.
    Error {
        /// Opaque failure message.
        message: String,
    },
}

impl DownloadOutcome {
    /// Whether this outcome is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The written file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Success { path } => Some(path),
            Self::Error { .. } => None,
        }
    }
}

/// Result of one download attempt for one track.
///
/// Created once per attempt and only ever collected into lists.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// The track that was attempted.
    pub track: Track,
    /// What happened.
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    /// Create a success result.
    #[must_use]
    pub const fn success(track: Track, path: PathBuf) -> Self {
        Self {
            track,
            outcome: DownloadOutcome::Success { path },
        }
    }

    /// Create an error result.
    pub fn error(track: Track, message: impl Into<String>) -> Self {
        Self {
            track,
            outcome: DownloadOutcome::Error {
                message: message.into(),
            },
        }
    }

    /// Whether the attempt succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url() {
        let track = Track::new("dQw4w9WgXcQ", "Some Song");
        assert_eq!(
            track.watch_url(),
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_id_tag() {
        let track = Track::new("abc123", "Title");
        assert_eq!(track.id_tag(), "[abc123]");
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = DownloadOutcome::Success {
            path: PathBuf::from("/music/a.mp3"),
        };
        assert!(ok.is_success());
        assert_eq!(ok.path(), Some(std::path::Path::new("/music/a.mp3")));

        let err = DownloadOutcome::Error {
            message: "network".to_string(),
        };
        assert!(!err.is_success());
        assert_eq!(err.path(), None);
    }

    #[test]
    fn test_result_constructors() {
        let track = Track::new("id1", "Song");
        let ok = DownloadResult::success(track.clone(), PathBuf::from("/m/s.mp3"));
        assert!(ok.is_success());

        let failed = DownloadResult::error(track, "geo restricted");
        assert!(!failed.is_success());
    }

    #[test]
    fn test_track_serde_roundtrip() {
        let track = Track::new("xyz", "Name & Title");
        let json = serde_json::to_string(&track).expect("serialize");
        let back: Track = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(track, back);
    }
}

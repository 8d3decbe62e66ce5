//! Tunesync Core Library
//!
//! This crate provides the core functionality for the Tunesync tool:
//! - Run configuration loaded from an env file
//! - Playlist retrieval from YouTube Music (OAuth-backed)
//! - Local library scanning and download-queue construction
//! - Downloading/converting tracks through the external yt-dlp tool
//! - M3U playlist bookkeeping
//! - Sequential sync orchestration with a single conditional retry pass
//!
//! # Error Handling
//!
//! This crate uses a typed error enum with a `Result` alias. See the
//! [`error`] module for details.
//!
//! ```rust,ignore
//! use tunesync_core::{Error, Result};
//!
//! fn do_something() -> Result<()> {
//!     // Your code here
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod downloader;
pub mod error;
pub mod library;
pub mod m3u;
pub mod queue;
pub mod sync;
pub mod track;
pub mod ytmusic;

pub use config::Config;
pub use downloader::{
    DownloadProgress, ProgressCallback, TrackDownloader, YtDlpConfig, YtDlpDownloader,
    parse_progress_line,
};
pub use error::{Error, Result};
pub use library::{is_mp3_file, scan_music_folder};
pub use m3u::PlaylistFile;
pub use queue::build_queue;
pub use sync::{SyncEvent, SyncEventCallback, SyncOrchestrator, SyncPhase, SyncReport};
pub use track::{DownloadOutcome, DownloadResult, Track};
pub use ytmusic::{
    DEFAULT_TRACK_LIMIT, OAuthCredentials, PlaylistSource, StoredToken, YtMusicClient,
    validate_playlist_id,
};

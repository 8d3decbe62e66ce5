//! Sync orchestration: first download pass, single conditional retry pass,
//! playlist bookkeeping.
//!
//! The orchestrator walks the download queue strictly sequentially, appends
//! each successful download to the M3U file as it completes, then - only
//! when the first pass left failures AND a cookie file is configured -
//! re-attempts exactly the failed tracks once with cookies enabled.
//! Remaining failures are surfaced in the report, never retried again.

use std::sync::Arc;

use tracing::{error, info};

use crate::downloader::{DownloadProgress, ProgressCallback, TrackDownloader};
use crate::error::Result;
use crate::m3u::PlaylistFile;
use crate::track::{DownloadResult, Track};

/// Current pass of the sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Initial walk over the whole queue, without cookies.
    FirstPass,
    /// Single re-attempt of first-pass failures, with cookies.
    RetryPass,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstPass => write!(f, "first pass"),
            Self::RetryPass => write!(f, "retry pass"),
        }
    }
}

/// Progress events emitted while a sync run executes.
///
/// Purely presentational: consumers render them, nothing reads them back.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A pass over some set of tracks is starting.
    PhaseStarted {
        /// Which pass.
        phase: SyncPhase,
        /// Number of tracks in this pass.
        total_tracks: usize,
    },
    /// A track's download attempt is starting.
    TrackStarted {
        /// Zero-based index within the current pass.
        index: usize,
        /// Number of tracks in this pass.
        total: usize,
        /// The track being attempted.
        track: Track,
    },
    /// Byte-level progress for the track at `index`.
    TrackProgress {
        /// Zero-based index within the current pass.
        index: usize,
        /// Parsed transfer progress.
        progress: DownloadProgress,
    },
    /// A track's download attempt finished.
    TrackCompleted {
        /// Zero-based index within the current pass.
        index: usize,
        /// The attempted track.
        track: Track,
        /// Whether the attempt succeeded.
        success: bool,
    },
}

/// Callback receiving [`SyncEvent`]s.
pub type SyncEventCallback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Outcome of a full sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Size of the download queue the run started with.
    pub queued: usize,
    /// Successful downloads, in completion order (both passes).
    pub succeeded: Vec<DownloadResult>,
    /// Final failures after the retry pass (or after the first pass when
    /// the retry pass was skipped).
    pub failed: Vec<DownloadResult>,
    /// How many tracks the retry pass attempted (zero when skipped).
    pub retry_attempted: usize,
}

impl SyncReport {
    /// Whether every queued track ended up downloaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of one pass over a set of tracks.
struct PassOutcome {
    succeeded: Vec<DownloadResult>,
    failed: Vec<DownloadResult>,
}

/// Orchestrates the sequential download flow against a [`TrackDownloader`].
pub struct SyncOrchestrator<D> {
    downloader: D,
    playlist_file: PlaylistFile,
    on_event: Option<SyncEventCallback>,
}

impl<D: TrackDownloader> SyncOrchestrator<D> {
    /// Create an orchestrator writing successes to `playlist_file`.
    pub const fn new(downloader: D, playlist_file: PlaylistFile) -> Self {
        Self {
            downloader,
            playlist_file,
            on_event: None,
        }
    }

    /// Attach a progress event callback.
    #[must_use]
    pub fn with_event_callback(mut self, callback: SyncEventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    /// Run the full download flow over `queue`.
    ///
    /// `cookies_configured` gates the retry pass: without a cookie file the
    /// retry pass is skipped entirely and first-pass failures are final.
    ///
    /// # Errors
    ///
    /// Only playlist-file write failures abort the run; per-track download
    /// failures are collected, not propagated.
    pub fn run(&self, queue: &[Track], cookies_configured: bool) -> Result<SyncReport> {
        if queue.is_empty() {
            info!("No new songs to download");
            return Ok(SyncReport::default());
        }

        info!("Starting downloads (first attempt)");
        let first = self.run_pass(SyncPhase::FirstPass, queue, false)?;
        info!("First download attempt completed");

        let mut succeeded = first.succeeded;
        let mut failed = first.failed;
        let mut retry_attempted = 0;

        if !failed.is_empty() && cookies_configured {
            let retry_tracks: Vec<Track> = failed.iter().map(|r| r.track.clone()).collect();
            retry_attempted = retry_tracks.len();
            info!(
                "Retrying {} failed download(s) with cookies enabled",
                retry_attempted
            );

            let retry = self.run_pass(SyncPhase::RetryPass, &retry_tracks, true)?;
            succeeded.extend(retry.succeeded);
            failed = retry.failed;

            if failed.is_empty() {
                info!("All failed downloads succeeded on retry");
            } else {
                error!("After retry, {} download(s) still failed", failed.len());
            }
        } else if !failed.is_empty() {
            error!("Downloads failed for {} song(s)", failed.len());
        }

        Ok(SyncReport {
            queued: queue.len(),
            succeeded,
            failed,
            retry_attempted,
        })
    }

    /// Walk one pass over `tracks`, appending successes to the M3U file.
    fn run_pass(
        &self,
        phase: SyncPhase,
        tracks: &[Track],
        use_cookies: bool,
    ) -> Result<PassOutcome> {
        let total = tracks.len();
        self.emit(SyncEvent::PhaseStarted {
            phase,
            total_tracks: total,
        });

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (index, track) in tracks.iter().enumerate() {
            self.emit(SyncEvent::TrackStarted {
                index,
                total,
                track: track.clone(),
            });

            let progress: Option<ProgressCallback> = self.on_event.as_ref().map(|callback| {
                let callback = Arc::clone(callback);
                Box::new(move |progress: DownloadProgress| {
                    callback(SyncEvent::TrackProgress { index, progress });
                }) as ProgressCallback
            });

            let result = self.downloader.download(track, use_cookies, progress);

            if let Some(path) = result.outcome.path() {
                self.playlist_file.append(path)?;
                info!("Added '{}' to playlist", track.title);
            }

            self.emit(SyncEvent::TrackCompleted {
                index,
                track: track.clone(),
                success: result.is_success(),
            });

            if result.is_success() {
                succeeded.push(result);
            } else {
                failed.push(result);
            }
        }

        Ok(PassOutcome { succeeded, failed })
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }
}

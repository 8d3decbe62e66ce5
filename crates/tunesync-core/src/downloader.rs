//! Download/convert wrapper around the external yt-dlp tool.
//!
//! One invocation per track: yt-dlp fetches the audio stream, transcodes
//! to MP3 and embeds thumbnail/metadata through its post-processors. This
//! layer only classifies the attempt as success or error; it never retries
//! (the sync orchestrator owns the retry pass) and never aborts the run on
//! a per-track failure.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::track::{DownloadResult, Track};

/// Output template: title plus the bracketed id the library scanner keys on.
const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

/// How many trailing stderr lines are kept for the error message.
const STDERR_TAIL_LINES: usize = 30;

/// Byte-level progress of the current transfer, parsed from the tool's
/// `[download]` lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Percent complete (0.0 - 100.0).
    pub percent: f64,
    /// Bytes downloaded so far (derived from percent and total).
    pub downloaded_bytes: u64,
    /// Total bytes, when the tool reports a size.
    pub total_bytes: Option<u64>,
}

/// Progress callback for download operations.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync>;

/// Downloader trait for testability.
#[cfg_attr(test, mockall::automock)]
pub trait TrackDownloader: Send + Sync {
    /// Download one track into the music folder and report what happened.
    ///
    /// A failed attempt is a normal [`DownloadResult`], not an `Err`; the
    /// caller decides whether to retry.
    fn download(
        &self,
        track: &Track,
        use_cookies: bool,
        progress: Option<ProgressCallback>,
    ) -> DownloadResult;
}

impl<T: TrackDownloader + ?Sized> TrackDownloader for &T {
    fn download(
        &self,
        track: &Track,
        use_cookies: bool,
        progress: Option<ProgressCallback>,
    ) -> DownloadResult {
        (**self).download(track, use_cookies, progress)
    }
}

/// Configuration for the yt-dlp wrapper.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Explicit binary path. When `None` the binary is looked up on PATH.
    pub binary_path: Option<PathBuf>,
    /// Directory the MP3 files are written to.
    pub music_folder: PathBuf,
    /// Cookie file passed with `--cookies` when the retry pass asks for it.
    pub cookies_filepath: Option<PathBuf>,
    /// Audio bitrate for the MP3 post-processor (e.g. "320K").
    pub audio_quality: String,
    /// Whether to embed the thumbnail in the MP3.
    pub embed_thumbnail: bool,
    /// Whether to write metadata tags.
    pub add_metadata: bool,
}

impl YtDlpConfig {
    /// Derive the downloader configuration from the run configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary_path: config.ytdlp_path.clone(),
            music_folder: config.music_folderpath.clone(),
            cookies_filepath: config.cookies_filepath.clone(),
            audio_quality: "320K".to_string(),
            embed_thumbnail: true,
            add_metadata: true,
        }
    }
}

/// yt-dlp subprocess wrapper.
pub struct YtDlpDownloader {
    config: YtDlpConfig,
    binary: PathBuf,
}

impl YtDlpDownloader {
    /// Create a wrapper, resolving the yt-dlp binary up front so a missing
    /// tool fails the run before any download is attempted.
    ///
    /// # Errors
    ///
    /// Returns `Error::DownloaderUnavailable` if the binary cannot be found.
    pub fn new(config: YtDlpConfig) -> Result<Self> {
        let binary = match &config.binary_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(Error::DownloaderUnavailable(format!(
                        "Configured yt-dlp binary not found at {}",
                        path.display()
                    )));
                }
                path.clone()
            }
            None => which::which("yt-dlp").map_err(|e| {
                Error::DownloaderUnavailable(format!("yt-dlp not found on PATH: {e}"))
            })?,
        };

        info!("Using downloader binary {}", binary.display());
        Ok(Self { config, binary })
    }

    /// Build the argument list for one track.
    fn build_args(&self, track: &Track, use_cookies: bool) -> Vec<OsString> {
        let output = self.config.music_folder.join(OUTPUT_TEMPLATE);

        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--format".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            self.config.audio_quality.clone().into(),
            "-o".into(),
            output.into_os_string(),
        ];
        if self.config.embed_thumbnail {
            args.push("--embed-thumbnail".into());
        }
        if self.config.add_metadata {
            args.push("--add-metadata".into());
        }
        if use_cookies && let Some(cookies) = &self.config.cookies_filepath {
            args.push("--cookies".into());
            args.push(cookies.clone().into_os_string());
        }
        args.push(track.watch_url().into());
        args
    }

    /// Spawn the tool for one track and drive it to completion.
    ///
    /// Returns the written MP3 path on success, or an opaque message built
    /// from the stderr tail on failure.
    fn run_tool(
        &self,
        track: &Track,
        use_cookies: bool,
        progress: Option<&ProgressCallback>,
    ) -> std::result::Result<PathBuf, String> {
        let args = self.build_args(track, use_cookies);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to spawn {}: {e}", self.binary.display()))?;

        // Drain stderr on a helper thread so neither pipe can fill up and
        // stall the child; keep the tail for the error message.
        let stderr_tail = Arc::new(Mutex::new(VecDeque::<String>::new()));
        let stderr_thread = child.stderr.take().map(|stream| {
            let tail = Arc::clone(&stderr_tail);
            std::thread::spawn(move || {
                for line in BufReader::new(stream).lines().map_while(|l| l.ok()) {
                    debug!("yt-dlp stderr: {line}");
                    if let Ok(mut lines) = tail.lock() {
                        lines.push_back(line);
                        if lines.len() > STDERR_TAIL_LINES {
                            lines.pop_front();
                        }
                    }
                }
            })
        });

        if let Some(stream) = child.stdout.take() {
            for line in BufReader::new(stream).lines().map_while(|l| l.ok()) {
                debug!("yt-dlp stdout: {line}");
                if let Some(update) = parse_progress_line(&line)
                    && let Some(callback) = progress
                {
                    callback(update);
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| format!("Downloader process failed: {e}"));
        if let Some(handle) = stderr_thread {
            let _ = handle.join();
        }
        let status = status?;

        if status.success() {
            find_output_file(&self.config.music_folder, track).ok_or_else(|| {
                "Downloader reported success but no output file was found".to_string()
            })
        } else {
            let tail = stderr_tail
                .lock()
                .map(|mut lines| lines.make_contiguous().join("\n"))
                .unwrap_or_default();
            Err(if tail.is_empty() {
                format!("Downloader exited with {status}")
            } else {
                tail
            })
        }
    }
}

impl TrackDownloader for YtDlpDownloader {
    fn download(
        &self,
        track: &Track,
        use_cookies: bool,
        progress: Option<ProgressCallback>,
    ) -> DownloadResult {
        info!("Downloading: {}", track.title);

        match self.run_tool(track, use_cookies, progress.as_ref()) {
            Ok(path) => {
                info!("Finished downloading: {}", track.title);
                DownloadResult::success(track.clone(), path)
            }
            Err(message) => {
                error!("Error downloading {}: {message}", track.watch_url());
                DownloadResult::error(track.clone(), message)
            }
        }
    }
}

static PROGRESS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+(?P<pct>\d+(?:\.\d+)?)%\s+of\s+~?\s*(?P<size>\d+(?:\.\d+)?)(?P<unit>[KMGT]?i?B)").ok()
});

/// Parse one `[download]` progress line into byte figures.
///
/// Lines that are not transfer progress (post-processing, destination
/// announcements, ...) yield `None`.
#[must_use]
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let re = PROGRESS_RE.as_ref()?;
    let caps = re.captures(line.trim_start())?;

    let percent: f64 = caps.name("pct")?.as_str().parse().ok()?;
    let size: f64 = caps.name("size")?.as_str().parse().ok()?;
    let total = size_to_bytes(size, caps.name("unit")?.as_str())?;

    Some(DownloadProgress {
        percent,
        downloaded_bytes: (total as f64 * percent / 100.0) as u64,
        total_bytes: Some(total),
    })
}

/// Convert a sized figure like `3.45` + `MiB` into bytes.
fn size_to_bytes(value: f64, unit: &str) -> Option<u64> {
    let factor: f64 = match unit {
        "B" => 1.0,
        "KiB" | "KB" => 1024.0,
        "MiB" | "MB" => 1024.0 * 1024.0,
        "GiB" | "GB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" | "TB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * factor) as u64)
}

/// Locate the MP3 the tool wrote for `track` by its id tag.
///
/// The title part of the template goes through the tool's own filename
/// sanitisation, so the bracketed id is the only reliable key.
fn find_output_file(music_folder: &Path, track: &Track) -> Option<PathBuf> {
    let tag = track.id_tag();
    let entries = std::fs::read_dir(music_folder).ok()?;
    for entry in entries.filter_map(std::result::Result::ok) {
        let path = entry.path();
        if path.is_file()
            && crate::library::is_mp3_file(&path)
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.contains(&tag))
        {
            return Some(path);
        }
    }
    warn!("No output file matching {tag} under {}", music_folder.display());
    None
}

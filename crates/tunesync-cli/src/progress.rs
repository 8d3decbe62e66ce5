//! Progress bars and log routing.
//!
//! Two nested indicators: an overall counter over the download queue and a
//! per-track byte bar fed by the downloader's progress lines. All tracing
//! output goes through the `MultiProgress` so log lines are printed above
//! the bars instead of tearing them.

use std::io;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;
use tunesync_core::{DownloadProgress, SyncEvent, SyncPhase};

/// Overall queue counter.
fn make_overall_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("Overall [{bar:40.green/white}] {pos}/{len} songs {msg}")
            .expect("progress template is valid")
            .progress_chars("━━╌"),
    );
    bar
}

/// Per-track byte bar.
fn make_track_bar(total_bytes: u64, title: &str) -> ProgressBar {
    let bar = ProgressBar::new(total_bytes);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} - {msg}",
        )
        .expect("progress template is valid")
        .progress_chars("━━╌"),
    );
    bar.set_message(title.to_string());
    bar
}

/// State of the track currently being downloaded.
#[derive(Default)]
struct CurrentTrack {
    title: String,
    bar: Option<ProgressBar>,
}

/// Renders [`SyncEvent`]s as nested progress bars.
pub struct ProgressReporter {
    multi: MultiProgress,
    overall: ProgressBar,
    current: Mutex<CurrentTrack>,
}

impl ProgressReporter {
    /// Create a reporter drawing into `multi`.
    #[must_use]
    pub fn new(multi: MultiProgress) -> Self {
        let overall = multi.add(make_overall_bar(0));
        Self {
            multi,
            overall,
            current: Mutex::new(CurrentTrack::default()),
        }
    }

    /// Render one event.
    pub fn handle(&self, event: SyncEvent) {
        match event {
            SyncEvent::PhaseStarted {
                phase,
                total_tracks,
            } => self.phase_started(phase, total_tracks),
            SyncEvent::TrackStarted { track, .. } => self.track_started(&track.title),
            SyncEvent::TrackProgress { progress, .. } => self.track_progress(progress),
            SyncEvent::TrackCompleted { .. } => self.track_completed(),
        }
    }

    /// Clear all bars at the end of the run.
    pub fn finish(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(bar) = current.bar.take()
        {
            bar.finish_and_clear();
        }
        self.overall.finish_and_clear();
        let _ = self.multi.clear();
    }

    fn phase_started(&self, phase: SyncPhase, total_tracks: usize) {
        self.overall.set_length(total_tracks as u64);
        self.overall.set_position(0);
        self.overall.set_message(match phase {
            SyncPhase::FirstPass => "",
            SyncPhase::RetryPass => "(retrying with cookies)",
        });
    }

    fn track_started(&self, title: &str) {
        if let Ok(mut current) = self.current.lock() {
            // A leftover bar means the previous completion event was lost;
            // clear it rather than stacking bars.
            if let Some(bar) = current.bar.take() {
                bar.finish_and_clear();
            }
            current.title = title.to_string();
        }
    }

    fn track_progress(&self, progress: DownloadProgress) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };

        if current.bar.is_none() {
            let total = progress.total_bytes.unwrap_or(0);
            let bar = self
                .multi
                .insert_before(&self.overall, make_track_bar(total, &current.title));
            current.bar = Some(bar);
        }

        if let Some(bar) = &current.bar {
            if let Some(total) = progress.total_bytes {
                bar.set_length(total);
            }
            bar.set_position(progress.downloaded_bytes);
        }
    }

    fn track_completed(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(bar) = current.bar.take()
        {
            bar.finish_and_clear();
        }
        self.overall.inc(1);
    }
}

/// `MakeWriter` that prints complete log lines through the
/// `MultiProgress`, so the bars are suspended and redrawn around them.
#[derive(Clone)]
pub struct ProgressLogWriter {
    multi: MultiProgress,
}

impl ProgressLogWriter {
    /// Create a writer factory bound to `multi`.
    #[must_use]
    pub const fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl<'a> MakeWriter<'a> for ProgressLogWriter {
    type Writer = LineBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        LineBuffer {
            multi: self.multi.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers written bytes and emits them line-wise on flush/drop.
pub struct LineBuffer {
    multi: MultiProgress,
    buf: Vec<u8>,
}

impl io::Write for LineBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        for line in text.lines().filter(|line| !line.is_empty()) {
            self.multi.println(line)?;
        }
        self.buf.clear();
        Ok(())
    }
}

impl Drop for LineBuffer {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use std::io::Write;
    use tunesync_core::Track;

    fn hidden_multi() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn test_line_buffer_flushes_lines() {
        let mut buffer = LineBuffer {
            multi: hidden_multi(),
            buf: Vec::new(),
        };
        buffer.write_all(b"line one\nline two\n").expect("write");
        buffer.flush().expect("flush");
        assert!(buffer.buf.is_empty());
    }

    #[test]
    fn test_reporter_full_track_lifecycle() {
        let reporter = ProgressReporter::new(hidden_multi());

        reporter.handle(SyncEvent::PhaseStarted {
            phase: SyncPhase::FirstPass,
            total_tracks: 2,
        });
        reporter.handle(SyncEvent::TrackStarted {
            index: 0,
            total: 2,
            track: Track::new("a1", "Song A"),
        });
        reporter.handle(SyncEvent::TrackProgress {
            index: 0,
            progress: DownloadProgress {
                percent: 50.0,
                downloaded_bytes: 512,
                total_bytes: Some(1024),
            },
        });
        reporter.handle(SyncEvent::TrackCompleted {
            index: 0,
            track: Track::new("a1", "Song A"),
            success: true,
        });

        assert_eq!(reporter.overall.position(), 1);
        reporter.finish();
    }

    #[test]
    fn test_reporter_retry_phase_resets_counter() {
        let reporter = ProgressReporter::new(hidden_multi());

        reporter.handle(SyncEvent::PhaseStarted {
            phase: SyncPhase::FirstPass,
            total_tracks: 3,
        });
        for index in 0..3 {
            reporter.handle(SyncEvent::TrackCompleted {
                index,
                track: Track::new("x", "X"),
                success: false,
            });
        }
        assert_eq!(reporter.overall.position(), 3);

        reporter.handle(SyncEvent::PhaseStarted {
            phase: SyncPhase::RetryPass,
            total_tracks: 3,
        });
        assert_eq!(reporter.overall.position(), 0);
        assert_eq!(reporter.overall.length(), Some(3));
        reporter.finish();
    }

    #[test]
    fn test_progress_without_started_event_is_harmless() {
        let reporter = ProgressReporter::new(hidden_multi());
        reporter.handle(SyncEvent::TrackProgress {
            index: 0,
            progress: DownloadProgress {
                percent: 10.0,
                downloaded_bytes: 100,
                total_bytes: None,
            },
        });
        reporter.finish();
    }
}

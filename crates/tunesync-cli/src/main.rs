//! tunesync CLI - download new songs from a YouTube Music playlist into a
//! local MP3 library and keep an M3U playlist file up to date.

mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::style;
use indicatif::MultiProgress;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tunesync_core::{
    Config, DEFAULT_TRACK_LIMIT, OAuthCredentials, PlaylistFile, PlaylistSource, Result,
    SyncEventCallback, SyncOrchestrator, SyncReport, YtDlpConfig, YtDlpDownloader, YtMusicClient,
    build_queue, scan_music_folder,
};

use crate::progress::{ProgressLogWriter, ProgressReporter};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Download new songs from a YouTube Music playlist.
#[derive(Debug, Parser)]
#[command(name = "tunesync", version, about)]
struct Cli {
    /// Path to the environment file to load.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let multi = MultiProgress::new();
    init_logging(&multi);

    match run(&cli, &multi) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            error!("Exiting due to startup error");
            ExitCode::FAILURE
        }
    }
}

/// Route all log output through the progress display.
fn init_logging(multi: &MultiProgress) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(ProgressLogWriter::new(multi.clone()))
        .init();
}

/// The full pipeline: configuration, playlist fetch, scan, queue,
/// sequential downloads with a single conditional retry pass.
fn run(cli: &Cli, multi: &MultiProgress) -> Result<SyncReport> {
    let config = Config::load(&cli.env_file)?;

    let client = YtMusicClient::new(
        &config.oauth_filepath,
        OAuthCredentials {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        },
    )?;
    let tracks = client.fetch_playlist(&config.playlist_id, DEFAULT_TRACK_LIMIT)?;

    let downloaded = scan_music_folder(&config.music_folderpath)?;
    let queue = build_queue(&tracks, &downloaded);

    if queue.is_empty() {
        info!("No new songs to download. Exiting.");
        return Ok(SyncReport::default());
    }

    let downloader = YtDlpDownloader::new(YtDlpConfig::from_config(&config))?;

    let reporter = Arc::new(ProgressReporter::new(multi.clone()));
    let callback: SyncEventCallback = {
        let reporter = Arc::clone(&reporter);
        Arc::new(move |event| reporter.handle(event))
    };

    let orchestrator =
        SyncOrchestrator::new(downloader, PlaylistFile::new(&config.playlist_filepath))
            .with_event_callback(callback);
    let report = orchestrator.run(&queue, config.has_cookies())?;

    reporter.finish();
    info!("All downloads completed.");
    Ok(report)
}

/// End-of-run summary, after the bars have been cleared.
fn print_summary(report: &SyncReport) {
    if report.queued == 0 {
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Sync Summary");
    println!("{SEPARATOR}");
    println!("  Songs queued:     {}", report.queued);
    println!("  Downloaded:       {}", report.succeeded.len());
    if report.retry_attempted > 0 {
        println!("  Retried:          {}", report.retry_attempted);
    }

    if report.failed.is_empty() {
        println!("  {}", style("All queued songs downloaded.").green());
    } else {
        println!("  Failed:           {}", report.failed.len());
        for failure in &report.failed {
            println!("    {} {}", style("x").red(), failure.track);
        }
    }
    println!("{SEPARATOR}");
}

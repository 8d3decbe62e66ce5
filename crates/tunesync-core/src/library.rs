//! Local library scanning.
//!
//! The music folder is the source of truth for what has already been
//! downloaded: the scanner lists MP3 file names and the queue builder
//! matches id tags against them. No tag reading, no fuzzy matching.

use std::path::Path;

use tracing::info;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Check whether a path looks like an MP3 file by extension.
#[must_use]
pub fn is_mp3_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}

/// List the MP3 file names directly inside `music_folder`.
///
/// Subdirectories are not descended into; names are returned sorted so
/// the scan is deterministic.
///
/// # Errors
///
/// Returns a file system error if the folder cannot be read.
pub fn scan_music_folder(music_folder: &Path) -> Result<Vec<String>> {
    info!("Scanning {} for downloaded songs", music_folder.display());

    if !music_folder.is_dir() {
        return Err(Error::FileSystem {
            path: music_folder.to_path_buf(),
            message: "Not a directory".to_string(),
        });
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(music_folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::FileSystem {
            path: music_folder.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if path.is_file()
            && is_mp3_file(path)
            && let Some(name) = path.file_name().and_then(|n| n.to_str())
        {
            names.push(name.to_string());
        }
    }

    names.sort();
    info!("Found {} downloaded song(s)", names.len());
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_mp3_file() {
        assert!(is_mp3_file(Path::new("song [abc].mp3")));
        assert!(is_mp3_file(Path::new("SONG.MP3")));
        assert!(!is_mp3_file(Path::new("song.m4a")));
        assert!(!is_mp3_file(Path::new("mp3")));
    }

    #[test]
    fn test_scan_lists_only_top_level_mp3s() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("a [id1].mp3"), b"x").expect("write");
        fs::write(dir.path().join("b [id2].mp3"), b"x").expect("write");
        fs::write(dir.path().join("cover.jpg"), b"x").expect("write");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("nested/c [id3].mp3"), b"x").expect("write");

        let names = scan_music_folder(dir.path()).expect("scan");
        assert_eq!(names, vec!["a [id1].mp3", "b [id2].mp3"]);
    }

    #[test]
    fn test_scan_empty_folder() {
        let dir = TempDir::new().expect("temp dir");
        let names = scan_music_folder(dir.path()).expect("scan");
        assert!(names.is_empty());
    }

    #[test]
    fn test_scan_missing_folder_is_error() {
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("does-not-exist");
        assert!(scan_music_folder(&missing).is_err());
    }
}

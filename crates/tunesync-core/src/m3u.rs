//! M3U playlist file updates.
//!
//! The playlist file is plain text, one local path per line, and is only
//! ever appended to within a run. There is no dedup check: a complete
//! library produces an empty queue, so nothing is appended twice in
//! practice.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Append-only handle on the M3U playlist file.
#[derive(Debug, Clone)]
pub struct PlaylistFile {
    path: PathBuf,
}

impl PlaylistFile {
    /// Create a handle for the playlist file at `path`.
    ///
    /// The file itself is created lazily on the first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the playlist file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry (a local file path) as a single line.
    ///
    /// The file is opened for append on every call and flushed before
    /// returning, so each completed download lands on disk immediately.
    ///
    /// # Errors
    ///
    /// Returns a file system error if the file cannot be opened or written.
    pub fn append(&self, entry: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::FileSystem {
                path: self.path.clone(),
                message: format!("Failed to open playlist file: {e}"),
            })?;

        writeln!(file, "{}", entry.display()).map_err(|e| Error::FileSystem {
            path: self.path.clone(),
            message: format!("Failed to append playlist entry: {e}"),
        })?;
        file.flush().map_err(|e| Error::FileSystem {
            path: self.path.clone(),
            message: format!("Failed to flush playlist file: {e}"),
        })?;

        debug!("Appended {} to {}", entry.display(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_append_creates_file_and_adds_lines_in_order() {
        let dir = TempDir::new().expect("temp dir");
        let m3u = PlaylistFile::new(dir.path().join("liked.m3u"));

        m3u.append(Path::new("/music/a [a1].mp3")).expect("append");
        m3u.append(Path::new("/music/b [b2].mp3")).expect("append");

        let content = fs::read_to_string(m3u.path()).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["/music/a [a1].mp3", "/music/b [b2].mp3"]);
    }

    #[test]
    fn test_append_preserves_existing_lines() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("liked.m3u");
        fs::write(&path, "/music/old [o1].mp3\n").expect("seed");

        let m3u = PlaylistFile::new(&path);
        m3u.append(Path::new("/music/new [n1].mp3")).expect("append");

        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(
            content.lines().collect::<Vec<_>>(),
            vec!["/music/old [o1].mp3", "/music/new [n1].mp3"]
        );
    }

    #[test]
    fn test_line_count_grows_by_exactly_one_per_append() {
        let dir = TempDir::new().expect("temp dir");
        let m3u = PlaylistFile::new(dir.path().join("liked.m3u"));

        for i in 0..5 {
            m3u.append(&dir.path().join(format!("t{i}.mp3")))
                .expect("append");
        }

        let content = fs::read_to_string(m3u.path()).expect("read");
        assert_eq!(content.lines().count(), 5);
    }

    #[test]
    fn test_append_to_unwritable_location_is_error() {
        let m3u = PlaylistFile::new("/nonexistent-root-dir/liked.m3u");
        assert!(m3u.append(Path::new("/music/x.mp3")).is_err());
    }
}

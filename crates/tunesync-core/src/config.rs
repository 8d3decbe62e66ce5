//! Run configuration loaded from an env file.
//!
//! Settings are read from the process environment after loading the env
//! file, so values already exported by the caller take effect too. All
//! required keys are validated up front and reported together.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Required key: OAuth client id for the metadata service.
pub const KEY_CLIENT_ID: &str = "OAUTH2_CLIENT_ID";
/// Required key: OAuth client secret for the metadata service.
pub const KEY_CLIENT_SECRET: &str = "OAUTH2_CLIENT_SECRET";
/// Required key: path of the stored OAuth token file.
pub const KEY_OAUTH_FILEPATH: &str = "OAUTH2_FILEPATH";
/// Optional key: path of a Netscape cookie file used by the retry pass.
pub const KEY_COOKIES_FILEPATH: &str = "COOKIES_FILEPATH";
/// Required key: directory the MP3 files are written to.
pub const KEY_MUSIC_FOLDERPATH: &str = "MUSIC_FOLDERPATH";
/// Required key: path of the M3U playlist file.
pub const KEY_PLAYLIST_FILEPATH: &str = "PLAYLIST_FILEPATH";
/// Required key: id of the playlist to sync.
pub const KEY_PLAYLIST_ID: &str = "PLAYLIST_ID";
/// Optional key: explicit path of the yt-dlp binary.
pub const KEY_YTDLP_PATH: &str = "YTDLP_PATH";

/// Immutable run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Stored OAuth token file.
    pub oauth_filepath: PathBuf,
    /// Cookie file for the retry pass, if configured.
    pub cookies_filepath: Option<PathBuf>,
    /// Directory MP3 files are written to.
    pub music_folderpath: PathBuf,
    /// M3U playlist file.
    pub playlist_filepath: PathBuf,
    /// Playlist to sync.
    pub playlist_id: String,
    /// Explicit yt-dlp binary path, if configured.
    pub ytdlp_path: Option<PathBuf>,
}

impl Config {
    /// Load the env file at `env_file` (if present) and build the
    /// configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` naming every missing required key,
    /// or a file system error if the music folder cannot be created.
    pub fn load(env_file: &Path) -> Result<Self> {
        if env_file.exists() {
            dotenvy::from_path(env_file).map_err(|e| {
                Error::Configuration(format!(
                    "Failed to load env file {}: {e}",
                    env_file.display()
                ))
            })?;
            info!("Loaded environment from {}", env_file.display());
        } else {
            debug!(
                "Env file {} not found, using process environment only",
                env_file.display()
            );
        }

        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.ensure_music_folder()?;
        Ok(config)
    }

    /// Build the configuration from a key lookup function.
    ///
    /// Split out from [`Config::load`] so validation can be tested without
    /// touching the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` naming every missing required key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = [
            KEY_CLIENT_ID,
            KEY_CLIENT_SECRET,
            KEY_OAUTH_FILEPATH,
            KEY_MUSIC_FOLDERPATH,
            KEY_PLAYLIST_FILEPATH,
            KEY_PLAYLIST_ID,
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|key| lookup(key).is_none_or(|v| v.trim().is_empty()))
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "Missing environment variables: {}",
                missing.join(", ")
            )));
        }

        let get = |key: &str| -> String {
            // Presence was just validated above.
            lookup(key).unwrap_or_default()
        };
        let get_optional =
            |key: &str| -> Option<String> { lookup(key).filter(|v| !v.trim().is_empty()) };

        Ok(Self {
            client_id: get(KEY_CLIENT_ID),
            client_secret: get(KEY_CLIENT_SECRET),
            oauth_filepath: PathBuf::from(get(KEY_OAUTH_FILEPATH)),
            cookies_filepath: get_optional(KEY_COOKIES_FILEPATH).map(PathBuf::from),
            music_folderpath: PathBuf::from(get(KEY_MUSIC_FOLDERPATH)),
            playlist_filepath: PathBuf::from(get(KEY_PLAYLIST_FILEPATH)),
            playlist_id: get(KEY_PLAYLIST_ID),
            ytdlp_path: get_optional(KEY_YTDLP_PATH).map(PathBuf::from),
        })
    }

    /// Whether a cookie file is configured for the retry pass.
    #[must_use]
    pub const fn has_cookies(&self) -> bool {
        self.cookies_filepath.is_some()
    }

    /// Create the music folder if it does not exist yet.
    fn ensure_music_folder(&self) -> Result<()> {
        if !self.music_folderpath.exists() {
            fs::create_dir_all(&self.music_folderpath).map_err(|e| Error::FileSystem {
                path: self.music_folderpath.clone(),
                message: format!("Failed to create music folder: {e}"),
            })?;
            info!("Created music folder {}", self.music_folderpath.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (KEY_CLIENT_ID, "client-id"),
            (KEY_CLIENT_SECRET, "client-secret"),
            (KEY_OAUTH_FILEPATH, "/tmp/oauth.json"),
            (KEY_MUSIC_FOLDERPATH, "/srv/music"),
            (KEY_PLAYLIST_FILEPATH, "/srv/music/liked.m3u"),
            (KEY_PLAYLIST_ID, "PLtest123"),
        ])
    }

    fn lookup_in<'a>(vars: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        |key| vars.get(key).map(ToString::to_string)
    }

    #[test]
    fn test_all_required_keys_present() {
        let vars = full_vars();
        let config = Config::from_lookup(lookup_in(&vars)).expect("valid config");
        assert_eq!(config.playlist_id, "PLtest123");
        assert_eq!(config.music_folderpath, PathBuf::from("/srv/music"));
        assert!(config.cookies_filepath.is_none());
        assert!(!config.has_cookies());
    }

    #[test]
    fn test_missing_keys_all_named() {
        let mut vars = full_vars();
        vars.remove(KEY_CLIENT_ID);
        vars.remove(KEY_PLAYLIST_ID);

        let err = Config::from_lookup(lookup_in(&vars)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(KEY_CLIENT_ID));
        assert!(msg.contains(KEY_PLAYLIST_ID));
        assert!(!msg.contains(KEY_CLIENT_SECRET));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = full_vars();
        vars.insert(KEY_PLAYLIST_ID, "   ");

        let err = Config::from_lookup(lookup_in(&vars)).unwrap_err();
        assert!(err.to_string().contains(KEY_PLAYLIST_ID));
    }

    #[test]
    fn test_optional_cookies_picked_up() {
        let mut vars = full_vars();
        vars.insert(KEY_COOKIES_FILEPATH, "/tmp/cookies.txt");

        let config = Config::from_lookup(lookup_in(&vars)).expect("valid config");
        assert_eq!(
            config.cookies_filepath,
            Some(PathBuf::from("/tmp/cookies.txt"))
        );
        assert!(config.has_cookies());
    }

    #[test]
    fn test_blank_optional_treated_as_absent() {
        let mut vars = full_vars();
        vars.insert(KEY_COOKIES_FILEPATH, "");

        let config = Config::from_lookup(lookup_in(&vars)).expect("valid config");
        assert!(config.cookies_filepath.is_none());
    }

    #[test]
    fn test_ytdlp_path_override() {
        let mut vars = full_vars();
        vars.insert(KEY_YTDLP_PATH, "/opt/bin/yt-dlp");

        let config = Config::from_lookup(lookup_in(&vars)).expect("valid config");
        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/opt/bin/yt-dlp")));
    }
}

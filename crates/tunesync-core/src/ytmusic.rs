//! YouTube Music playlist retrieval.
//!
//! Wraps the metadata service behind the [`PlaylistSource`] trait: given
//! credentials and a playlist id, produce the ordered track list. The real
//! client authenticates with a stored OAuth token (refreshing it through
//! the Google token endpoint when expired) and navigates the browse
//! response JSON to the playlist shelf, following continuations until the
//! track limit.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::track::Track;

/// Default cap on fetched tracks per playlist.
pub const DEFAULT_TRACK_LIMIT: usize = 5000;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const BROWSE_URL: &str = "https://music.youtube.com/youtubei/v1/browse?alt=json";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Seconds of leeway before the nominal expiry at which a token is
/// treated as expired.
const EXPIRY_LEEWAY_SECS: u64 = 60;

/// Source of playlist track lists, mockable for tests.
#[cfg_attr(test, mockall::automock)]
pub trait PlaylistSource: Send + Sync {
    /// Fetch the ordered track list of `playlist_id`, up to `limit` tracks.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal to the run: invalid id, authentication
    /// failure, or an unusable service response.
    fn fetch_playlist(&self, playlist_id: &str, limit: usize) -> Result<Vec<Track>>;
}

/// OAuth client credentials for the metadata service.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

/// Stored OAuth token, persisted as JSON next to the credentials it was
/// issued for and rewritten in place after each refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    /// Bearer token presented to the service.
    pub access_token: String,
    /// Long-lived token used to obtain fresh access tokens.
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which the access token expires.
    #[serde(default)]
    pub expires_at: u64,
    /// Token type, normally "Bearer".
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Granted scope, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredToken {
    /// Whether the access token is expired (with leeway) at `now`.
    #[must_use]
    pub const fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now + EXPIRY_LEEWAY_SECS
    }

    /// Fold a refresh response into this token at time `now`.
    fn apply_refresh(&mut self, refreshed: TokenResponse, now: u64) {
        self.access_token = refreshed.access_token;
        self.expires_at = now + refreshed.expires_in;
        if let Some(token_type) = refreshed.token_type {
            self.token_type = token_type;
        }
    }
}

/// Body of a successful token-endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    token_type: Option<String>,
}

/// Validate a playlist id before any request is made.
///
/// Ids are opaque, so this only rejects values that cannot possibly be
/// valid: empty/too short, overlong, or containing characters outside the
/// service's id alphabet.
pub fn validate_playlist_id(id: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::InvalidPlaylistId {
            id: id.to_string(),
            reason: reason.to_string(),
        })
    };

    if id.len() < 2 {
        return reject("too short");
    }
    if id.len() > 64 {
        return reject("too long");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return reject("contains invalid characters");
    }
    Ok(())
}

/// Real client for the YouTube Music browse API.
pub struct YtMusicClient {
    http: reqwest::blocking::Client,
    credentials: OAuthCredentials,
    token_path: PathBuf,
    token: Mutex<StoredToken>,
}

impl YtMusicClient {
    /// Create a client, loading the stored token from `token_path`.
    ///
    /// # Errors
    ///
    /// Returns an OAuth error if the token file is missing or malformed.
    pub fn new(token_path: &Path, credentials: OAuthCredentials) -> Result<Self> {
        info!("Initializing YouTube Music API client");

        let content = std::fs::read_to_string(token_path).map_err(|e| {
            Error::OAuth(format!(
                "Failed to read OAuth token file {}: {e}",
                token_path.display()
            ))
        })?;
        let token: StoredToken = serde_json::from_str(&content).map_err(|e| {
            Error::OAuth(format!(
                "Malformed OAuth token file {}: {e}",
                token_path.display()
            ))
        })?;

        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            credentials,
            token_path: token_path.to_path_buf(),
            token: Mutex::new(token),
        })
    }

    /// Current bearer token, refreshed and persisted first if expired.
    fn bearer_token(&self) -> Result<String> {
        let mut token = self
            .token
            .lock()
            .map_err(|_| Error::OAuth("Token state poisoned".to_string()))?;

        let now = unix_now();
        if token.is_expired(now) {
            info!("Access token expired, refreshing");
            let refreshed = self.request_refresh(&token.refresh_token)?;
            token.apply_refresh(refreshed, now);
            self.persist_token(&token)?;
        }

        Ok(token.access_token.clone())
    }

    /// Exchange the refresh token for a fresh access token.
    fn request_refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .map_err(|e| Error::OAuth(format!("Token refresh request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::OAuth(format!(
                "Token refresh rejected with HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .map_err(|e| Error::OAuth(format!("Malformed token response: {e}")))
    }

    /// Rewrite the token file after a refresh.
    fn persist_token(&self, token: &StoredToken) -> Result<()> {
        let content = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.token_path, content).map_err(|e| Error::OAuth(format!(
            "Failed to persist refreshed token to {}: {e}",
            self.token_path.display()
        )))?;
        debug!("Persisted refreshed token to {}", self.token_path.display());
        Ok(())
    }

    /// One browse request; `continuation` selects the follow-up page.
    fn browse(&self, browse_id: &str, continuation: Option<&str>) -> Result<Value> {
        let bearer = self.bearer_token()?;

        let url = continuation.map_or_else(
            || BROWSE_URL.to_string(),
            |token| format!("{BROWSE_URL}&ctoken={token}&continuation={token}&type=next"),
        );

        let mut body = json!({
            "context": {
                "client": {
                    "clientName": "WEB_REMIX",
                    "clientVersion": "1.20250101.01.00",
                    "hl": "en",
                }
            }
        });
        if continuation.is_none()
            && let Some(map) = body.as_object_mut()
        {
            map.insert("browseId".to_string(), Value::String(browse_id.to_string()));
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            return Err(Error::PlaylistFetch {
                playlist_id: browse_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        Ok(response.json()?)
    }
}

impl PlaylistSource for YtMusicClient {
    fn fetch_playlist(&self, playlist_id: &str, limit: usize) -> Result<Vec<Track>> {
        validate_playlist_id(playlist_id)?;

        info!("Retrieving playlist '{playlist_id}' from YouTube Music");

        let browse_id = format!("VL{playlist_id}");
        let mut tracks: Vec<Track> = Vec::new();
        let mut page = self.browse(&browse_id, None)?;
        let mut first_page = true;

        loop {
            let shelf_key = if first_page {
                "musicPlaylistShelfRenderer"
            } else {
                "musicPlaylistShelfContinuation"
            };

            let next_token = {
                let Some(shelf) = find_key(&page, shelf_key) else {
                    if first_page {
                        return Err(Error::PlaylistFetch {
                            playlist_id: playlist_id.to_string(),
                            reason: "No playlist shelf in service response".to_string(),
                        });
                    }
                    break;
                };
                collect_shelf_tracks(shelf, &mut tracks, limit);
                continuation_token(shelf)
            };

            match next_token {
                Some(token) if tracks.len() < limit => {
                    debug!("Following playlist continuation ({} tracks so far)", tracks.len());
                    page = self.browse(&browse_id, Some(&token))?;
                    first_page = false;
                }
                _ => break,
            }
        }

        info!("Retrieved {} songs from playlist", tracks.len());
        Ok(tracks)
    }
}

/// Unix time in seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Depth-first search for the first value under `key` anywhere in the
/// response. The service moves the playlist shelf around between client
/// versions, so exact navigation paths are not reliable.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return Some(found);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// Append the shelf's items to `tracks`, stopping at `limit`.
fn collect_shelf_tracks(shelf: &Value, tracks: &mut Vec<Track>, limit: usize) {
    let Some(items) = shelf.get("contents").and_then(Value::as_array) else {
        return;
    };
    for item in items {
        if tracks.len() >= limit {
            return;
        }
        if let Some(track) = parse_shelf_item(item) {
            tracks.push(track);
        }
    }
}

/// Parse one shelf item into a [`Track`].
///
/// Items without a video id (removed or unavailable entries) are dropped
/// with a warning; a missing title degrades to a placeholder.
fn parse_shelf_item(item: &Value) -> Option<Track> {
    let renderer = item.get("musicResponsiveListItemRenderer")?;

    let title = renderer
        .get("flexColumns")
        .and_then(Value::as_array)
        .and_then(|cols| cols.first())
        .and_then(|col| col.get("musicResponsiveListItemFlexColumnRenderer"))
        .and_then(|col| col.get("text"))
        .and_then(|text| text.get("runs"))
        .and_then(Value::as_array)
        .and_then(|runs| runs.first())
        .and_then(|run| run.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown Title");

    let Some(video_id) = renderer
        .get("playlistItemData")
        .and_then(|data| data.get("videoId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    else {
        warn!("Skipping track '{title}' (missing video ID)");
        return None;
    };

    Some(Track::new(video_id, title))
}

/// Extract the shelf's continuation token, if it has one.
fn continuation_token(shelf: &Value) -> Option<String> {
    shelf
        .get("continuations")
        .and_then(Value::as_array)
        .and_then(|conts| conts.first())
        .and_then(|cont| cont.get("nextContinuationData"))
        .and_then(|data| data.get("continuation"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

//! Configuration management for the now-playing service.
//!
//! Values come from environment variables, optionally seeded from a `.env`
//! file in the local data directory. Everything except the client
//! credentials has a default suitable for a local single-user setup.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults

use std::{env, path::PathBuf, time::Duration};

use reqwest::Client;
use serde::Serialize;

use crate::{Res, error::Error, types::Credentials};

const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:3000/auth/callback";
const DEFAULT_SCOPE: &str = "user-read-currently-playing user-read-playback-state";
const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:3000";

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Looks for the file in:
/// - Linux: `~/.local/share/nowplaying/.env`
/// - macOS: `~/Library/Application Support/nowplaying/.env`
/// - Windows: `%LOCALAPPDATA%/nowplaying/.env`
///
/// The parent directory is created if needed. Variables already present in
/// the process environment are not overridden.
///
/// # Errors
///
/// Returns an error string if the directory cannot be created or the file is
/// missing or unparsable. Callers treat this as a warning since every value
/// can also come from the process environment.
pub async fn load_env() -> Result<PathBuf, String> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("nowplaying/.env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    dotenv::from_path(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(path)
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_string())
}

fn flag(key: &str, default: bool) -> bool {
    match var(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn number(key: &str, default: u64) -> u64 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Returns the client credentials registered with Spotify.
///
/// Reads `SPOTIFY_API_AUTH_CLIENT_ID` and `SPOTIFY_API_AUTH_CLIENT_SECRET`.
/// Returns `None` when either is unset or empty.
pub fn spotify_credentials() -> Option<Credentials> {
    Some(Credentials::new(
        var("SPOTIFY_API_AUTH_CLIENT_ID")?,
        var("SPOTIFY_API_AUTH_CLIENT_SECRET")?,
    ))
}

/// Like [`spotify_credentials`], but a missing value is a configuration error.
pub fn require_credentials() -> Res<Credentials> {
    spotify_credentials().ok_or_else(|| {
        Error::Configuration(
            "SPOTIFY_API_AUTH_CLIENT_ID and SPOTIFY_API_AUTH_CLIENT_SECRET must be set".into(),
        )
    })
}

/// Returns the client ID alone, needed to build the authorize URL.
pub fn spotify_client_id() -> Option<String> {
    var("SPOTIFY_API_AUTH_CLIENT_ID")
}

/// Returns the operator-configured refresh token (`SPOTIFY_REFRESH_TOKEN`).
///
/// Used when a request carries no session of its own (single-tenant mode)
/// and by the terminal commands.
pub fn spotify_refresh_token() -> Option<String> {
    var("SPOTIFY_REFRESH_TOKEN")
}

/// OAuth token endpoint (`SPOTIFY_API_TOKEN_URL`).
pub fn spotify_apitoken_url() -> String {
    var_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL)
}

/// OAuth authorize endpoint (`SPOTIFY_API_AUTH_URL`).
pub fn spotify_apiauth_url() -> String {
    var_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL)
}

/// Web API base URL (`SPOTIFY_API_URL`), without trailing slash.
pub fn spotify_apiurl() -> String {
    var_or("SPOTIFY_API_URL", DEFAULT_API_URL)
        .trim_end_matches('/')
        .to_string()
}

/// Redirect URI registered for the application (`SPOTIFY_API_REDIRECT_URI`).
pub fn spotify_redirect_uri() -> String {
    var_or("SPOTIFY_API_REDIRECT_URI", DEFAULT_REDIRECT_URI)
}

/// Space separated scopes requested at login (`SPOTIFY_API_AUTH_SCOPE`).
pub fn spotify_scope() -> String {
    var_or("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE)
}

/// Bind address of the HTTP server (`SERVER_ADDRESS`).
pub fn server_addr() -> String {
    var_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS)
}

/// Whether session cookies carry the `Secure` attribute (`COOKIE_SECURE`).
pub fn cookie_secure() -> bool {
    flag("COOKIE_SECURE", false)
}

/// Seconds subtracted from `expires_in` when computing token expiry.
pub fn token_safety_margin() -> Duration {
    Duration::from_secs(number("TOKEN_SAFETY_MARGIN_SECS", 60))
}

/// Per-call timeout for every upstream request (`HTTP_TIMEOUT_SECS`).
pub fn http_timeout() -> Duration {
    Duration::from_secs(number("HTTP_TIMEOUT_SECS", 10).max(1))
}

/// Builds the HTTP client shared by the token acquirer and the fetcher.
///
/// # Errors
///
/// Returns `Error::Configuration` if the TLS backend cannot be initialised.
pub fn http_client() -> Res<Client> {
    Client::builder()
        .timeout(http_timeout())
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))
}

/// How the now-playing page presents itself.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DisplaySettings {
    pub title: String,
    pub update_interval: u64,
    pub show_progress: bool,
    pub show_album_art: bool,
    pub show_device: bool,
    pub offline_message: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            title: "Now Playing".to_string(),
            update_interval: 30_000,
            show_progress: true,
            show_album_art: true,
            show_device: true,
            offline_message: "Not playing anything right now".to_string(),
        }
    }
}

/// Reads the page display settings, falling back to [`DisplaySettings::default`].
pub fn display_settings() -> DisplaySettings {
    let defaults = DisplaySettings::default();
    DisplaySettings {
        title: var_or("SITE_TITLE", &defaults.title),
        // anything faster than a second only burns rate limit
        update_interval: number("UPDATE_INTERVAL_MS", defaults.update_interval).max(1_000),
        show_progress: flag("SHOW_PROGRESS", defaults.show_progress),
        show_album_art: flag("SHOW_ALBUM_ART", defaults.show_album_art),
        show_device: flag("SHOW_DEVICE", defaults.show_device),
        offline_message: var_or("OFFLINE_MESSAGE", &defaults.offline_message),
    }
}

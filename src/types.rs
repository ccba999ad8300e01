use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// OAuth client credentials, immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A request to trade some proof of identity for tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// One-time code returned to the redirect URI after user consent.
    AuthorizationCode {
        code: String,
        redirect_uri: String,
        code_verifier: Option<String>,
    },
    /// Long-lived token used for every renewal.
    RefreshToken { token: String },
}

impl Grant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Form fields sent to the token endpoint.
    pub fn form(&self) -> Vec<(&'static str, &str)> {
        let mut form = vec![("grant_type", self.grant_type())];
        match self {
            Grant::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                form.push(("code", code));
                form.push(("redirect_uri", redirect_uri));
                if let Some(verifier) = code_verifier {
                    form.push(("code_verifier", verifier));
                }
            }
            Grant::RefreshToken { token } => form.push(("refresh_token", token)),
        }
        form
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::AuthorizationCode {
                redirect_uri,
                code_verifier,
                ..
            } => f
                .debug_struct("AuthorizationCode")
                .field("redirect_uri", redirect_uri)
                .field("pkce", &code_verifier.is_some())
                .finish_non_exhaustive(),
            Grant::RefreshToken { .. } => f.debug_struct("RefreshToken").finish_non_exhaustive(),
        }
    }
}

/// Token material returned by a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// Refresh grants only sometimes reissue this.
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: u64,
}

/// Raw token endpoint body. Every field is optional so that a missing one
/// surfaces as a typed error instead of a serde message.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Token material owned by one authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub refresh_token: String,
    pub access_token: Option<String>,
    /// `issued_at + expires_in - safety margin`.
    pub access_token_expiry: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_token: None,
            access_token_expiry: None,
        }
    }

    /// Returns the cached access token if it is still valid at `now`.
    pub fn valid_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.access_token, self.access_token_expiry) {
            (Some(token), Some(expiry)) if now < expiry => Some(token),
            _ => None,
        }
    }
}

impl fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSession")
            .field("refresh_token", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("access_token_expiry", &self.access_token_expiry)
            .finish()
    }
}

/// State kept between starting a terminal login and receiving its callback.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub code_verifier: String,
    pub state: String,
    pub token: Option<TokenPair>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// `null` for local files.
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub album: Album,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Track {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    pub volume_percent: Option<u8>,
}

/// Raw currently-playing body; `item` and `device` are validated separately.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackResponse {
    pub is_playing: Option<bool>,
    pub progress_ms: Option<u64>,
    pub item: Option<serde_json::Value>,
    pub device: Option<serde_json::Value>,
}

/// Normalized view of the user's current playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub progress_ms: u64,
    pub track: Option<Track>,
    pub device: Option<Device>,
}

/// Body of `GET /api/currently-playing`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentlyPlaying {
    pub track: Option<Track>,
    pub is_playing: bool,
    pub progress: u64,
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
}

impl CurrentlyPlaying {
    pub fn offline() -> Self {
        Self {
            track: None,
            is_playing: false,
            progress: 0,
            device: None,
            error: None,
            message: None,
            login_url: None,
        }
    }
}

impl From<Option<PlaybackSnapshot>> for CurrentlyPlaying {
    fn from(snapshot: Option<PlaybackSnapshot>) -> Self {
        match snapshot {
            Some(PlaybackSnapshot {
                is_playing,
                progress_ms,
                track: Some(track),
                device,
            }) => Self {
                track: Some(track),
                is_playing,
                progress: progress_ms,
                device,
                ..Self::offline()
            },
            _ => Self::offline(),
        }
    }
}

/// Body of the JSON auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Tabled)]
pub struct PlaybackTableRow {
    pub status: String,
    pub track: String,
    pub artists: String,
    pub album: String,
    pub progress: String,
    pub device: String,
}

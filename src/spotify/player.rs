use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    Res, config,
    error::{Error, UpstreamFailure},
    management::TokenStore,
    types::{Device, PlaybackResponse, PlaybackSnapshot, Track},
};

/// How often a rejected access token is refreshed and the request retried
/// within one fetch.
pub const MAX_REAUTH_RETRIES: usize = 1;

/// Reads the user's current playback from the Web API.
///
/// Token refresh and one round of re-authentication after a 401 are handled
/// internally; callers only see a snapshot, `None` for "nothing playing", or
/// a typed error.
#[derive(Debug, Clone)]
pub struct NowPlayingFetcher {
    client: Client,
    playback_url: String,
}

impl NowPlayingFetcher {
    /// `api_url` is the Web API base, e.g. `https://api.spotify.com/v1`.
    pub fn new(client: Client, api_url: &str) -> Self {
        Self {
            client,
            playback_url: format!(
                "{}/me/player/currently-playing",
                api_url.trim_end_matches('/')
            ),
        }
    }

    pub fn from_env() -> Res<Self> {
        Ok(Self::new(config::http_client()?, &config::spotify_apiurl()))
    }

    /// Fetches the currently playing item using tokens from `store`.
    ///
    /// # Returns
    ///
    /// - `Ok(None)` when upstream answers 204, i.e. there is no active playback
    /// - `Ok(Some(snapshot))` with missing top-level fields defaulted
    ///
    /// # Errors
    ///
    /// - `Error::Unauthenticated` when no refresh token is available, the
    ///   refresh is rejected, or the access token is rejected again after one
    ///   refresh (two upstream requests at most)
    /// - `Error::InsufficientScope` on 403
    /// - `Error::Upstream` for other statuses, timeouts and transport errors
    /// - `Error::MalformedResponse` when the body does not match the schema
    pub async fn fetch_currently_playing(&self, store: &TokenStore) -> Res<Option<PlaybackSnapshot>> {
        for attempt in 0..=MAX_REAUTH_RETRIES {
            let token = store
                .get_valid_access_token()
                .await
                .map_err(unauthenticated)?;

            let res = self
                .client
                .get(&self.playback_url)
                .bearer_auth(&token)
                .send()
                .await?;

            match res.status() {
                StatusCode::NO_CONTENT => {
                    debug!("No active playback");
                    return Ok(None);
                }
                StatusCode::UNAUTHORIZED => {
                    warn!(attempt, "Access token rejected by playback endpoint");
                    store.invalidate_rejected(&token).await;
                }
                StatusCode::FORBIDDEN => return Err(Error::InsufficientScope),
                status if !status.is_success() => {
                    let body = res.text().await.unwrap_or_default();
                    error!(status = status.as_u16(), body = %body, "Playback endpoint error");
                    return Err(Error::Upstream(UpstreamFailure::Status(status.as_u16())));
                }
                _ => {
                    let body = res.text().await?;
                    // some clients report an idle player as an empty 200
                    if body.trim().is_empty() {
                        return Ok(None);
                    }
                    return parse_playback(&body).map(Some);
                }
            }
        }

        Err(Error::Unauthenticated(
            "access token rejected again after refresh".into(),
        ))
    }
}

fn unauthenticated(err: Error) -> Error {
    match err {
        Error::NoRefreshToken => Error::Unauthenticated("no refresh token available".into()),
        Error::RefreshFailed(inner) => {
            Error::Unauthenticated(format!("refresh token rejected: {inner}"))
        }
        other => other,
    }
}

/// Validates a currently-playing body and normalizes it into a snapshot.
///
/// `is_playing` defaults to `false`, `progress_ms` to `0`; a `null` or
/// missing `item`/`device` becomes `None`. A present `item` or `device`
/// that does not match its schema is a `MalformedResponse`.
pub fn parse_playback(body: &str) -> Res<PlaybackSnapshot> {
    let raw: PlaybackResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("playback response: {e}")))?;

    let track = match raw.item {
        None | Some(Value::Null) => None,
        Some(item) => Some(
            serde_json::from_value::<Track>(item)
                .map_err(|e| Error::MalformedResponse(format!("playback item: {e}")))?,
        ),
    };
    let device = match raw.device {
        None | Some(Value::Null) => None,
        Some(device) => Some(
            serde_json::from_value::<Device>(device)
                .map_err(|e| Error::MalformedResponse(format!("playback device: {e}")))?,
        ),
    };

    Ok(PlaybackSnapshot {
        is_playing: raw.is_playing.unwrap_or(false),
        progress_ms: raw.progress_ms.unwrap_or(0),
        track,
        device,
    })
}

//! # API Module
//!
//! HTTP handlers of the now-playing server and of the local callback server
//! used by the terminal login.
//!
//! ## Endpoints
//!
//! ### Authentication
//!
//! - [`login`] - `GET /auth/login`, redirects to Spotify's authorize URL with
//!   an anti-forgery `state` and a PKCE challenge kept in short-lived cookies
//! - [`browser_callback`] - `GET /auth/callback`, the redirect target; checks
//!   `state`, exchanges the code and stores the session in cookies
//! - [`token_callback`] - `POST /api/auth/callback` with `{code, code_verifier?}`
//!   for clients that handle the redirect themselves
//! - [`logout`] - `POST /api/auth/logout`, removes the session cookies
//! - [`callback`] - terminal login callback, hands the token pair back to the
//!   waiting CLI through shared state
//!
//! ### Playback
//!
//! - [`currently_playing`] - `GET /api/currently-playing`, the polling endpoint
//!
//! ### Page and Monitoring
//!
//! - [`index`] - `GET /`, the now-playing page
//! - [`settings`] - `GET /api/settings`, display settings for the page
//! - [`health`] - `GET /health`
//!
//! ## Sessions
//!
//! A browser session is nothing but HTTP-only cookies holding the refresh
//! token and the cached access token. Requests without a session cookie use
//! the process-wide session configured through `SPOTIFY_REFRESH_TOKEN`, if
//! any.
//!
//! ## Error Responses
//!
//! Errors are mapped by [`status_for`]: `401` means the client must log in
//! again, every other failure should degrade to the offline display.

mod auth;
mod callback;
mod page;
mod playing;

use axum::http::StatusCode;

use crate::error::Error;

pub use auth::{browser_callback, login, logout, token_callback};
pub use callback::{CallbackParams, callback};
pub use page::{health, index, settings};
pub use playing::currently_playing;

/// HTTP status reported for a core error.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Unauthenticated(_) | Error::NoRefreshToken | Error::RefreshFailed(_) => {
            StatusCode::UNAUTHORIZED
        }
        Error::InsufficientScope => StatusCode::FORBIDDEN,
        Error::ExchangeRejected { status, .. } => StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_REQUEST),
        Error::Upstream(_) | Error::MalformedResponse(_) | Error::MissingRefreshToken => {
            StatusCode::BAD_GATEWAY
        }
        Error::Configuration(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

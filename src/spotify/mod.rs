//! # Spotify Integration Module
//!
//! Everything that talks to Spotify's accounts service and Web API lives
//! here. Callers above this layer deal in token pairs and playback
//! snapshots, never in raw HTTP.
//!
//! ## Architecture
//!
//! ```text
//! HTTP surface / CLI
//!          ↓
//! Token Store (crate::management)
//!          ↓
//! Spotify Integration Layer
//!     ├── auth    (token endpoint, authorize URL, terminal login)
//!     └── player  (currently playing)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! ### Authentication
//!
//! [`auth`] exchanges grants at `POST /api/token` using HTTP Basic client
//! authentication:
//! - **Authorization code**: once per login, optionally with a PKCE verifier
//! - **Refresh token**: every time the cached access token goes stale
//!
//! The acquirer never retries and never caches. Rejections come back as
//! `Error::ExchangeRejected` with the upstream status and body.
//!
//! ### Playback
//!
//! [`player`] calls `GET /me/player/currently-playing` with a bearer token:
//! - **204**: nothing is playing, which is a valid empty result
//! - **401**: the access token is invalidated, refreshed and the request
//!   retried exactly once
//! - **403**: reported as missing scopes
//! - **other errors**: reported with their status, to be retried on the next poll
//!
//! ## Timeouts
//!
//! Both modules use the shared client from [`crate::config::http_client`],
//! so every request is bounded by `HTTP_TIMEOUT_SECS` and a timeout
//! surfaces as `UpstreamFailure::Timeout`.
//!
//! ## Required Scopes
//!
//! - `user-read-currently-playing`
//! - `user-read-playback-state`
//! - `user-read-recently-played` (optional)

pub mod auth;
pub mod player;

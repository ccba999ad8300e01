//! # CLI Module
//!
//! Implementations of the `nowplaying` subcommands. Each command reports
//! progress and failures through the crate's terminal macros
//! ([`info!`](crate::info), [`success!`](crate::success),
//! [`warning!`](crate::warning), [`error!`](crate::error)); `error!` ends the
//! process.
//!
//! ## Commands
//!
//! - [`auth`] - interactive login that prints a refresh token to configure as
//!   `SPOTIFY_REFRESH_TOKEN`
//! - [`serve`] - runs the web server
//! - [`now`] - shows the current playback once
//! - [`watch`] - keeps polling and prints every change
//!
//! ## Usage Patterns
//!
//! ### Initial Setup
//! ```bash
//! nowplaying auth              # log in and copy the refresh token
//! nowplaying now               # check that everything works
//! ```
//!
//! ### Regular Usage
//! ```bash
//! nowplaying serve             # page on SERVER_ADDRESS
//! nowplaying watch --interval 10
//! ```
//!
//! The terminal commands always use the process-wide session built from
//! `SPOTIFY_REFRESH_TOKEN`; browser sessions only exist inside the server.

mod auth;
mod now;
mod serve;
mod watch;

use std::sync::Arc;

use crate::{
    config, error,
    management::TokenStore,
    spotify::{auth::TokenAcquirer, player::NowPlayingFetcher},
};

pub use auth::auth;
pub use now::now;
pub use serve::serve;
pub use watch::watch;

/// Fetcher and token store for the configured single-tenant session.
fn configured_session() -> (NowPlayingFetcher, TokenStore) {
    if let Err(e) = config::require_credentials() {
        error!("{}", e);
    }
    let Some(refresh_token) = config::spotify_refresh_token() else {
        error!("SPOTIFY_REFRESH_TOKEN is not set. Run `nowplaying auth` first.");
    };

    let acquirer = match TokenAcquirer::from_env() {
        Ok(acquirer) => Arc::new(acquirer),
        Err(e) => error!("{}", e),
    };
    let fetcher = match NowPlayingFetcher::from_env() {
        Ok(fetcher) => fetcher,
        Err(e) => error!("{}", e),
    };

    let store = TokenStore::with_refresh_token(acquirer, Some(refresh_token))
        .with_safety_margin(config::token_safety_margin());
    (fetcher, store)
}

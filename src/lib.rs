//! Spotify Now-Playing Library
//!
//! Shows the track a Spotify user is currently listening to, either on a
//! small web page or in the terminal. The interesting part is the OAuth
//! token lifecycle: acquiring tokens through the authorization-code flow,
//! caching the access token, refreshing it when it goes stale and
//! recovering once when upstream rejects it.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for the web server and the terminal login callback
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration from environment variables and `.env`
//! - `error` - The crate's error type
//! - `management` - Token store and session persistence
//! - `poller` - Fixed-interval, non-overlapping poll driver
//! - `server` - Router assembly and listeners
//! - `spotify` - Token endpoint and Web API client
//! - `types` - Data structures and type definitions
//! - `utils` - PKCE helpers and formatting
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nowplaying::{management::TokenStore, spotify::{auth::TokenAcquirer, player::NowPlayingFetcher}};
//!
//! #[tokio::main]
//! async fn main() -> nowplaying::Res<()> {
//!     let acquirer = Arc::new(TokenAcquirer::from_env()?);
//!     let store = TokenStore::with_refresh_token(acquirer, nowplaying::config::spotify_refresh_token());
//!     let playing = NowPlayingFetcher::from_env()?.fetch_currently_playing(&store).await?;
//!     println!("{:?}", playing);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod poller;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

pub use error::Error;

/// Result type used throughout the crate.
pub type Res<T> = std::result::Result<T, Error>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Polling every {}s", 30);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Authentication successful!");
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program
/// with status 1.
///
/// Only for failures the user has to fix before trying again, such as
/// missing configuration or a revoked refresh token.
///
/// # Example
///
/// ```
/// error!("SPOTIFY_REFRESH_TOKEN is not set");
/// // Program exits here
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for recoverable issues, e.g. a poll that failed but will be retried.
///
/// # Example
///
/// ```
/// warning!("Spotify is unavailable right now");
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}

//! Error types shared by the token lifecycle, the playback fetcher and the
//! HTTP surface.

use std::fmt;

/// Why a call to the upstream service did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Upstream answered with a non-success status.
    Status(u16),
    /// The per-call timeout elapsed.
    Timeout,
    /// Connection, TLS or body transfer failure.
    Transport(String),
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamFailure::Status(status) => write!(f, "status {status}"),
            UpstreamFailure::Timeout => f.write_str("timeout"),
            UpstreamFailure::Transport(msg) => write!(f, "transport: {msg}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client credentials or another required setting is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The authorization-code exchange succeeded but returned no refresh token.
    #[error("Upstream did not return a refresh token, please log in again")]
    MissingRefreshToken,

    /// Neither a session nor the configured fallback holds a refresh token.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The refresh-token grant was rejected.
    #[error("Refreshing the access token failed: {0}")]
    RefreshFailed(#[source] Box<Error>),

    /// The token endpoint declined a grant.
    #[error("Token exchange rejected (status {status}): {body}")]
    ExchangeRejected { status: u16, body: String },

    /// No usable credentials for the upstream API; the user has to log in.
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// Upstream answered 403, usually a missing scope grant.
    #[error(
        "Access forbidden, make sure the token has the user-read-currently-playing and user-read-playback-state scopes"
    )]
    InsufficientScope,

    #[error("Upstream error: {0}")]
    Upstream(UpstreamFailure),

    /// Upstream returned a body that does not match the expected schema.
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    /// Binding or serving the local HTTP listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failures a caller may simply retry on the next poll tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Upstream(_) | Error::MalformedResponse(_))
    }

    /// Failures that can only be resolved by logging in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Error::Unauthenticated(_) | Error::NoRefreshToken | Error::RefreshFailed(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Upstream(UpstreamFailure::Timeout)
        } else if err.is_decode() {
            Error::MalformedResponse(err.to_string())
        } else {
            Error::Upstream(UpstreamFailure::Transport(err.to_string()))
        }
    }
}

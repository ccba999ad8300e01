use std::{sync::Arc, time::Duration};

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::{
    Res, config,
    error::Error,
    server::start_login_server,
    types::{Credentials, Grant, PendingLogin, TokenPair, TokenResponse},
    utils, warning,
};

/// Scope that is only requested when the caller opts in.
pub const RECENTLY_PLAYED_SCOPE: &str = "user-read-recently-played";

/// Exchanges grants for token pairs at the upstream token endpoint.
///
/// Stateless apart from its configuration: every call to [`exchange`]
/// issues exactly one HTTP request and nothing is cached. Retrying a
/// rejected grant is left to the caller.
///
/// [`exchange`]: TokenAcquirer::exchange
#[derive(Debug, Clone)]
pub struct TokenAcquirer {
    client: Client,
    token_url: String,
    credentials: Option<Credentials>,
}

impl TokenAcquirer {
    pub fn new(client: Client, token_url: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            credentials,
        }
    }

    /// Builds an acquirer from the process configuration.
    ///
    /// Missing credentials are not an error here; they surface as
    /// `Error::Configuration` on the first exchange.
    pub fn from_env() -> Res<Self> {
        Ok(Self::new(
            config::http_client()?,
            config::spotify_apitoken_url(),
            config::spotify_credentials(),
        ))
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Trades `grant` for a token pair.
    ///
    /// The request is form encoded and authenticated with HTTP Basic auth
    /// using the client credentials.
    ///
    /// # Errors
    ///
    /// - `Error::Configuration` when no credentials are configured; no request is made
    /// - `Error::ExchangeRejected` for any non-2xx answer, carrying status and body
    /// - `Error::MalformedResponse` when `access_token` or `expires_in` is missing
    /// - `Error::Upstream` for timeouts and transport failures
    pub async fn exchange(&self, grant: &Grant) -> Res<TokenPair> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            Error::Configuration("Spotify client credentials are not configured".into())
        })?;

        debug!(grant = grant.grant_type(), "Exchanging grant at token endpoint");
        let res = self
            .client
            .post(&self.token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&grant.form())
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                grant = grant.grant_type(),
                "Token endpoint rejected grant"
            );
            return Err(Error::ExchangeRejected {
                status: status.as_u16(),
                body,
            });
        }

        let response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("token response: {e}")))?;
        token_pair(response)
    }
}

fn token_pair(response: TokenResponse) -> Res<TokenPair> {
    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::MalformedResponse("token response lacks access_token".into()))?;
    let expires_in = response
        .expires_in
        .ok_or_else(|| Error::MalformedResponse("token response lacks expires_in".into()))?;

    Ok(TokenPair {
        access_token,
        refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
        expires_in,
    })
}

/// Builds the upstream authorize URL for the authorization-code flow.
///
/// `code_challenge` adds the PKCE parameters (S256). `show_dialog` is always
/// set so that switching accounts is possible after a logout.
pub fn authorize_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
    code_challenge: Option<&str>,
) -> Res<String> {
    let mut params = vec![
        ("client_id", client_id),
        ("response_type", "code"),
        ("redirect_uri", redirect_uri),
        ("scope", scope),
        ("state", state),
        ("show_dialog", "true"),
    ];
    if let Some(challenge) = code_challenge {
        params.push(("code_challenge_method", "S256"));
        params.push(("code_challenge", challenge));
    }

    let url = Url::parse_with_params(auth_url, &params)
        .map_err(|e| Error::Configuration(format!("invalid SPOTIFY_API_AUTH_URL: {e}")))?;
    Ok(url.into())
}

/// Appends the optional recently-played scope unless already present.
pub fn with_recently_played(scope: &str) -> String {
    if scope.split_whitespace().any(|s| s == RECENTLY_PLAYED_SCOPE) {
        scope.to_string()
    } else {
        format!("{scope} {RECENTLY_PLAYED_SCOPE}")
    }
}

/// Runs the interactive terminal login and returns the obtained token pair.
///
/// Starts a local callback server on `SERVER_ADDRESS`, opens the authorize
/// URL in the browser and waits for the callback handler to complete the
/// exchange. The redirect URI registered with Spotify must point at this
/// server's `/auth/callback`.
///
/// # Errors
///
/// - `Error::Configuration` when the client ID is missing
/// - `Error::Unauthenticated` when the callback reports a failure or nothing
///   arrives within two minutes
pub async fn login(shared_state: Arc<Mutex<Option<PendingLogin>>>, recent: bool) -> Res<TokenPair> {
    let client_id = config::spotify_client_id()
        .ok_or_else(|| Error::Configuration("SPOTIFY_API_AUTH_CLIENT_ID must be set".into()))?;

    let code_verifier = utils::generate_code_verifier();
    let code_challenge = utils::generate_code_challenge(&code_verifier);
    let state = utils::generate_state();

    let scope = if recent {
        with_recently_played(&config::spotify_scope())
    } else {
        config::spotify_scope()
    };
    let auth_url = authorize_url(
        &config::spotify_apiauth_url(),
        &client_id,
        &config::spotify_redirect_uri(),
        &scope,
        &state,
        Some(&code_challenge),
    )?;

    // Store verifier and state before the browser can hit the callback
    {
        let mut lock = shared_state.lock().await;
        *lock = Some(PendingLogin {
            code_verifier,
            state,
            token: None,
            error: None,
        });
    }

    let server_state = Arc::clone(&shared_state);
    let server = tokio::spawn(async move {
        if let Err(e) = start_login_server(Arc::clone(&server_state)).await {
            if let Some(pending) = server_state.lock().await.as_mut() {
                pending.error = Some(format!("callback server failed: {e}"));
            }
        }
    });

    if webbrowser::open(&auth_url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        )
    }

    let outcome = wait_for_token(shared_state).await;
    server.abort();
    outcome
}

async fn wait_for_token(shared_state: Arc<Mutex<Option<PendingLogin>>>) -> Res<TokenPair> {
    use std::time::Instant;

    let max_wait = Duration::from_secs(120);
    let start = Instant::now();

    while start.elapsed() < max_wait {
        let lock = shared_state.lock().await;
        if let Some(pending) = lock.as_ref() {
            if let Some(token) = &pending.token {
                return Ok(token.clone());
            }
            if let Some(error) = &pending.error {
                return Err(Error::Unauthenticated(error.clone()));
            }
        }
        drop(lock);
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Err(Error::Unauthenticated("login timed out".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_requires_access_token_and_expiry() {
        let missing_access = TokenResponse {
            access_token: None,
            refresh_token: Some("R".into()),
            expires_in: Some(3600),
            token_type: Some("Bearer".into()),
            scope: None,
        };
        assert!(matches!(
            token_pair(missing_access),
            Err(Error::MalformedResponse(_))
        ));

        let missing_expiry = TokenResponse {
            access_token: Some("A".into()),
            refresh_token: None,
            expires_in: None,
            token_type: None,
            scope: None,
        };
        assert!(matches!(
            token_pair(missing_expiry),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_token_pair_drops_empty_refresh_token() {
        let response = TokenResponse {
            access_token: Some("A".into()),
            refresh_token: Some(String::new()),
            expires_in: Some(3600),
            token_type: Some("Bearer".into()),
            scope: None,
        };
        let pair = token_pair(response).unwrap();
        assert_eq!(pair.access_token, "A");
        assert_eq!(pair.refresh_token, None);
        assert_eq!(pair.expires_in, 3600);
    }

    #[test]
    fn test_authorize_url() {
        let url = authorize_url(
            "https://accounts.example.com/authorize",
            "client-1",
            "http://127.0.0.1:3000/auth/callback",
            "user-read-currently-playing user-read-playback-state",
            "xyz",
            Some("challenge"),
        )
        .unwrap();
        let url = Url::parse(&url).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/authorize");
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:3000/auth/callback");
        assert_eq!(
            params["scope"],
            "user-read-currently-playing user-read-playback-state"
        );
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["code_challenge"], "challenge");
    }

    #[test]
    fn test_with_recently_played() {
        let scope = "user-read-currently-playing user-read-playback-state";
        assert_eq!(
            with_recently_played(scope),
            "user-read-currently-playing user-read-playback-state user-read-recently-played"
        );
        let already = with_recently_played(scope);
        assert_eq!(with_recently_played(&already), already);
    }
}

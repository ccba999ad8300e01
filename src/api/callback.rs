use std::sync::Arc;

use axum::{Extension, extract::Query, response::Html};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    config,
    error::Error,
    spotify::auth::TokenAcquirer,
    types::{Grant, PendingLogin},
    warning,
};

/// Query string Spotify appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user denied access.
    pub error: Option<String>,
}

/// Callback of the terminal login: exchanges the code and leaves the token
/// pair (or the failure) in the shared state the CLI is waiting on.
pub async fn callback(
    Query(params): Query<CallbackParams>,
    Extension(shared_state): Extension<Arc<Mutex<Option<PendingLogin>>>>,
) -> Html<&'static str> {
    let mut state = shared_state.lock().await;
    let Some(pending) = state.as_mut() else {
        return Html("<h4>No login in progress.</h4>");
    };

    if let Some(reason) = params.error {
        pending.error = Some(format!("authorization denied: {reason}"));
        return Html("<h4>Login cancelled.</h4>");
    }
    if params.state.as_deref() != Some(pending.state.as_str()) {
        pending.error = Some("state mismatch in callback".into());
        return Html("<h4>Login failed: state mismatch.</h4>");
    }
    let Some(code) = params.code else {
        return Html("<h4>Missing authorization code.</h4>");
    };

    let grant = Grant::AuthorizationCode {
        code,
        redirect_uri: config::spotify_redirect_uri(),
        code_verifier: Some(pending.code_verifier.clone()),
    };
    let exchanged = match TokenAcquirer::from_env() {
        Ok(acquirer) => acquirer.exchange(&grant).await,
        Err(e) => Err(e),
    };

    match exchanged {
        Ok(pair) if pair.refresh_token.is_none() => {
            pending.error = Some(Error::MissingRefreshToken.to_string());
            Html("<h4>Login failed.</h4>")
        }
        Ok(pair) => {
            pending.token = Some(pair);
            Html("<h2>Authentication successful.</h2><p>Close this browser window.</p>")
        }
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            pending.error = Some(e.to_string());
            Html("<h4>Login failed.</h4>")
        }
    }
}

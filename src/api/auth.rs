use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    Res,
    api::{CallbackParams, status_for},
    error::Error,
    management::{CookieSession, session},
    server::AppState,
    spotify::auth::{authorize_url, with_recently_played},
    types::{AuthResult, Grant, StoredSession},
    utils,
};

const STATE_COOKIE: &str = "spotify_auth_state";
const VERIFIER_COOKIE: &str = "spotify_code_verifier";

fn login_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::minutes(5))
        .build()
}

fn clear_login_cookies(jar: CookieJar) -> CookieJar {
    [STATE_COOKIE, VERIFIER_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| {
            jar.add(
                Cookie::build((name, ""))
                    .path("/")
                    .max_age(time::Duration::ZERO)
                    .build(),
            )
        })
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    /// Also request `user-read-recently-played`.
    #[serde(default)]
    pub recent: bool,
}

/// Starts the authorization-code flow.
pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
) -> Response {
    let settings = &state.settings;
    let Some(client_id) = settings.client_id.as_deref() else {
        error!("Login requested but SPOTIFY_API_AUTH_CLIENT_ID is not set");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Spotify credentials not configured",
        )
            .into_response();
    };

    let code_verifier = utils::generate_code_verifier();
    let code_challenge = utils::generate_code_challenge(&code_verifier);
    let anti_forgery = utils::generate_state();
    let scope = if params.recent {
        with_recently_played(&settings.scope)
    } else {
        settings.scope.clone()
    };

    match authorize_url(
        &settings.auth_url,
        client_id,
        &settings.redirect_uri,
        &scope,
        &anti_forgery,
        Some(&code_challenge),
    ) {
        Ok(url) => {
            let jar = jar
                .add(login_cookie(STATE_COOKIE, anti_forgery, settings.cookie_secure))
                .add(login_cookie(VERIFIER_COOKIE, code_verifier, settings.cookie_secure));
            (jar, Redirect::to(&url)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Cannot build authorize URL");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Exchanges an authorization code and returns the new session material.
async fn complete_login(
    state: &AppState,
    code: String,
    code_verifier: Option<String>,
) -> Res<StoredSession> {
    let pair = state
        .acquirer
        .exchange(&Grant::AuthorizationCode {
            code,
            redirect_uri: state.settings.redirect_uri.clone(),
            code_verifier,
        })
        .await?;

    let store = state.new_store();
    store.store_initial_tokens(pair).await?;
    store.snapshot().await.ok_or(Error::MissingRefreshToken)
}

fn persist(state: &AppState, jar: CookieJar, stored: &StoredSession) -> CookieJar {
    let mut cookies = CookieSession::new(jar, state.settings.cookie_secure);
    session::save(&mut cookies, stored, chrono::Utc::now());
    cookies.into_jar()
}

fn redirect_with_error(reason: &str) -> Redirect {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", reason)
        .finish();
    Redirect::to(&format!("/?{query}"))
}

/// Redirect target of the authorize step.
pub async fn browser_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let expected_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let code_verifier = jar
        .get(VERIFIER_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let jar = clear_login_cookies(jar);

    if let Some(reason) = params.error {
        warn!(%reason, "Authorization denied");
        return (jar, redirect_with_error("access_denied"));
    }
    let Some(code) = params.code else {
        return (jar, redirect_with_error("missing_code"));
    };
    if expected_state.is_none() || params.state != expected_state {
        warn!("State mismatch in login callback");
        return (jar, redirect_with_error("state_mismatch"));
    }

    match complete_login(&state, code, code_verifier).await {
        Ok(stored) => {
            info!("Login completed");
            (persist(&state, jar, &stored), Redirect::to("/"))
        }
        Err(e) => {
            warn!(error = %e, "Login failed");
            (jar, redirect_with_error("login_failed"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenCallbackRequest {
    pub code: Option<String>,
    pub code_verifier: Option<String>,
}

/// `POST /api/auth/callback`: code exchange for clients that receive the
/// redirect themselves.
pub async fn token_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<TokenCallbackRequest>,
) -> (StatusCode, CookieJar, Json<AuthResult>) {
    let Some(code) = body.code.filter(|c| !c.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            jar,
            Json(AuthResult::failed("Authorization code is required")),
        );
    };

    match complete_login(&state, code, body.code_verifier).await {
        Ok(stored) => (
            StatusCode::OK,
            persist(&state, jar, &stored),
            Json(AuthResult::ok("Successfully authenticated with Spotify")),
        ),
        Err(e) => {
            warn!(error = %e, "Code exchange failed");
            let message = match &e {
                Error::Configuration(_) => "Spotify credentials not configured".to_string(),
                Error::ExchangeRejected { .. } => "Failed to exchange authorization code".to_string(),
                other => other.to_string(),
            };
            (status_for(&e), jar, Json(AuthResult::failed(message)))
        }
    }
}

/// `POST /api/auth/logout`: destroys the cookie session.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<AuthResult>) {
    let mut cookies = CookieSession::new(jar, state.settings.cookie_secure);
    session::clear(&mut cookies);
    (
        cookies.into_jar(),
        Json(AuthResult::ok("Successfully logged out")),
    )
}

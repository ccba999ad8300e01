use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{error, warn};

use crate::{
    api::status_for,
    error::Error,
    management::{CookieSession, session},
    server::AppState,
    types::CurrentlyPlaying,
};

/// `GET /api/currently-playing`.
///
/// Uses the cookie session when the request has one and writes refreshed
/// token material back into the cookies. Without a session the configured
/// process-wide session is used; with neither the request is unauthenticated.
pub async fn currently_playing(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut cookies = CookieSession::new(jar, state.settings.cookie_secure);

    let outcome = match session::load(&cookies) {
        Some(stored) => {
            let store = state.session_store(stored);
            let outcome = state.fetcher.fetch_currently_playing(&store).await;
            match (&outcome, store.snapshot().await) {
                // the refresh token itself is dead, drop it
                (Err(Error::Unauthenticated(_)), _) | (_, None) => session::clear(&mut cookies),
                (_, Some(current)) => session::save(&mut cookies, &current, store.now()),
            }
            outcome
        }
        None => match &state.fallback {
            Some(store) => state.fetcher.fetch_currently_playing(store).await,
            None => Err(Error::Unauthenticated("no session".into())),
        },
    };
    let jar = cookies.into_jar();

    match outcome {
        Ok(snapshot) => (jar, Json(CurrentlyPlaying::from(snapshot))).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(error = %e, "Error fetching currently playing");
            } else {
                warn!(error = %e, "Error fetching currently playing");
            }

            let body = CurrentlyPlaying {
                error: Some("Failed to fetch currently playing track".into()),
                message: Some(e.to_string()),
                login_url: e.requires_login().then(|| "/auth/login".to_string()),
                ..CurrentlyPlaying::offline()
            };
            (status, jar, Json(body)).into_response()
        }
    }
}

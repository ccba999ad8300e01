use std::{
    collections::HashMap,
    net::SocketAddr,
    str::FromStr,
    sync::{Arc, Mutex as StdMutex, Weak},
    time::Duration,
};

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tokio::sync::Mutex;
use tracing::info;
use url::Url;

use crate::{
    Res, api, config,
    config::DisplaySettings,
    error::Error,
    management::TokenStore,
    spotify::{auth::TokenAcquirer, player::NowPlayingFetcher},
    types::{PendingLogin, StoredSession},
};

/// Settings the HTTP handlers need besides the shared clients.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub client_id: Option<String>,
    pub auth_url: String,
    pub redirect_uri: String,
    pub scope: String,
    pub cookie_secure: bool,
    pub safety_margin: Duration,
    pub display: DisplaySettings,
}

impl ServerSettings {
    pub fn from_env() -> Self {
        Self {
            client_id: config::spotify_client_id(),
            auth_url: config::spotify_apiauth_url(),
            redirect_uri: config::spotify_redirect_uri(),
            scope: config::spotify_scope(),
            cookie_secure: config::cookie_secure(),
            safety_margin: config::token_safety_margin(),
            display: config::display_settings(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub acquirer: Arc<TokenAcquirer>,
    pub fetcher: Arc<NowPlayingFetcher>,
    /// Process-wide session backed by `SPOTIFY_REFRESH_TOKEN`, used for
    /// requests that carry no session cookie.
    pub fallback: Option<Arc<TokenStore>>,
    pub settings: Arc<ServerSettings>,
    /// Stores of cookie sessions with a request in flight, keyed by the
    /// refresh token the request presented.
    live_sessions: Arc<StdMutex<HashMap<String, Weak<TokenStore>>>>,
}

impl AppState {
    pub fn new(
        acquirer: TokenAcquirer,
        fetcher: NowPlayingFetcher,
        fallback_refresh_token: Option<String>,
        settings: ServerSettings,
    ) -> Self {
        let acquirer = Arc::new(acquirer);
        let fallback = fallback_refresh_token.map(|token| {
            Arc::new(
                TokenStore::with_refresh_token(Arc::clone(&acquirer), Some(token))
                    .with_safety_margin(settings.safety_margin),
            )
        });

        Self {
            acquirer,
            fetcher: Arc::new(fetcher),
            fallback,
            settings: Arc::new(settings),
            live_sessions: Arc::default(),
        }
    }

    pub fn from_env() -> Res<Self> {
        Ok(Self::new(
            TokenAcquirer::from_env()?,
            NowPlayingFetcher::from_env()?,
            config::spotify_refresh_token(),
            ServerSettings::from_env(),
        ))
    }

    /// Token store for a session restored from the request.
    ///
    /// Overlapping requests of one session share a single store, so its
    /// mutex serializes their refreshes and later callers reuse the token
    /// the first one obtained. The store is dropped with the last request.
    pub fn session_store(&self, session: StoredSession) -> Arc<TokenStore> {
        let mut live = self
            .live_sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        live.retain(|_, store| store.strong_count() > 0);

        if let Some(store) = live.get(&session.refresh_token).and_then(Weak::upgrade) {
            return store;
        }
        let key = session.refresh_token.clone();
        let store = Arc::new(self.new_store().with_session(session));
        live.insert(key, Arc::downgrade(&store));
        store
    }

    /// Token store for a login that has not been completed yet.
    pub fn new_store(&self) -> TokenStore {
        TokenStore::new(Arc::clone(&self.acquirer)).with_safety_margin(self.settings.safety_margin)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health))
        .route("/auth/login", get(api::login))
        .route("/auth/callback", get(api::browser_callback))
        .route("/api/auth/callback", post(api::token_callback))
        .route("/api/auth/logout", post(api::logout))
        .route("/api/currently-playing", get(api::currently_playing))
        .route("/api/settings", get(api::settings))
        .with_state(state)
}

fn bind_addr() -> Res<SocketAddr> {
    let addr = config::server_addr();
    SocketAddr::from_str(&addr)
        .map_err(|e| Error::Configuration(format!("invalid SERVER_ADDRESS '{addr}': {e}")))
}

/// Serves the web surface until the process is stopped.
pub async fn start_api_server(state: AppState) -> Res<()> {
    let addr = bind_addr()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Now-playing server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Serves only the callback route used by the terminal login.
///
/// The route path is taken from `SPOTIFY_API_REDIRECT_URI` so it matches
/// whatever was registered with Spotify.
pub async fn start_login_server(state: Arc<Mutex<Option<PendingLogin>>>) -> Res<()> {
    let redirect_uri = config::spotify_redirect_uri();
    let path = Url::parse(&redirect_uri)
        .map(|u| u.path().to_string())
        .map_err(|e| {
            Error::Configuration(format!("invalid SPOTIFY_API_REDIRECT_URI '{redirect_uri}': {e}"))
        })?;

    let app = Router::new()
        .route("/health", get(api::health))
        .route(&path, get(api::callback).layer(Extension(state)));

    let listener = tokio::net::TcpListener::bind(&bind_addr()?).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(
            TokenAcquirer::new(reqwest::Client::new(), "http://127.0.0.1:9/api/token", None),
            NowPlayingFetcher::new(reqwest::Client::new(), "http://127.0.0.1:9/v1"),
            None,
            ServerSettings {
                client_id: None,
                auth_url: "https://accounts.spotify.com/authorize".into(),
                redirect_uri: "http://127.0.0.1:3000/auth/callback".into(),
                scope: "user-read-currently-playing".into(),
                cookie_secure: false,
                safety_margin: Duration::from_secs(60),
                display: DisplaySettings::default(),
            },
        )
    }

    #[test]
    fn test_session_store_is_shared_while_in_use() {
        let state = state();

        let first = state.session_store(StoredSession::new("R"));
        let second = state.session_store(StoredSession::new("R"));
        let other = state.session_store(StoredSession::new("R-other"));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));

        drop(first);
        drop(second);
        let fresh = state.session_store(StoredSession::new("R"));
        assert_eq!(Arc::strong_count(&fresh), 1);
        assert_eq!(
            state
                .live_sessions
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.as_str() == "R")
                .count(),
            1
        );
    }
}

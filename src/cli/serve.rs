use crate::{config, error, info, server, server::AppState, warning};

pub async fn serve() {
    let state = match AppState::from_env() {
        Ok(state) => state,
        Err(e) => error!("Cannot start server: {}", e),
    };

    if !state.acquirer.has_credentials() {
        warning!("Spotify client credentials are not configured, logins and refreshes will fail");
    }
    if state.fallback.is_none() {
        info!("No SPOTIFY_REFRESH_TOKEN set, visitors have to log in with their own account");
    }
    info!("Serving on http://{}", config::server_addr());

    if let Err(e) = server::start_api_server(state).await {
        error!("Server stopped: {}", e);
    }
}

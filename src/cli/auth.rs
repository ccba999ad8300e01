use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{error, info, spotify, success, types::PendingLogin};

pub async fn auth(shared_state: Arc<Mutex<Option<PendingLogin>>>, recent: bool) {
    match spotify::auth::login(shared_state, recent).await {
        Ok(pair) => {
            let Some(refresh_token) = pair.refresh_token else {
                error!("Spotify did not return a refresh token. Please try again.");
            };
            success!("Authentication successful!");
            info!("Add this line to your .env to use the account without a browser session:");
            println!("SPOTIFY_REFRESH_TOKEN={}", refresh_token);
        }
        Err(e) => error!("Authentication failed: {}", e),
    }
}

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table;

use crate::{cli::configured_session, error, info, utils, warning};

pub async fn now() {
    let (fetcher, store) = configured_session();

    let pb = ProgressBar::new_spinner();
    pb.set_message("Fetching current playback...");
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let result = fetcher.fetch_currently_playing(&store).await;
    pb.finish_and_clear();

    match result {
        Ok(Some(snapshot)) if snapshot.track.is_some() => {
            println!("{}", Table::new(vec![utils::playback_row(&snapshot)]));
        }
        Ok(_) => info!("Nothing is playing right now."),
        Err(e) if e.requires_login() => {
            error!("{}\nRun `nowplaying auth` and update SPOTIFY_REFRESH_TOKEN.", e)
        }
        Err(e) if e.is_transient() => warning!("Spotify is unavailable right now: {}", e),
        Err(e) => error!("{}", e),
    }
}

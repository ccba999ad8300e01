use std::{ops::ControlFlow, time::Duration};

use crate::{
    cli::configured_session, error, info, poller::Poller, types::PlaybackSnapshot, utils,
    warning,
};

/// What counts as a change worth printing.
fn playback_key(snapshot: &Option<PlaybackSnapshot>) -> Option<(Option<String>, String, bool)> {
    snapshot.as_ref().map(|s| {
        let track = s.track.as_ref();
        (
            track.and_then(|t| t.id.clone()),
            track.map(|t| t.name.clone()).unwrap_or_default(),
            s.is_playing,
        )
    })
}

pub async fn watch(interval: Duration) {
    let (fetcher, store) = configured_session();
    let poller = Poller::new(interval);
    info!(
        "Polling every {}s, press Ctrl+C to stop.",
        poller.period().as_secs_f32()
    );

    let mut last = None;
    let mut first = true;
    poller
        .run(
            || fetcher.fetch_currently_playing(&store),
            |result| {
                match result {
                    Ok(snapshot) => {
                        let key = playback_key(&snapshot);
                        if first || key != last {
                            match snapshot.as_ref().filter(|s| s.track.is_some()) {
                                Some(s) => {
                                    let row = utils::playback_row(s);
                                    info!("{} {} · {} [{}]", row.status, row.track, row.artists, row.progress);
                                }
                                None => info!("Nothing is playing."),
                            }
                            last = key;
                            first = false;
                        }
                    }
                    Err(e) if e.requires_login() => {
                        error!("{}\nRun `nowplaying auth` and update SPOTIFY_REFRESH_TOKEN.", e)
                    }
                    // transient failures are retried on the next tick
                    Err(e) => warning!("{}", e),
                }
                ControlFlow::Continue(())
            },
        )
        .await;
}

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, RngCore, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::types::{PlaybackSnapshot, PlaybackTableRow};

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque anti-forgery value for the `state` parameter of the authorize request.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Formats milliseconds as `M:SS`.
pub fn format_duration(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    format!("{minutes}:{seconds:02}")
}

/// Playback position as a percentage of the track length, capped at 100.
pub fn calculate_progress(progress_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    (progress_ms as f64 / duration_ms as f64 * 100.0).min(100.0)
}

pub fn playback_row(snapshot: &PlaybackSnapshot) -> PlaybackTableRow {
    let status = if snapshot.is_playing { "playing" } else { "paused" };
    let device = snapshot
        .device
        .as_ref()
        .map(|d| format!("{} ({})", d.name, d.kind))
        .unwrap_or_else(|| "-".to_string());

    match &snapshot.track {
        Some(track) => PlaybackTableRow {
            status: status.to_string(),
            track: track.name.clone(),
            artists: track.artist_names(),
            album: track.album.name.clone(),
            progress: format!(
                "{} / {} ({:.0}%)",
                format_duration(snapshot.progress_ms),
                format_duration(track.duration_ms),
                calculate_progress(snapshot.progress_ms, track.duration_ms)
            ),
            device,
        },
        None => PlaybackTableRow {
            status: status.to_string(),
            track: "-".to_string(),
            artists: "-".to_string(),
            album: "-".to_string(),
            progress: format_duration(snapshot.progress_ms),
            device,
        },
    }
}

use axum::{
    extract::State,
    response::{Html, Json},
};
use serde_json::{Value, json};

use crate::{config::DisplaySettings, server::AppState};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /api/settings`.
pub async fn settings(State(state): State<AppState>) -> Json<DisplaySettings> {
    Json(state.settings.display.clone())
}

/// `GET /`: the now-playing page.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.settings.display))
}

const SCRIPT: &str = r#"
const fmt = (ms) => `${Math.floor(ms / 60000)}:${String(Math.floor((ms % 60000) / 1000)).padStart(2, '0')}`;
const root = document.getElementById('now-playing');

async function poll() {
  let res;
  try {
    res = await fetch('/api/currently-playing', { cache: 'no-store' });
  } catch (_) {
    return render(null);
  }
  if (res.status === 401) {
    window.location.href = '/auth/login';
    return;
  }
  const data = await res.json().catch(() => null);
  render(data && data.track ? data : null);
}

function render(data) {
  if (!data) {
    root.innerHTML = '';
    const p = document.createElement('p');
    p.className = 'offline';
    p.textContent = SETTINGS.offline_message;
    root.appendChild(p);
    return;
  }
  const t = data.track;
  root.innerHTML = '';
  if (SETTINGS.show_album_art && t.album.images.length) {
    const img = document.createElement('img');
    img.src = t.album.images[0].url;
    img.alt = t.album.name;
    root.appendChild(img);
  }
  const title = document.createElement('h2');
  title.textContent = (data.isPlaying ? '▶ ' : '⏸ ') + t.name;
  root.appendChild(title);
  const artists = document.createElement('p');
  artists.textContent = t.artists.map((a) => a.name).join(', ') + ' · ' + t.album.name;
  root.appendChild(artists);
  if (SETTINGS.show_progress) {
    const progress = document.createElement('p');
    progress.textContent = `${fmt(data.progress)} / ${fmt(t.duration_ms)}`;
    root.appendChild(progress);
  }
  if (SETTINGS.show_device && data.device) {
    const device = document.createElement('p');
    device.className = 'device';
    device.textContent = `on ${data.device.name} (${data.device.type})`;
    root.appendChild(device);
  }
}

poll();
setInterval(poll, SETTINGS.update_interval);
"#;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_page(display: &DisplaySettings) -> String {
    // `</` would end the inline script early
    let settings = serde_json::to_string(display)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    let title = escape_html(&display.title);

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; background: #121212; color: #fff; display: flex; justify-content: center; padding: 3rem 1rem; }}
main {{ max-width: 28rem; text-align: center; }}
img {{ width: 100%; border-radius: 0.5rem; }}
.offline, .device {{ color: #b3b3b3; }}
</style>
</head>
<body>
<main>
<h1>{title}</h1>
<section id="now-playing"></section>
<form method="post" action="/api/auth/logout" onsubmit="fetch(this.action, {{ method: 'POST' }}).then(() => location.reload()); return false;">
<button type="submit">Log out</button>
</form>
</main>
<script>const SETTINGS = {settings};</script>
<script>{SCRIPT}</script>
</body>
</html>
"#
    )
}

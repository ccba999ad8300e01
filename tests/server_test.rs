use std::time::Duration;

use reqwest::{Client, StatusCode, header, redirect::Policy};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

use nowplaying::{
    config::DisplaySettings,
    server::{AppState, ServerSettings, router},
    spotify::{auth::TokenAcquirer, player::NowPlayingFetcher},
    types::Credentials,
};

fn settings(client_id: Option<&str>) -> ServerSettings {
    ServerSettings {
        client_id: client_id.map(str::to_string),
        auth_url: "https://accounts.spotify.com/authorize".into(),
        redirect_uri: "http://127.0.0.1:3000/auth/callback".into(),
        scope: "user-read-currently-playing".into(),
        cookie_secure: false,
        safety_margin: Duration::from_secs(60),
        display: DisplaySettings::default(),
    }
}

/// Serves the router on an ephemeral port and returns its base URL.
async fn spawn(upstream: &MockServer, fallback: Option<&str>, client_id: Option<&str>) -> String {
    let credentials = client_id.map(|id| Credentials::new(id, "secret"));
    let state = AppState::new(
        TokenAcquirer::new(
            Client::new(),
            format!("{}/api/token", upstream.uri()),
            credentials,
        ),
        NowPlayingFetcher::new(Client::new(), &format!("{}/v1", upstream.uri())),
        fallback.map(str::to_string),
        settings(client_id),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn client() -> Client {
    Client::builder().redirect(Policy::none()).build().unwrap()
}

fn set_cookies(res: &reqwest::Response) -> Vec<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_health() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, None).await;

    let body: Value = client()
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["name"], "nowplaying");
}

#[tokio::test]
async fn test_currently_playing_without_session_asks_for_login() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, Some("id")).await;

    let res = client()
        .get(format!("{base}/api/currently-playing"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["loginUrl"], "/auth/login");
    assert_eq!(body["track"], Value::Null);
    assert_eq!(body["isPlaying"], false);
}

#[tokio::test]
async fn test_currently_playing_with_configured_refresh_token() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("refresh_token=R"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "A", "expires_in": 3600 })),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_playing": true,
            "progress_ms": 1000,
            "item": {
                "id": "t",
                "name": "Roygbiv",
                "duration_ms": 151000,
                "artists": [{ "id": "a", "name": "Boards of Canada" }],
                "album": { "id": "al", "name": "Music Has the Right to Children", "images": [] }
            },
            "device": null
        })))
        .expect(2)
        .mount(&upstream)
        .await;

    let base = spawn(&upstream, Some("R"), Some("id")).await;
    let client = client();

    // second request reuses the cached access token
    for _ in 0..2 {
        let res = client
            .get(format!("{base}/api/currently-playing"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["isPlaying"], true);
        assert_eq!(body["progress"], 1000);
        assert_eq!(body["track"]["name"], "Roygbiv");
        assert!(body.get("error").is_none());
    }
}

#[tokio::test]
async fn test_nothing_playing_is_offline_payload() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "A", "expires_in": 3600 })),
        )
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&upstream)
        .await;

    let base = spawn(&upstream, Some("R"), Some("id")).await;
    let body: Value = client()
        .get(format!("{base}/api/currently-playing"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        body,
        json!({ "track": null, "isPlaying": false, "progress": 0, "device": null })
    );
}

#[tokio::test]
async fn test_login_redirects_to_authorize_url() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, Some("my-client")).await;

    let res = client()
        .get(format!("{base}/auth/login?recent=true"))
        .send()
        .await
        .unwrap();

    assert!(res.status().is_redirection());
    let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://accounts.spotify.com/authorize?"));
    assert!(location.contains("client_id=my-client"));
    assert!(location.contains("code_challenge_method=S256"));
    assert!(location.contains("user-read-recently-played"));

    let cookies = set_cookies(&res);
    assert!(cookies.iter().any(|c| c.starts_with("spotify_auth_state=")));
    assert!(cookies.iter().any(|c| c.starts_with("spotify_code_verifier=")));
}

#[tokio::test]
async fn test_login_without_client_id_fails() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, None).await;

    let res = client()
        .get(format!("{base}/auth/login"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_callback_with_mismatched_state_is_refused() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, Some("id")).await;

    let res = client()
        .get(format!("{base}/auth/callback?code=C&state=forged"))
        .header(header::COOKIE, "spotify_auth_state=expected")
        .send()
        .await
        .unwrap();

    assert!(res.status().is_redirection());
    assert_eq!(res.headers()[header::LOCATION], "/?error=state_mismatch");
    assert!(upstream.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_token_callback_sets_session_cookies() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A",
            "refresh_token": "R",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let base = spawn(&upstream, None, Some("id")).await;
    let res = client()
        .post(format!("{base}/api/auth/callback"))
        .json(&json!({ "code": "C" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert!(cookies.iter().any(|c| c.starts_with("spotify_refresh_token=R")));
    assert!(cookies.iter().any(|c| c.starts_with("spotify_access_token=A")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_token_callback_requires_code() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, Some("id")).await;

    let res = client()
        .post(format!("{base}/api/auth/callback"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_settings_endpoint() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, None).await;

    let body: Value = client()
        .get(format!("{base}/api/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["update_interval"], 30000);
}

#[tokio::test]
async fn test_overlapping_cookie_requests_share_one_refresh() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("refresh_token=R"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "A", "expires_in": 3600 }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&upstream)
        .await;

    let base = spawn(&upstream, None, Some("id")).await;
    let client = client();
    let request = || {
        client
            .get(format!("{base}/api/currently-playing"))
            .header(header::COOKIE, "spotify_refresh_token=R")
            .send()
    };

    let (first, second) = tokio::join!(request(), request());
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);

    // both responses carry the refreshed access token back to the browser
    for res in [&first, &second] {
        assert!(
            set_cookies(res)
                .iter()
                .any(|c| c.starts_with("spotify_access_token=A"))
        );
    }
}

#[tokio::test]
async fn test_logout_expires_session_cookies() {
    let upstream = MockServer::start().await;
    let base = spawn(&upstream, None, Some("id")).await;

    let res = client()
        .post(format!("{base}/api/auth/logout"))
        .header(
            header::COOKIE,
            "spotify_refresh_token=R; spotify_access_token=A; spotify_access_token_expiry=1714568400",
        )
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    for name in [
        "spotify_refresh_token",
        "spotify_access_token",
        "spotify_access_token_expiry",
    ] {
        let cookie = cookies
            .iter()
            .find(|c| c.starts_with(&format!("{name}=")))
            .unwrap_or_else(|| panic!("no Set-Cookie for {name}"));
        assert!(cookie.contains("Max-Age=0"), "{cookie}");
    }

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
}

//! Persistence of session token material between requests.
//!
//! The token store itself is medium agnostic; this module maps a
//! [`StoredSession`] onto a key/value backend, in practice the HTTP-only
//! cookies of the browser talking to the server.

use std::{collections::HashMap, time::Duration};

use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::{DateTime, Utc};

use crate::types::StoredSession;

pub const REFRESH_TOKEN_KEY: &str = "spotify_refresh_token";
pub const ACCESS_TOKEN_KEY: &str = "spotify_access_token";
pub const ACCESS_TOKEN_EXPIRY_KEY: &str = "spotify_access_token_expiry";

/// Refresh tokens do not expire upstream; the cookie holding one does.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

pub trait SessionBackend {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str, ttl: Duration);
    fn delete(&mut self, key: &str);
}

/// Session stored in HTTP-only cookies.
#[derive(Debug, Clone)]
pub struct CookieSession {
    jar: CookieJar,
    secure: bool,
}

impl CookieSession {
    pub fn new(jar: CookieJar, secure: bool) -> Self {
        Self { jar, secure }
    }

    /// Returns the jar including every cookie written through this session,
    /// ready to be returned as part of a response.
    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

impl SessionBackend for CookieSession {
    fn get(&self, key: &str) -> Option<String> {
        self.jar
            .get(key)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) {
        let max_age = time::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        let cookie = Cookie::build((key.to_string(), value.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age)
            .build();
        self.jar = self.jar.clone().add(cookie);
    }

    fn delete(&mut self, key: &str) {
        let removal = Cookie::build((key.to_string(), ""))
            .path("/")
            .max_age(time::Duration::ZERO)
            .build();
        self.jar = self.jar.clone().add(removal);
    }
}

/// In-process backend, used by the terminal commands and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    entries: HashMap<String, (String, Duration)>,
}

impl MemorySession {
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).map(|(_, ttl)| *ttl)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionBackend for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|(value, _)| value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(key.to_string(), (value.to_string(), ttl));
    }

    fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Reads the session kept by `backend`, if it holds a refresh token.
///
/// An access token is only restored together with a parsable expiry.
/// Callers without a session fall back to the configured refresh token.
pub fn load(backend: &impl SessionBackend) -> Option<StoredSession> {
    let refresh_token = backend.get(REFRESH_TOKEN_KEY)?;
    let mut session = StoredSession::new(refresh_token);

    let expiry = backend
        .get(ACCESS_TOKEN_EXPIRY_KEY)
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    if let (Some(token), Some(expiry)) = (backend.get(ACCESS_TOKEN_KEY), expiry) {
        session.access_token = Some(token);
        session.access_token_expiry = Some(expiry);
    }

    Some(session)
}

/// Writes `session` to `backend`.
///
/// The access token cookies live exactly as long as the token is valid; a
/// stale or missing access token is deleted instead.
pub fn save(backend: &mut impl SessionBackend, session: &StoredSession, now: DateTime<Utc>) {
    backend.set(REFRESH_TOKEN_KEY, &session.refresh_token, REFRESH_TOKEN_TTL);

    let remaining = session
        .access_token_expiry
        .and_then(|expiry| (expiry - now).to_std().ok())
        .filter(|d| !d.is_zero());
    match (&session.access_token, session.access_token_expiry, remaining) {
        (Some(token), Some(expiry), Some(ttl)) => {
            backend.set(ACCESS_TOKEN_KEY, token, ttl);
            backend.set(ACCESS_TOKEN_EXPIRY_KEY, &expiry.timestamp().to_string(), ttl);
        }
        _ => {
            backend.delete(ACCESS_TOKEN_KEY);
            backend.delete(ACCESS_TOKEN_EXPIRY_KEY);
        }
    }
}

/// Removes every piece of session token material.
pub fn clear(backend: &mut impl SessionBackend) {
    backend.delete(REFRESH_TOKEN_KEY);
    backend.delete(ACCESS_TOKEN_KEY);
    backend.delete(ACCESS_TOKEN_EXPIRY_KEY);
}

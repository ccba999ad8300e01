use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    Res,
    error::Error,
    management::{Clock, SystemClock},
    spotify::auth::TokenAcquirer,
    types::{Grant, StoredSession, TokenPair},
};

/// Holds the token material of one authenticated session and refreshes the
/// access token lazily.
///
/// The session sits behind an async mutex that stays locked for the whole
/// refresh, so overlapping callers wait for a single refresh-token exchange
/// instead of racing their own.
pub struct TokenStore {
    acquirer: Arc<TokenAcquirer>,
    clock: Arc<dyn Clock>,
    safety_margin: TimeDelta,
    session: Mutex<Option<StoredSession>>,
}

impl TokenStore {
    /// Creates a store without token material, waiting for
    /// [`store_initial_tokens`](TokenStore::store_initial_tokens).
    pub fn new(acquirer: Arc<TokenAcquirer>) -> Self {
        Self {
            acquirer,
            clock: Arc::new(SystemClock),
            safety_margin: TimeDelta::seconds(60),
            session: Mutex::new(None),
        }
    }

    /// Rebuilds a store from previously persisted session material.
    pub fn restore(acquirer: Arc<TokenAcquirer>, session: StoredSession) -> Self {
        Self::new(acquirer).with_session(session)
    }

    /// Store backed by a configured refresh token only, or empty if `None`.
    pub fn with_refresh_token(acquirer: Arc<TokenAcquirer>, refresh_token: Option<String>) -> Self {
        match refresh_token {
            Some(token) => Self::restore(acquirer, StoredSession::new(token)),
            None => Self::new(acquirer),
        }
    }

    pub fn with_session(self, session: StoredSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            ..self
        }
    }

    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    pub fn with_safety_margin(self, margin: Duration) -> Self {
        Self {
            safety_margin: TimeDelta::from_std(margin).unwrap_or(TimeDelta::zero()),
            ..self
        }
    }

    /// Returns a valid access token, refreshing it first if it is stale.
    ///
    /// # Errors
    ///
    /// - `Error::NoRefreshToken` if the store holds no session
    /// - `Error::RefreshFailed` if the token endpoint rejects the refresh grant
    /// - any other acquirer error (configuration, timeout, malformed body) as is
    pub async fn get_valid_access_token(&self) -> Res<String> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(Error::NoRefreshToken)?;

        let now = self.clock.now();
        if let Some(token) = session.valid_access_token(now) {
            debug!("Using cached access token");
            return Ok(token.to_string());
        }

        debug!("Access token missing or stale, refreshing");
        let grant = Grant::RefreshToken {
            token: session.refresh_token.clone(),
        };
        let pair = self.acquirer.exchange(&grant).await.map_err(|e| match e {
            Error::ExchangeRejected { .. } => Error::RefreshFailed(Box::new(e)),
            other => other,
        })?;

        session.access_token_expiry = Some(self.expiry(now, pair.expires_in));
        session.access_token = Some(pair.access_token.clone());
        // absent means the current refresh token stays valid
        if let Some(rotated) = pair.refresh_token {
            session.refresh_token = rotated;
        }

        Ok(pair.access_token)
    }

    /// Starts a new session from an authorization-code exchange result.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingRefreshToken` if `pair` carries no refresh
    /// token; the store is left untouched in that case.
    pub async fn store_initial_tokens(&self, pair: TokenPair) -> Res<()> {
        let refresh_token = pair.refresh_token.ok_or(Error::MissingRefreshToken)?;
        let expiry = self.expiry(self.clock.now(), pair.expires_in);

        *self.session.lock().await = Some(StoredSession {
            refresh_token,
            access_token: Some(pair.access_token),
            access_token_expiry: Some(expiry),
        });
        Ok(())
    }

    /// Drops the cached access token so the next request refreshes it.
    pub async fn invalidate_access_token(&self) {
        if let Some(session) = self.session.lock().await.as_mut() {
            session.access_token = None;
            session.access_token_expiry = None;
        }
    }

    /// Drops the cached access token only if it is still `rejected`.
    ///
    /// Another caller may already have replaced the rejected token while
    /// this one was waiting on upstream; that replacement stays.
    pub async fn invalidate_rejected(&self, rejected: &str) {
        if let Some(session) = self.session.lock().await.as_mut() {
            if session.access_token.as_deref() == Some(rejected) {
                session.access_token = None;
                session.access_token_expiry = None;
            }
        }
    }

    /// Destroys all token material.
    pub async fn clear(&self) {
        *self.session.lock().await = None;
    }

    /// Copy of the current session, for persisting it elsewhere.
    pub async fn snapshot(&self) -> Option<StoredSession> {
        self.session.lock().await.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn expiry(&self, issued_at: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
        let lifetime = i64::try_from(expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        // a lifetime shorter than the margin is stale on arrival
        let valid_for = (lifetime - self.safety_margin).max(TimeDelta::zero());
        issued_at
            .checked_add_signed(valid_for)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::management::ManualClock;

    fn acquirer_without_credentials() -> Arc<TokenAcquirer> {
        Arc::new(TokenAcquirer::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/api/token",
            None,
        ))
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_empty_store_has_no_refresh_token() {
        let store = TokenStore::new(acquirer_without_credentials());
        assert!(matches!(
            store.get_valid_access_token().await,
            Err(Error::NoRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_store_initial_tokens_requires_refresh_token() {
        let store = TokenStore::new(acquirer_without_credentials());
        let result = store
            .store_initial_tokens(TokenPair {
                access_token: "A".into(),
                refresh_token: None,
                expires_in: 3600,
            })
            .await;
        assert!(matches!(result, Err(Error::MissingRefreshToken)));
        assert!(store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_initial_tokens_are_served_from_cache() {
        let clock = clock();
        let start = clock.now();
        let store = TokenStore::new(acquirer_without_credentials()).with_clock(clock.clone());
        store
            .store_initial_tokens(TokenPair {
                access_token: "A".into(),
                refresh_token: Some("R".into()),
                expires_in: 3600,
            })
            .await
            .unwrap();

        let session = store.snapshot().await.unwrap();
        assert_eq!(session.refresh_token, "R");
        assert_eq!(session.access_token.as_deref(), Some("A"));
        assert_eq!(
            session.access_token_expiry,
            Some(start + TimeDelta::seconds(3540))
        );

        // no credentials configured, so any refresh attempt would fail
        clock.advance(TimeDelta::seconds(3539));
        assert_eq!(store.get_valid_access_token().await.unwrap(), "A");
    }

    #[tokio::test]
    async fn test_stale_token_triggers_refresh() {
        let clock = clock();
        let store = TokenStore::new(acquirer_without_credentials()).with_clock(clock.clone());
        store
            .store_initial_tokens(TokenPair {
                access_token: "A".into(),
                refresh_token: Some("R".into()),
                expires_in: 3600,
            })
            .await
            .unwrap();

        clock.advance(TimeDelta::seconds(3541));
        assert!(matches!(
            store.get_valid_access_token().await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_keeps_refresh_token() {
        let store = TokenStore::new(acquirer_without_credentials());
        store
            .store_initial_tokens(TokenPair {
                access_token: "A".into(),
                refresh_token: Some("R".into()),
                expires_in: 3600,
            })
            .await
            .unwrap();

        store.invalidate_access_token().await;
        let session = store.snapshot().await.unwrap();
        assert_eq!(session.refresh_token, "R");
        assert_eq!(session.access_token, None);
        assert_eq!(session.access_token_expiry, None);

        store.clear().await;
        assert!(store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_rejected_spares_replacement() {
        let store = TokenStore::new(acquirer_without_credentials());
        store
            .store_initial_tokens(TokenPair {
                access_token: "A2".into(),
                refresh_token: Some("R".into()),
                expires_in: 3600,
            })
            .await
            .unwrap();

        // a caller that was refused "A" arrives after the swap to "A2"
        store.invalidate_rejected("A").await;
        assert_eq!(
            store.snapshot().await.unwrap().access_token.as_deref(),
            Some("A2")
        );

        store.invalidate_rejected("A2").await;
        let session = store.snapshot().await.unwrap();
        assert_eq!(session.access_token, None);
        assert_eq!(session.access_token_expiry, None);
        assert_eq!(session.refresh_token, "R");
    }

    #[tokio::test]
    async fn test_short_lifetime_is_stale_immediately() {
        let clock = clock();
        let start = clock.now();
        let store = TokenStore::new(acquirer_without_credentials())
            .with_clock(clock)
            .with_safety_margin(Duration::from_secs(60));
        store
            .store_initial_tokens(TokenPair {
                access_token: "A".into(),
                refresh_token: Some("R".into()),
                expires_in: 30,
            })
            .await
            .unwrap();

        let session = store.snapshot().await.unwrap();
        assert_eq!(session.access_token_expiry, Some(start));
        assert_eq!(session.valid_access_token(start), None);
    }
}

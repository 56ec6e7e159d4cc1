use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::error::RenewalError;
use super::renewal::{RenewalCoordinator, RenewalResult, RenewalRole};
use crate::config::{resolve_url, AuthConfig, ConfigError};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::token::{decode_claims, TokenClaims};
use crate::store::{StoreError, TokenStore};

/// The current bearer token and the claims decoded from it.
#[derive(Debug, Clone, Default)]
struct Session {
    token: Option<String>,
    claims: Option<TokenClaims>,
}

impl Session {
    fn from_token(token: String) -> Self {
        let claims = decode_claims(&token).ok();
        Session {
            token: Some(token),
            claims,
        }
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

enum Refresh {
    Renewed,
    /// The session already moved past the token the renewal was asked for.
    Superseded,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Owner of the bearer token shared by every request issued through one client.
///
/// Cloning is cheap and every clone sees the same session. The token is
/// mirrored into the [`TokenStore`] on every change; the session lock is held
/// while the store is written so readers never see an unpersisted token.
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: Url,
    logout_url: Url,
    config: AuthConfig,
    store: Arc<dyn TokenStore>,
    store_key: String,
    session: RwLock<Session>,
    coordinator: RenewalCoordinator,
    metrics: Metrics,
}

impl AuthState {
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        config: &AuthConfig,
        store: Arc<dyn TokenStore>,
        store_key: &str,
        metrics: Metrics,
    ) -> Result<Self, ConfigError> {
        let refresh_url = resolve_url(base_url, &config.refresh_path)?;
        let logout_url = resolve_url(base_url, &config.logout_path)?;
        debug!(
            "Token renewal via '{}', logout via '{}' using '{}' store",
            refresh_url,
            logout_url,
            store.name()
        );

        Ok(AuthState {
            inner: Arc::new(Inner {
                http,
                refresh_url,
                logout_url,
                config: config.clone(),
                store,
                store_key: store_key.to_string(),
                session: RwLock::new(Session::default()),
                coordinator: RenewalCoordinator::new(),
                metrics,
            }),
        })
    }

    /// Loads the persisted token, if any, into the session. Returns whether
    /// one was found. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<bool, StoreError> {
        let persisted = self.inner.store.get(&self.inner.store_key).await?;
        let Some(token) = persisted.filter(|t| !t.is_empty()) else {
            debug!("No persisted token; starting unauthenticated");
            return Ok(false);
        };

        let session = Session::from_token(token);
        match &session.claims {
            Some(claims) if claims.is_expired_at(Utc::now().timestamp(), 0) => {
                info!("Persisted token has expired; it will be renewed on first use");
            }
            Some(_) => debug!("Restored persisted token"),
            None => warn!("Persisted token payload could not be decoded; renewal will fail"),
        }
        *self.inner.session.write().await = session;
        Ok(true)
    }

    /// Installs `token` as the bearer for all subsequent requests and persists it.
    ///
    /// The in-memory token is replaced even when persisting fails; the store
    /// error is returned so the caller can decide whether that matters.
    pub async fn set_tokens(&self, token: impl Into<String>) -> Result<(), StoreError> {
        let token = token.into();
        let mut session = self.inner.session.write().await;
        let persisted = self.inner.store.set(&self.inner.store_key, &token).await;
        *session = Session::from_token(token);
        drop(session);

        if let Err(e) = &persisted {
            error!(
                event_name = "auth.token.persist_failed",
                event_domain = "auth",
                store = self.inner.store.name(),
                "Failed to persist token: {}",
                e
            );
        }
        persisted
    }

    /// Ends the session locally. The server is told on a best-effort basis;
    /// whatever happens there, the token is gone from memory and from the
    /// store when this returns.
    pub async fn logout(&self) {
        let token = self.access_token().await;
        let server_result = self.notify_logout(token.as_deref()).await;
        self.inner.metrics.record_logout(server_result);

        let mut session = self.inner.session.write().await;
        *session = Session::default();
        if let Err(e) = self.inner.store.remove(&self.inner.store_key).await {
            warn!("Failed to remove persisted token during logout: {}", e);
        }
        drop(session);

        info!(
            event_name = "auth.logout",
            event_domain = "auth",
            server_result,
            "session cleared"
        );
    }

    async fn notify_logout(&self, token: Option<&str>) -> &'static str {
        let mut request = self.inner.http.post(self.inner.logout_url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        match timeout(self.inner.config.logout_timeout(), request.send()).await {
            Ok(Ok(response)) if response.status().is_success() => "acknowledged",
            Ok(Ok(response)) => {
                debug!("Logout endpoint answered {}; ignoring", response.status());
                "rejected"
            }
            Ok(Err(e)) => {
                debug!("Logout endpoint unreachable; ignoring: {}", e);
                "unreachable"
            }
            Err(_) => {
                debug!("Logout endpoint timed out; ignoring");
                "timeout"
            }
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.read().await.token().is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.session.read().await.token().map(str::to_string)
    }

    /// Subject of the current token, from the cached claims.
    pub async fn subject(&self) -> Option<String> {
        let session = self.inner.session.read().await;
        session.claims.as_ref().map(|c| c.sub.clone())
    }

    pub async fn claims(&self) -> Option<TokenClaims> {
        self.inner.session.read().await.claims.clone()
    }

    pub fn is_renewing(&self) -> bool {
        self.inner.coordinator.is_renewing()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Obtains a new token from the refresh endpoint, at most once for any
    /// number of concurrent callers. Any failure ends the session.
    pub async fn renew_token(&self) -> Result<(), RenewalError> {
        self.renew(None).await
    }

    /// With `expected` set, the renewal is skipped if the session no longer
    /// holds that token once the renewal actually starts.
    async fn renew(&self, expected: Option<String>) -> Result<(), RenewalError> {
        let state = self.clone();
        let (role, result) = self
            .inner
            .coordinator
            .run(move || state.renew_and_settle(expected).boxed())
            .await;
        if role == RenewalRole::Waiter {
            self.inner.metrics.record_renewal_join();
        }
        result
    }

    /// Renewal on behalf of a request that was rejected while carrying
    /// `used_token`. If the session has moved on since that request was sent,
    /// there is nothing to renew: if a token was installed or renewed
    /// meanwhile the request should be retried with it, and if the session
    /// ended the caller should give up.
    pub async fn renew_after_expiry(&self, used_token: Option<&str>) -> Result<(), RenewalError> {
        let current = self.access_token().await;
        match (used_token, current.as_deref()) {
            (_, None) => Err(RenewalError::NoToken),
            (Some(used), Some(current)) if used == current => {
                self.renew(Some(used.to_string())).await
            }
            _ => {
                debug!("Token changed while the request was in flight");
                Ok(())
            }
        }
    }

    async fn renew_and_settle(self, expected: Option<String>) -> RenewalResult {
        let started = Instant::now();
        let result = match self.refresh(expected.as_deref()).await {
            Ok(Refresh::Superseded) => {
                debug!("Token was renewed before this renewal started; nothing to do");
                return Ok(());
            }
            Ok(Refresh::Renewed) => Ok(()),
            Err(e) => Err(e),
        };

        let label = match &result {
            Ok(()) => "success",
            Err(e) => e.kind(),
        };
        self.inner.metrics.record_renewal(label);

        match &result {
            Ok(()) => info!(
                event_name = "auth.renewal.succeeded",
                event_domain = "auth",
                "access token renewed"
            ),
            Err(e) => {
                warn!(
                    event_name = "auth.renewal.failed",
                    event_domain = "auth",
                    reason = e.kind(),
                    "token renewal failed, ending session: {}",
                    e
                );
                self.logout().await;
            }
        }

        self.inner
            .metrics
            .record_renewal_duration(started.elapsed().as_secs_f64(), label);
        result
    }

    async fn refresh(&self, expected: Option<&str>) -> Result<Refresh, RenewalError> {
        let (token, subject) = {
            let session = self.inner.session.read().await;
            let token = session.token().ok_or(RenewalError::NoToken)?.to_string();
            if expected.is_some_and(|expected| expected != token) {
                return Ok(Refresh::Superseded);
            }
            let subject = match &session.claims {
                Some(claims) => claims.sub.clone(),
                None => {
                    decode_claims(&token)
                        .map_err(|e| RenewalError::InvalidToken(e.to_string()))?
                        .sub
                }
            };
            (token, subject)
        };

        let limit = self.inner.config.refresh_timeout();
        let new_token = timeout(limit, self.request_new_token(&token, &subject))
            .await
            .map_err(|_| RenewalError::Timeout {
                after_ms: limit.as_millis() as u64,
            })??;

        let claims = decode_claims(&new_token)
            .map_err(|e| RenewalError::InvalidToken(format!("refreshed token: {}", e)))?;
        if claims.is_expired_at(Utc::now().timestamp(), self.inner.config.expiry_leeway_in_secs) {
            return Err(RenewalError::InvalidToken(
                "refreshed token is already expired".to_string(),
            ));
        }

        if let Err(e) = self.set_tokens(new_token).await {
            warn!("Renewed token is in use but was not persisted: {}", e);
        }
        Ok(Refresh::Renewed)
    }

    async fn request_new_token(&self, token: &str, subject: &str) -> Result<String, RenewalError> {
        debug!("Requesting a new access token from '{}'", self.inner.refresh_url);

        let response = self
            .inner
            .http
            .post(self.inner.refresh_url.clone())
            .bearer_auth(token)
            .json(&RefreshRequest { user_id: subject })
            .send()
            .await
            .map_err(|e| RenewalError::RefreshTransport(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(RenewalError::RefreshRejected {
                status: response.status().as_u16(),
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RenewalError::RefreshTransport(format!("invalid refresh response: {}", e)))?;
        Ok(body.access_token)
    }
}

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::{ClientError, HttpFailure};
use crate::auth::AuthState;
use crate::config::{resolve_url, AuthConfig, ConfigError, ConfigV1};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::store::TokenStore;

/// Where a request is in its renew-and-retry cycle. Logged as `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Initial,
    AwaitingRenewal,
    Retried,
    Terminal,
}

enum Outcome {
    Success(Response),
    Failure(HttpFailure),
}

/// HTTP client that attaches the current bearer token to every request and
/// recovers from an expired token by renewing it and replaying the request
/// once.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    auth: AuthState,
    expired_status: u16,
    expired_code: String,
}

impl AuthClient {
    /// Builds the shared HTTP client, the auth state and the interceptor from config.
    pub fn new(
        config: &ConfigV1,
        store: Arc<dyn TokenStore>,
        metrics: Metrics,
    ) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.api.request_timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let base_url = config.api.base_url()?;
        let auth = AuthState::new(
            http.clone(),
            &base_url,
            &config.auth,
            store,
            &config.store.key,
            metrics,
        )?;
        Ok(Self::from_parts(http, base_url, auth, &config.auth))
    }

    pub fn from_parts(
        http: reqwest::Client,
        base_url: Url,
        auth: AuthState,
        config: &AuthConfig,
    ) -> Self {
        AuthClient {
            http,
            base_url,
            auth,
            expired_status: config.expired_status,
            expired_code: config.expired_code.clone(),
        }
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        resolve_url(&self.base_url, path).map_err(|e| ClientError::InvalidRequest(e.to_string()))
    }

    /// Starts a request against the API. Finish it with [`AuthClient::send`]
    /// rather than `RequestBuilder::send` to get authentication.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = build(self.request(Method::GET, path)?)?;
        decode(self.send(request).await?).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = build(self.request(Method::POST, path)?.json(body))?;
        decode(self.send(request).await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let request = build(self.request(Method::DELETE, path)?)?;
        self.send(request).await.map(|_| ())
    }

    /// Sends `request` with the current bearer token.
    ///
    /// A failure carrying the expired-token signal triggers one renewal and
    /// one replay. A request whose body cannot be cloned is renewed for but
    /// not replayed. If renewal fails the original failure is returned; if the
    /// replay fails the same way it is returned as
    /// [`ClientError::RetryExhausted`] and never retried again. Every other
    /// failure passes through unchanged.
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let span = info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            url = %request.url()
        );
        self.send_with_renewal(request).instrument(span).await
    }

    async fn send_with_renewal(&self, request: Request) -> Result<Response, ClientError> {
        // Holding the replay copy is what limits a request to a single retry.
        // Streaming bodies cannot be cloned; such requests are never replayed.
        let replay = request.try_clone();
        let used_token = self.auth.access_token().await;

        debug!(
            phase = ?RequestPhase::Initial,
            authenticated = used_token.is_some(),
            replayable = replay.is_some(),
            "sending request"
        );
        let failure = match self.dispatch(request, used_token.as_deref()).await? {
            Outcome::Success(response) => return Ok(response),
            Outcome::Failure(failure) => failure,
        };
        if !failure.is_token_expired(self.expired_status, &self.expired_code) {
            debug!(phase = ?RequestPhase::Terminal, status = failure.status.as_u16(), "request failed");
            return Err(ClientError::Status(failure));
        }

        let metrics = self.auth.metrics();
        debug!(phase = ?RequestPhase::AwaitingRenewal, "token expired, renewing before retry");
        let renewal = self.auth.renew_after_expiry(used_token.as_deref()).await;

        // The renewed token still serves later requests.
        let Some(replay) = replay else {
            warn!(
                renewed = renewal.is_ok(),
                "Token expired on a request whose body cannot be replayed"
            );
            metrics.record_retry("not_replayable");
            return Err(ClientError::Status(failure));
        };

        if let Err(e) = renewal {
            debug!(
                phase = ?RequestPhase::Terminal,
                reason = e.kind(),
                "renewal failed, returning the original failure"
            );
            metrics.record_retry("renewal_failed");
            return Err(ClientError::Status(failure));
        }

        let token = self.auth.access_token().await;
        debug!(phase = ?RequestPhase::Retried, "replaying request with renewed token");
        match self.dispatch(replay, token.as_deref()).await? {
            Outcome::Success(response) => {
                metrics.record_retry("succeeded");
                Ok(response)
            }
            Outcome::Failure(second) if second.is_token_expired(self.expired_status, &self.expired_code) => {
                warn!("Request rejected as expired again right after renewal; giving up");
                metrics.record_retry("exhausted");
                Err(ClientError::RetryExhausted(second))
            }
            Outcome::Failure(second) => {
                metrics.record_retry("failed");
                Err(ClientError::Status(second))
            }
        }
    }

    /// Executes `request` with its Authorization header overwritten by `token`.
    async fn dispatch(&self, mut request: Request, token: Option<&str>) -> Result<Outcome, ClientError> {
        match token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                    ClientError::InvalidRequest("token is not a valid header value".to_string())
                })?;
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            None => {
                request.headers_mut().remove(AUTHORIZATION);
            }
        }

        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(Outcome::Success(response));
        }
        let body = response.text().await?;
        Ok(Outcome::Failure(HttpFailure::new(status, body)))
    }
}

pub(crate) fn build(builder: RequestBuilder) -> Result<Request, ClientError> {
    builder
        .build()
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

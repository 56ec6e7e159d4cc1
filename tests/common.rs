#![allow(dead_code)]

use std::sync::Arc;

use authrelay::client::AuthClient;
use authrelay::config::{load_config_str, ConfigV1};
use authrelay::metrics::Metrics;
use authrelay::store::{MemoryStore, TokenStore};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;

pub const TOKEN_KEY: &str = "accessToken";

#[derive(Debug, Serialize)]
struct Claims<'a> {
    sub: &'a str,
    iat: i64,
    exp: i64,
    jti: String,
}

/// A signed HS256 token for `sub`, valid for `ttl_secs` (negative = already expired).
/// Every call yields a distinct token.
pub fn mint_token(sub: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub,
        iat: now,
        exp: now + ttl_secs,
        jti: uuid::Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"server-side-secret"),
    )
    .expect("token should encode")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// The resource server's "token expired" error body.
pub fn expired_body() -> String {
    json!({"code": "AUTH_002", "message": "access token expired"}).to_string()
}

pub fn refreshed_body(token: &str) -> String {
    json!({"accessToken": token}).to_string()
}

pub fn test_config(base_url: &str) -> ConfigV1 {
    load_config_str(&format!(
        r#"
version: "1.0.0"
api:
  base_url: "{}"
  request_timeout_in_ms: 2000
auth:
  refresh_timeout_in_ms: 1000
  logout_timeout_in_ms: 200
logging:
  level: debug
  format: json
"#,
        base_url
    ))
    .expect("test config should parse")
}

pub fn build_client(base_url: &str) -> (AuthClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client = AuthClient::new(&test_config(base_url), store.clone(), Metrics::new())
        .expect("client should build");
    (client, store)
}

/// A client whose persisted token is `token`, loaded the way the binary does it.
pub async fn signed_in_client(base_url: &str, token: &str) -> (AuthClient, Arc<MemoryStore>) {
    let (client, store) = build_client(base_url);
    store.set(TOKEN_KEY, token).await.expect("seed token");
    assert!(client.auth().initialize().await.expect("initialize"));
    (client, store)
}

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// A response that came back with a non-success status.
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: StatusCode,
    /// The application error code carried in the JSON body (`{"code": ...}`).
    pub code: Option<String>,
    pub body: String,
}

impl HttpFailure {
    pub fn new(status: StatusCode, body: String) -> Self {
        let code = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string));
        HttpFailure { status, code, body }
    }

    /// Does this failure carry the "token expired, renew and retry" signal?
    pub fn is_token_expired(&self, expired_status: u16, expired_code: &str) -> bool {
        self.status.as_u16() == expired_status && self.code.as_deref() == Some(expired_code)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a failure we do not recover from. This is
    /// also how an expired token surfaces when its renewal failed.
    #[error("request failed with status {}", .0.status)]
    Status(HttpFailure),
    /// The request was replayed once with a renewed token and still got the
    /// expired-token signal.
    #[error("request still rejected with status {} after token renewal", .0.status)]
    RetryExhausted(HttpFailure),
    /// No response at all.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        self.failure().map(|f| f.status)
    }

    pub fn failure(&self) -> Option<&HttpFailure> {
        match self {
            ClientError::Status(f) | ClientError::RetryExhausted(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_json_body() {
        let failure = HttpFailure::new(
            StatusCode::UNAUTHORIZED,
            r#"{"code":"AUTH_002","message":"expired"}"#.to_string(),
        );
        assert_eq!(failure.code.as_deref(), Some("AUTH_002"));
        assert!(failure.is_token_expired(401, "AUTH_002"));
        assert!(!failure.is_token_expired(401, "AUTH_001"));
    }

    #[test]
    fn non_json_or_codeless_bodies_have_no_code() {
        let html = HttpFailure::new(StatusCode::UNAUTHORIZED, "<html/>".to_string());
        assert_eq!(html.code, None);
        assert!(!html.is_token_expired(401, "AUTH_002"));

        let numeric = HttpFailure::new(StatusCode::UNAUTHORIZED, r#"{"code":2}"#.to_string());
        assert_eq!(numeric.code, None);
    }

    #[test]
    fn status_matters_as_much_as_code() {
        let forbidden = HttpFailure::new(StatusCode::FORBIDDEN, r#"{"code":"AUTH_002"}"#.to_string());
        assert!(!forbidden.is_token_expired(401, "AUTH_002"));
    }
}

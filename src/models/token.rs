use std::collections::HashMap;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::utils::value::value_to_string;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has no payload segment")]
    MissingPayload,
    #[error("token payload is not valid base64url: {0}")]
    Base64(String),
    #[error("token payload is not valid JSON: {0}")]
    Json(String),
    #[error("token payload has no subject")]
    MissingSubject,
}

/// Claims read from the payload segment of a bearer token.
///
/// The signature is never checked: the client only trusts tokens it received
/// from its own server, and only needs the subject to ask for a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl TokenClaims {
    /// True when `exp` is present and lies before `now - leeway_secs`.
    /// Tokens without an `exp` claim never count as expired.
    pub fn is_expired_at(&self, now: i64, leeway_secs: i64) -> bool {
        match self.exp {
            Some(exp) => exp.saturating_add(leeway_secs) < now,
            None => false,
        }
    }
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or(TokenError::MissingPayload)?;

    // Servers differ on whether they pad the segment.
    let bytes = if segment.ends_with('=') {
        URL_SAFE.decode(segment)
    } else {
        URL_SAFE_NO_PAD.decode(segment)
    }
    .map_err(|e| TokenError::Base64(e.to_string()))?;

    let mut payload: HashMap<String, Value> =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Json(e.to_string()))?;

    // Some issuers emit numeric subjects; keep them as their string form.
    let sub = match payload.remove("sub") {
        Some(Value::Null) | None => return Err(TokenError::MissingSubject),
        Some(v) => value_to_string(v),
    };
    if sub.is_empty() {
        return Err(TokenError::MissingSubject);
    }
    let exp = payload.remove("exp").and_then(|v| v.as_i64());

    Ok(TokenClaims {
        sub,
        exp,
        extra: payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with_payload(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn decodes_subject_and_expiry() {
        let token = token_with_payload(&json!({"sub": "user-42", "exp": 1_900_000_000, "role": "admin"}));
        let claims = decode_claims(&token).expect("claims should decode");

        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(claims.extra.get("role"), Some(&json!("admin")));
    }

    #[test]
    fn numeric_subject_is_stringified() {
        let token = token_with_payload(&json!({"sub": 1234}));
        assert_eq!(decode_claims(&token).unwrap().sub, "1234");
    }

    #[test]
    fn padded_segments_are_accepted() {
        let header = URL_SAFE.encode(br#"{"alg":"none"}"#);
        let body = URL_SAFE.encode(br#"{"sub":"abc"}"#);
        assert!(body.ends_with('='), "fixture should carry padding");

        let claims = decode_claims(&format!("{}.{}.", header, body)).unwrap();
        assert_eq!(claims.sub, "abc");
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(decode_claims("opaque"), Err(TokenError::MissingPayload));
        assert_eq!(decode_claims("a..c"), Err(TokenError::MissingPayload));
        assert!(matches!(decode_claims("a.!!!.c"), Err(TokenError::Base64(_))));

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(decode_claims(&not_json), Err(TokenError::Json(_))));

        let no_sub = token_with_payload(&json!({"exp": 10}));
        assert_eq!(decode_claims(&no_sub), Err(TokenError::MissingSubject));
    }

    #[test]
    fn expiry_honours_leeway() {
        let claims = TokenClaims {
            sub: "u".into(),
            exp: Some(1_000),
            extra: HashMap::new(),
        };
        assert!(!claims.is_expired_at(999, 0));
        assert!(!claims.is_expired_at(1_020, 30));
        assert!(claims.is_expired_at(1_031, 30));

        let no_exp = TokenClaims { exp: None, ..claims };
        assert!(!no_exp.is_expired_at(i64::MAX, 0));
    }
}

//! Payload inspection for JWT-shaped access tokens.
//!
//! Nothing here verifies a signature. The provider already authenticated
//! the token grant; these helpers only read claims back out for display
//! and expiry bookkeeping.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("token is not three dot-separated segments")]
    Malformed,
    #[error("token payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shape check only: three non-empty dot-separated segments.
pub fn has_jwt_shape(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}

/// Decode the claims object out of a token, without verification.
pub fn decode_access_token(token: &str) -> Result<serde_json::Value, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_header, payload, _signature] = segments.as_slice() else {
        return Err(DecodeError::Malformed);
    };
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DecodeError::Malformed);
    }

    let decoded = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&decoded)?)
}

/// The `sub` claim, or `None` when the token does not decode.
pub fn identity_id_from_token(token: &str) -> Option<String> {
    decode_access_token(token)
        .ok()?
        .get("sub")?
        .as_str()
        .map(str::to_owned)
}

/// The `exp` claim in epoch milliseconds, when one decodes.
pub fn token_expiration_millis(token: &str) -> Option<i64> {
    decode_access_token(token)
        .ok()?
        .get("exp")?
        .as_f64()
        .map(|exp| (exp * 1000.0) as i64)
}

/// Whether the token's `exp` claim has passed.
///
/// A token without an `exp` claim never expires here. A token that does
/// not decode at all counts as expired.
pub fn is_token_expired(token: &str) -> bool {
    let claims = match decode_access_token(token) {
        Ok(claims) => claims,
        Err(_) => return true,
    };

    match claims.get("exp").and_then(|exp| exp.as_f64()) {
        Some(exp) => (exp * 1000.0) as i64 <= chrono::Utc::now().timestamp_millis(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(claims: serde_json::Value) -> String {
        let header =
            URL_SAFE_NO_PAD.encode(serde_json::json!({"alg": "RS256", "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decodes_the_payload_claims() {
        let token = make_token(serde_json::json!({"sub": "user-1", "exp": 1735689600}));
        let claims = decode_access_token(&token).unwrap();
        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["exp"], 1735689600);
    }

    #[test]
    fn rejects_tokens_without_three_segments() {
        for bad in ["", "abc", "a.b", "a.b.c.d", "..", "a..c", ".b.c"] {
            assert!(
                matches!(decode_access_token(bad), Err(DecodeError::Malformed)),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn rejects_payloads_that_are_not_base64url() {
        assert!(matches!(
            decode_access_token("aaaa.!!!!.cccc"),
            Err(DecodeError::Base64(_))
        ));
    }

    #[test]
    fn rejects_payloads_that_are_not_json() {
        let payload = URL_SAFE_NO_PAD.encode("not json at all");
        let token = format!("aaaa.{payload}.cccc");
        assert!(matches!(
            decode_access_token(&token),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn shape_check_matches_the_decoder() {
        assert!(has_jwt_shape("a.b.c"));
        assert!(!has_jwt_shape("a.b"));
        assert!(!has_jwt_shape("a..c"));
        assert!(!has_jwt_shape("not-a-jwt"));
    }

    #[test]
    fn extracts_the_subject() {
        let token = make_token(serde_json::json!({"sub": "user-42"}));
        assert_eq!(identity_id_from_token(&token), Some("user-42".to_string()));
    }

    #[test]
    fn subject_is_none_when_missing_or_undecodable() {
        let token = make_token(serde_json::json!({"aud": "console"}));
        assert_eq!(identity_id_from_token(&token), None);
        assert_eq!(identity_id_from_token("garbage"), None);
    }

    #[test]
    fn future_exp_is_not_expired() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = make_token(serde_json::json!({"exp": exp}));
        assert!(!is_token_expired(&token));
        assert_eq!(token_expiration_millis(&token), Some(exp * 1000));
    }

    #[test]
    fn past_exp_is_expired() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = make_token(serde_json::json!({"exp": exp}));
        assert!(is_token_expired(&token));
    }

    #[test]
    fn missing_exp_never_expires() {
        let token = make_token(serde_json::json!({"sub": "user-1"}));
        assert!(!is_token_expired(&token));
        assert_eq!(token_expiration_millis(&token), None);
    }

    #[test]
    fn undecodable_tokens_count_as_expired() {
        assert!(is_token_expired("three.bad.parts"));
        assert!(is_token_expired("opaque-token"));
    }
}

//! Token state sealed into the session cookie.
//!
//! The service keeps no server-side session store; everything a request
//! needs rides in the encrypted cookie.

use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::info;

use crate::cookies::{Cookie, CookieJar};
use crate::jwt;

pub const SESSION_COOKIE_NAME: &str = "auth_session";

pub const SESSION_DURATION_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Subject claim captured from the access token at creation time
    pub identity_id: Option<String>,
    /// Epoch milliseconds, when the provider reported `expires_in`
    pub expires_at: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session cookie failed the seal check")]
    Seal,
    #[error("session cookie held invalid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl Session {
    /// A session is usable while its token still is: the access token is
    /// present, the recorded expiry has not passed, and the token's own
    /// `exp` claim (when one decodes) has not passed either.
    pub fn is_valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }

        let now = chrono::Utc::now().timestamp_millis();
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return false;
            }
        }

        // Opaque tokens carry no exp claim and fall through to valid.
        match jwt::token_expiration_millis(&self.access_token) {
            Some(exp) => exp > now,
            None => true,
        }
    }

    /// Expiry in epoch milliseconds, preferring the provider-reported
    /// lifetime over the token's own `exp` claim.
    pub fn effective_expiry_millis(&self) -> Option<i64> {
        self.expires_at
            .or_else(|| jwt::token_expiration_millis(&self.access_token))
    }
}

/// Seal a new session into the cookie jar.
///
/// The identity id comes from the token's `sub` claim when one decodes;
/// a token that does not parse still gets a session.
pub fn create_session(
    cookies: &CookieJar,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in: Option<i64>,
) -> color_eyre::Result<Session> {
    let identity_id = jwt::identity_id_from_token(access_token);
    let expires_at = expires_in.map(|secs| chrono::Utc::now().timestamp_millis() + secs * 1000);

    let session = Session {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_owned),
        identity_id,
        expires_at,
    };

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, serde_json::to_string(&session)?);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_secure(std::env::var("PROTO").ok() == Some("https".to_owned()));
    cookie.set_max_age(Duration::days(SESSION_DURATION_DAYS));
    cookies.add(cookie);

    Ok(session)
}

/// Read the session back out of the jar.
///
/// `Ok(None)` means no session cookie rode in. An error means a cookie is
/// present but cannot be trusted, either because the seal check failed or
/// because the payload no longer parses; callers treat that as signed out
/// and clear the cookie.
pub fn get_session(cookies: &CookieJar) -> Result<Option<Session>, SessionError> {
    if !cookies.contains_raw(SESSION_COOKIE_NAME) {
        return Ok(None);
    }

    let cookie = cookies.get(SESSION_COOKIE_NAME).ok_or(SessionError::Seal)?;
    let session = serde_json::from_str(cookie.value())?;
    Ok(Some(session))
}

/// Remove the session cookie.
pub fn clear_session(cookies: &CookieJar) {
    cookies.remove_named(SESSION_COOKIE_NAME);
}

/// Whether a valid session rode in on this request.
pub fn is_session_valid(cookies: &CookieJar) -> bool {
    matches!(get_session(cookies), Ok(Some(session)) if session.is_valid())
}

/// Identity id from the session, clearing the cookie when it cannot be
/// read back.
pub fn identity_id_from_session(cookies: &CookieJar) -> Option<String> {
    match get_session(cookies) {
        Ok(Some(session)) => session.identity_id,
        Ok(None) => None,
        Err(err) => {
            info!("Clearing unreadable session cookie: {err}");
            clear_session(cookies);
            None
        }
    }
}

/// Elide the middle of a token for display.
pub fn token_preview(token: &str) -> String {
    const HEAD: usize = 12;
    const TAIL: usize = 6;

    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= HEAD + TAIL {
        return token.to_string();
    }

    let head: String = chars[..HEAD].iter().collect();
    let tail: String = chars[chars.len() - TAIL..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    fn make_token(claims: serde_json::Value) -> String {
        let header =
            URL_SAFE_NO_PAD.encode(serde_json::json!({"alg": "RS256", "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    fn session_with(access_token: &str, expires_at: Option<i64>) -> Session {
        Session {
            access_token: access_token.to_string(),
            refresh_token: None,
            identity_id: None,
            expires_at,
        }
    }

    #[test]
    fn session_with_a_passed_expiry_is_invalid() {
        let past = chrono::Utc::now().timestamp_millis() - 1000;
        assert!(!session_with("opaque-token", Some(past)).is_valid());
    }

    #[test]
    fn session_with_a_future_expiry_is_valid() {
        let future = chrono::Utc::now().timestamp_millis() + 60_000;
        assert!(session_with("opaque-token", Some(future)).is_valid());
    }

    #[test]
    fn session_without_expiry_information_is_valid() {
        assert!(session_with("opaque-token", None).is_valid());
    }

    #[test]
    fn session_without_an_access_token_is_invalid() {
        assert!(!session_with("", None).is_valid());
    }

    #[test]
    fn token_exp_claim_invalidates_the_session() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = make_token(serde_json::json!({"exp": exp}));
        assert!(!session_with(&token, None).is_valid());
    }

    #[test]
    fn recorded_expiry_wins_over_the_token_claim() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = make_token(serde_json::json!({"exp": exp}));
        let session = session_with(&token, Some(123));
        assert_eq!(session.effective_expiry_millis(), Some(123));
    }

    #[test]
    fn expiry_falls_back_to_the_token_claim() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = make_token(serde_json::json!({"exp": exp}));
        let session = session_with(&token, None);
        assert_eq!(session.effective_expiry_millis(), Some(exp * 1000));
    }

    #[test]
    fn long_tokens_are_elided_for_display() {
        let token = "abcdefghijklmnopqrstuvwxyz0123456789";
        let preview = token_preview(token);
        assert_eq!(preview, "abcdefghijkl...456789");
    }

    #[test]
    fn short_tokens_are_shown_whole() {
        assert_eq!(token_preview("short"), "short");
    }
}

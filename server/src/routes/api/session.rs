use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::cookies::CookieJar;
use crate::errors::{ApiError, ApiResult};
use crate::jwt;
use crate::oauth::token;
use crate::session::{self, Session};
use crate::state::AppState;

/// JSON envelope the session endpoints hand to the UI.
///
/// `identityId` is null for tokens without a `sub` claim; the payload and
/// expiry fields only appear when the token yields them.
pub(crate) fn session_envelope(session: &Session) -> serde_json::Value {
    let mut body = json!({
        "authenticated": true,
        "user": { "identityId": session.identity_id },
        "tokenPreview": session::token_preview(&session.access_token),
    });

    if let Ok(payload) = jwt::decode_access_token(&session.access_token) {
        body["tokenPayload"] = payload;
    }

    if let Some(expires_at) = session.effective_expiry_millis() {
        let now = chrono::Utc::now().timestamp_millis();
        body["expiresAt"] = json!(expires_at);
        body["expiresIn"] = json!(((expires_at - now) / 1000).max(0));
    }

    body
}

fn signed_out() -> Json<serde_json::Value> {
    Json(json!({ "authenticated": false, "user": null }))
}

/// Report the current session, clearing it when it can no longer be used.
pub async fn get_session(cookies: CookieJar) -> Json<serde_json::Value> {
    if !session::is_session_valid(&cookies) {
        if cookies.contains_raw(session::SESSION_COOKIE_NAME) {
            info!("Session can no longer be used, clearing");
            session::clear_session(&cookies);
        }
        return signed_out();
    }

    let Ok(Some(session)) = session::get_session(&cookies) else {
        return signed_out();
    };

    Json(session_envelope(&session))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Create a session from a caller-supplied token.
///
/// The token only has to look like a JWT; callers pasting in tokens they
/// got elsewhere still get a session, and expiry is enforced on read.
pub async fn create_session(
    cookies: CookieJar,
    Json(body): Json<CreateSessionBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if !jwt::has_jwt_shape(&body.access_token) {
        return Err(ApiError::InvalidTokenFormat);
    }

    let session = session::create_session(
        &cookies,
        &body.access_token,
        body.refresh_token.as_deref(),
        body.expires_in,
    )
    .map_err(ApiError::Internal)?;

    Ok(Json(session_envelope(&session)))
}

/// Destroy the session.
pub async fn delete_session(cookies: CookieJar) -> Json<serde_json::Value> {
    session::clear_session(&cookies);
    info!("Session deleted");
    signed_out()
}

/// Rotate the session's tokens with the provider.
pub async fn refresh_session(
    State(state): State<AppState>,
    cookies: CookieJar,
) -> ApiResult<Json<serde_json::Value>> {
    let session = match session::get_session(&cookies) {
        Ok(Some(session)) => session,
        _ => return Err(ApiError::NotAuthenticated),
    };

    let Some(refresh_token) = session.refresh_token else {
        return Err(ApiError::NoRefreshToken);
    };

    let Some(client_id) = state.client_id() else {
        return Err(ApiError::MissingClientId);
    };

    let tokens = token::refresh_access_token(
        &state,
        &refresh_token,
        &client_id,
        state.hydra.client_secret.as_deref(),
    )
    .await
    .map_err(ApiError::Transport)?
    .issued()?;

    // Providers may rotate the refresh token; keep the old one otherwise.
    let refreshed = session::create_session(
        &cookies,
        &tokens.access_token,
        tokens.refresh_token.as_deref().or(Some(&refresh_token)),
        tokens.expires_in,
    )
    .map_err(ApiError::Internal)?;

    info!("Session refreshed");
    Ok(Json(session_envelope(&refreshed)))
}

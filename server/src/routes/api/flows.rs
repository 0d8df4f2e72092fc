use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::cookies::CookieJar;
use crate::errors::{ApiError, ApiResult};
use crate::oauth::token::{self, DeviceAuthorization, TokenResponse};
use crate::session;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DeviceAuthorizeBody {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// Kick off a device authorization handshake (RFC 8628).
pub async fn device_authorize(
    State(state): State<AppState>,
    Json(body): Json<DeviceAuthorizeBody>,
) -> ApiResult<Json<DeviceAuthorization>> {
    let Some(client_id) = body.client_id.or_else(|| state.client_id()) else {
        return Err(ApiError::MissingClientId);
    };
    let client_secret = body
        .client_secret
        .or_else(|| state.hydra.client_secret.clone());
    let scope = body.scope.unwrap_or_else(|| state.hydra.scope.clone());

    let device = token::device_authorize(&state, &client_id, client_secret.as_deref(), Some(&scope))
        .await
        .map_err(ApiError::Transport)?
        .issued()?;

    info!(user_code = %device.user_code, "Device authorization started");
    Ok(Json(device))
}

#[derive(Debug, Deserialize)]
pub struct DeviceTokenBody {
    pub device_code: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Poll for the result of a device authorization.
///
/// `authorization_pending` and `slow_down` are mirrored back so the
/// caller keeps polling; issuance signs the user in.
pub async fn device_token(
    State(state): State<AppState>,
    cookies: CookieJar,
    Json(body): Json<DeviceTokenBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(client_id) = body.client_id.or_else(|| state.client_id()) else {
        return Err(ApiError::MissingClientId);
    };
    let client_secret = body
        .client_secret
        .or_else(|| state.hydra.client_secret.clone());

    let tokens = token::device_token(
        &state,
        &body.device_code,
        &client_id,
        client_secret.as_deref(),
    )
    .await
    .map_err(ApiError::Transport)?
    .issued()?;

    let session = session::create_session(
        &cookies,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
        tokens.expires_in,
    )
    .map_err(ApiError::Internal)?;

    let mut envelope = super::session::session_envelope(&session);
    envelope["tokens"] = serde_json::to_value(&tokens).map_err(|e| ApiError::Internal(e.into()))?;

    info!("Device authorization completed");
    Ok(Json(envelope))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientCredentialsBody {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// Service-to-service grant. Returns the raw token response and never
/// touches the session; there is no user to sign in.
pub async fn client_credentials(
    State(state): State<AppState>,
    Json(body): Json<ClientCredentialsBody>,
) -> ApiResult<Json<TokenResponse>> {
    let Some(client_id) = body.client_id.or_else(|| state.client_id()) else {
        return Err(ApiError::MissingClientId);
    };
    let Some(client_secret) = body
        .client_secret
        .or_else(|| state.hydra.client_secret.clone())
    else {
        return Err(ApiError::MissingClientSecret);
    };

    let tokens = token::client_credentials_token(
        &state,
        &client_id,
        &client_secret,
        body.scope.as_deref(),
    )
    .await
    .map_err(ApiError::Transport)?
    .issued()?;

    info!(%client_id, "Client credentials grant issued");
    Ok(Json(tokens))
}

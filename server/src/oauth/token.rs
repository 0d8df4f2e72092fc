//! Calls against the provider's token and device authorization endpoints.
//!
//! Client credentials go in the form body (`client_secret_post`); Hydra
//! accepts that for every grant here.

use color_eyre::eyre::WrapErr as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::state::AppState;

/// Successful grant from the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Error body the provider sends with a refused grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorBody {
    pub error: String,
    pub error_description: Option<String>,
}

/// Device authorization handshake response (RFC 8628).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
}

/// What the provider said: either the thing we asked for, or a refusal
/// with the status it used. Only transport faults are `Err`.
#[derive(Debug)]
pub enum Outcome<T> {
    Issued(T),
    Refused {
        status: StatusCode,
        error: TokenErrorBody,
    },
}

pub type TokenOutcome = Outcome<TokenResponse>;
pub type DeviceOutcome = Outcome<DeviceAuthorization>;

impl<T> Outcome<T> {
    /// The issued value, mapping a refusal to the mirrored API error.
    pub fn issued(self) -> Result<T, ApiError> {
        match self {
            Outcome::Issued(value) => Ok(value),
            Outcome::Refused { status, error } => Err(ApiError::Upstream {
                status,
                error: error.error,
                error_description: error.error_description,
            }),
        }
    }
}

pub struct ExchangeParams<'a> {
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub client_id: &'a str,
    pub client_secret: Option<&'a str>,
    pub code_verifier: &'a str,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code_for_token(
    state: &AppState,
    params: &ExchangeParams<'_>,
) -> color_eyre::Result<TokenOutcome> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", params.code),
        ("redirect_uri", params.redirect_uri),
        ("client_id", params.client_id),
        ("code_verifier", params.code_verifier),
    ];
    if let Some(secret) = params.client_secret {
        form.push(("client_secret", secret));
    }

    post_form(state, &state.hydra.token_url(), &form).await
}

/// Trade a refresh token for a fresh token set.
pub async fn refresh_access_token(
    state: &AppState,
    refresh_token: &str,
    client_id: &str,
    client_secret: Option<&str>,
) -> color_eyre::Result<TokenOutcome> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];
    if let Some(secret) = client_secret {
        form.push(("client_secret", secret));
    }

    post_form(state, &state.hydra.token_url(), &form).await
}

/// Service-to-service grant; no user involved.
pub async fn client_credentials_token(
    state: &AppState,
    client_id: &str,
    client_secret: &str,
    scope: Option<&str>,
) -> color_eyre::Result<TokenOutcome> {
    let mut form = vec![
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];
    if let Some(scope) = scope {
        form.push(("scope", scope));
    }

    post_form(state, &state.hydra.token_url(), &form).await
}

/// Start a device authorization handshake.
pub async fn device_authorize(
    state: &AppState,
    client_id: &str,
    client_secret: Option<&str>,
    scope: Option<&str>,
) -> color_eyre::Result<DeviceOutcome> {
    let mut form = vec![("client_id", client_id)];
    if let Some(secret) = client_secret {
        form.push(("client_secret", secret));
    }
    if let Some(scope) = scope {
        form.push(("scope", scope));
    }

    post_form(state, &state.hydra.device_auth_url(), &form).await
}

/// Poll the token endpoint for a device grant.
///
/// `authorization_pending` and `slow_down` come back as `Refused`, same
/// as a denial; the caller decides whether to keep polling.
pub async fn device_token(
    state: &AppState,
    device_code: &str,
    client_id: &str,
    client_secret: Option<&str>,
) -> color_eyre::Result<TokenOutcome> {
    let mut form = vec![
        ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
        ("device_code", device_code),
        ("client_id", client_id),
    ];
    if let Some(secret) = client_secret {
        form.push(("client_secret", secret));
    }

    post_form(state, &state.hydra.token_url(), &form).await
}

async fn post_form<T>(
    state: &AppState,
    url: &str,
    form: &[(&str, &str)],
) -> color_eyre::Result<Outcome<T>>
where
    T: serde::de::DeserializeOwned,
{
    let response = state
        .client
        .post(url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .wrap_err_with(|| format!("request to {url} failed"))?;

    let status = response.status();
    if status.is_success() {
        let body = response
            .json::<T>()
            .await
            .wrap_err("failed to parse token endpoint response")?;
        return Ok(Outcome::Issued(body));
    }

    let text = response.text().await.unwrap_or_default();
    tracing::error!(%status, body = %text, url, "Token endpoint refused the request");

    let error = serde_json::from_str::<TokenErrorBody>(&text).unwrap_or_else(|_| TokenErrorBody {
        error: "token_exchange_failed".to_string(),
        error_description: (!text.is_empty()).then(|| text.clone()),
    });

    Ok(Outcome::Refused { status, error })
}

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cookies::CookieJar;
use crate::errors::ServerResult;
use crate::oauth::pkce;
use crate::state::AppState;

use super::{
    error_redirect, CLIENT_ID_COOKIE, CLIENT_SECRET_COOKIE, REDIRECT_URI_COOKIE,
    RETURN_URL_COOKIE, STATE_COOKIE, VERIFIER_COOKIE,
};

/// Per-request overrides for the configured OAuth client. Empty strings
/// come in from HTML forms with blank fields and count as absent.
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub redirect_uri: Option<String>,
    pub prompt: Option<String>,
    /// Where to land after the callback completes
    pub return_url: Option<String>,
}

#[derive(Serialize)]
struct AuthUrlParams<'a> {
    client_id: &'a str,
    response_type: &'static str,
    scope: &'a str,
    redirect_uri: &'a str,
    state: &'a str,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Start the authorization code flow.
///
/// Generates the PKCE material and state token, stashes everything the
/// callback will need in sealed flow cookies, and redirects the browser
/// to the provider's authorization endpoint.
pub async fn authorize(
    State(state): State<AppState>,
    cookies: CookieJar,
    Query(params): Query<AuthorizeParams>,
) -> ServerResult<impl IntoResponse, StatusCode> {
    let Some(client_id) = non_empty(params.client_id).or_else(|| state.client_id()) else {
        info!("Authorization attempted without a client id");
        return Ok(error_redirect("missing_client_id", None).into_response());
    };

    let redirect_uri =
        non_empty(params.redirect_uri).unwrap_or_else(|| state.redirect_uri());
    let scope = non_empty(params.scope).unwrap_or_else(|| state.hydra.scope.clone());
    let return_url = non_empty(params.return_url).unwrap_or_else(|| "/".to_string());
    let prompt = non_empty(params.prompt);

    let verifier = pkce::generate_code_verifier();
    let challenge = pkce::generate_code_challenge(&verifier);
    let flow_state = pkce::generate_state();

    let url_params = AuthUrlParams {
        client_id: &client_id,
        response_type: "code",
        scope: &scope,
        redirect_uri: &redirect_uri,
        state: &flow_state,
        code_challenge: &challenge,
        code_challenge_method: "S256",
        prompt: prompt.as_deref(),
    };
    let query = serde_urlencoded::to_string(&url_params)?;
    let auth_url = format!("{}?{}", state.hydra.auth_url(), query);

    cookies.add_flow_cookie(STATE_COOKIE, flow_state);
    cookies.add_flow_cookie(VERIFIER_COOKIE, verifier);
    cookies.add_flow_cookie(CLIENT_ID_COOKIE, client_id.clone());
    cookies.add_flow_cookie(REDIRECT_URI_COOKIE, redirect_uri);
    cookies.add_flow_cookie(RETURN_URL_COOKIE, return_url);
    if let Some(secret) = non_empty(params.client_secret) {
        cookies.add_flow_cookie(CLIENT_SECRET_COOKIE, secret);
    }

    info!(%client_id, "Redirecting to the authorization endpoint");
    Ok(Redirect::to(&auth_url).into_response())
}

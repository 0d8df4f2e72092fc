use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::{error, info};

use crate::cookies::CookieJar;
use crate::errors::{ServerResult, WithRedirect as _};
use crate::oauth::token::{self, ExchangeParams, Outcome};
use crate::session;
use crate::state::AppState;

use super::{
    error_redirect, CLIENT_ID_COOKIE, CLIENT_SECRET_COOKIE, REDIRECT_URI_COOKIE,
    RETURN_URL_COOKIE, STATE_COOKIE, VERIFIER_COOKIE,
};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// One login attempt's worth of flow cookies.
struct FlowState {
    state: Option<String>,
    verifier: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    return_url: Option<String>,
}

fn take_flow_state(cookies: &CookieJar) -> FlowState {
    FlowState {
        state: cookies.take_flow_cookie(STATE_COOKIE),
        verifier: cookies.take_flow_cookie(VERIFIER_COOKIE),
        client_id: cookies.take_flow_cookie(CLIENT_ID_COOKIE),
        client_secret: cookies.take_flow_cookie(CLIENT_SECRET_COOKIE),
        redirect_uri: cookies.take_flow_cookie(REDIRECT_URI_COOKIE),
        return_url: cookies.take_flow_cookie(RETURN_URL_COOKIE),
    }
}

/// Handle the provider redirecting back to us.
///
/// Every failure lands on the login page with an error code in the query
/// string; only a fully validated exchange produces a session.
pub async fn callback(
    State(state): State<AppState>,
    cookies: CookieJar,
    Query(params): Query<CallbackParams>,
) -> ServerResult<impl IntoResponse, Redirect> {
    // Flow cookies are single-use: consume them before deciding anything.
    let flow = take_flow_state(&cookies);

    if let Some(provider_error) = params.error {
        info!(error = %provider_error, "Provider refused the authorization");
        return Ok(
            error_redirect(&provider_error, params.error_description.as_deref())
                .into_response(),
        );
    }

    let Some(code) = params.code else {
        return Ok(error_redirect("missing_code", None).into_response());
    };

    let state_matches = match (params.state.as_deref(), flow.state.as_deref()) {
        (Some(presented), Some(stored)) => presented == stored,
        _ => false,
    };
    if !state_matches {
        error!("State mismatch on OAuth callback, aborting");
        return Ok(error_redirect("invalid_state", None).into_response());
    }

    let Some(verifier) = flow.verifier else {
        return Ok(error_redirect("missing_verifier", None).into_response());
    };

    let Some(client_id) = flow.client_id.or_else(|| state.client_id()) else {
        return Ok(error_redirect("missing_client_id", None).into_response());
    };

    let redirect_uri = flow.redirect_uri.unwrap_or_else(|| state.redirect_uri());
    let client_secret = flow
        .client_secret
        .or_else(|| state.hydra.client_secret.clone());

    let outcome = token::exchange_code_for_token(
        &state,
        &ExchangeParams {
            code: &code,
            redirect_uri: &redirect_uri,
            client_id: &client_id,
            client_secret: client_secret.as_deref(),
            code_verifier: &verifier,
        },
    )
    .await
    .with_redirect(error_redirect("token_exchange_failed", None))?;

    let tokens = match outcome {
        Outcome::Issued(tokens) => tokens,
        Outcome::Refused { error, .. } => {
            return Ok(
                error_redirect(&error.error, error.error_description.as_deref())
                    .into_response(),
            );
        }
    };

    if tokens.access_token.is_empty() {
        return Ok(error_redirect("missing_access_token", None).into_response());
    }

    session::create_session(
        &cookies,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
        tokens.expires_in,
    )
    .with_redirect(error_redirect("session_failed", None))?;

    let return_url = flow.return_url.unwrap_or_else(|| "/".to_string());
    info!("Authentication successful, redirecting to {return_url}");
    Ok(Redirect::to(&return_url).into_response())
}

//! Mock Hydra identity provider.
//!
//! Auto-approves every authorization request, verifies PKCE when codes
//! are redeemed, and mints unsigned JWTs. Tests hold the shared state to
//! read hit counters and to script the device flow.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc, Mutex,
};

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

pub struct HydraState {
    /// Issuer URL reported in metadata and verification URIs
    pub base_url: String,
    /// Subject claim minted into issued tokens
    pub subject: String,
    pub authorize_hits: AtomicUsize,
    pub token_hits: AtomicUsize,
    pub device_auth_hits: AtomicUsize,
    /// Device polls that still answer `authorization_pending` before the
    /// fixture approves the grant
    pub pending_device_polls: AtomicU32,
    /// S256 challenges captured at the authorization endpoint, keyed by
    /// the code they were issued with
    pub code_challenges: Mutex<HashMap<String, String>>,
}

impl HydraState {
    pub fn new(subject: &str) -> Self {
        Self {
            base_url: "http://localhost:0".to_string(),
            subject: subject.to_string(),
            authorize_hits: AtomicUsize::new(0),
            token_hits: AtomicUsize::new(0),
            device_auth_hits: AtomicUsize::new(0),
            pending_device_polls: AtomicU32::new(1),
            code_challenges: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for HydraState {
    fn default() -> Self {
        Self::new("fixture-identity")
    }
}

pub fn router(state: Arc<HydraState>) -> Router {
    Router::new()
        .route(
            "/.well-known/openid-configuration",
            get(openid_configuration),
        )
        .route("/oauth2/auth", get(authorize))
        .route("/oauth2/token", post(token))
        .route("/oauth2/device/auth", post(device_auth))
        .with_state(state)
}

/// Bind on an ephemeral port and serve in the background. Returns the
/// shared state and the issuer URL the console should be pointed at.
pub async fn spawn(mut state: HydraState) -> anyhow::Result<(Arc<HydraState>, String)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    state.base_url = base_url.clone();

    let state = Arc::new(state);
    let app = router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((state, base_url))
}

/// Unsigned JWT: real header and payload, throwaway signature. The
/// console never verifies signatures, only decodes payloads.
pub fn mint_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(
        json!({"alg": "RS256", "typ": "JWT", "kid": "fixture-key-1"})
            .to_string()
            .as_bytes(),
    );
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(b"fixture-signature");

    format!("{header}.{payload}.{signature}")
}

/// S256 transform of a code verifier (RFC 7636).
fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

async fn openid_configuration(State(hydra): State<Arc<HydraState>>) -> impl IntoResponse {
    Json(json!({
        "issuer": hydra.base_url,
        "authorization_endpoint": format!("{}/oauth2/auth", hydra.base_url),
        "token_endpoint": format!("{}/oauth2/token", hydra.base_url),
        "device_authorization_endpoint": format!("{}/oauth2/device/auth", hydra.base_url),
        "response_types_supported": ["code"],
        "grant_types_supported": [
            "authorization_code",
            "refresh_token",
            "client_credentials",
            "urn:ietf:params:oauth:grant-type:device_code"
        ],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"]
    }))
}

#[derive(Debug, serde::Deserialize)]
#[allow(dead_code)]
struct AuthorizeQuery {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    state: Option<String>,
    scope: Option<String>,
    response_type: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    prompt: Option<String>,
}

#[derive(Serialize)]
struct RedirectParams<'a> {
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

// The authorization endpoint auto-approves and redirects straight back
async fn authorize(
    State(hydra): State<Arc<HydraState>>,
    Query(params): Query<AuthorizeQuery>,
) -> impl IntoResponse {
    hydra.authorize_hits.fetch_add(1, Ordering::SeqCst);

    let redirect_uri = params
        .redirect_uri
        .unwrap_or_else(|| "http://localhost:3000/oauth/hydra/callback".to_string());
    let code = format!("fixture_auth_code_{}", Uuid::new_v4());

    if let Some(challenge) = params.code_challenge {
        hydra
            .code_challenges
            .lock()
            .unwrap()
            .insert(code.clone(), challenge);
    }

    let redirect_params = RedirectParams {
        code: &code,
        state: params.state.as_deref(),
    };
    // SAFETY: We are in fixtures so a panic is fine
    let query_string = serde_urlencoded::to_string(&redirect_params).unwrap();
    let redirect_url = format!("{redirect_uri}?{query_string}");

    info!("Hydra: Redirecting to: {redirect_url}");

    Redirect::to(&redirect_url)
}

async fn token(
    State(hydra): State<Arc<HydraState>>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    hydra.token_hits.fetch_add(1, Ordering::SeqCst);

    let grant_type = params.get("grant_type").cloned().unwrap_or_default();
    info!("Hydra: Token request for grant_type={grant_type}");

    match grant_type.as_str() {
        "authorization_code" => {
            let code = params.get("code").cloned().unwrap_or_default();
            if code.is_empty() {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    "Missing authorization code",
                );
            }
            if code == "expired-code" {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "invalid_grant",
                    "Invalid or expired authorization code",
                );
            }

            // Codes issued through the authorization endpoint carry a
            // challenge; the submitted verifier must hash back to it.
            if let Some(challenge) = hydra.code_challenges.lock().unwrap().remove(&code) {
                let verifier = params.get("code_verifier").cloned().unwrap_or_default();
                if s256_challenge(&verifier) != challenge {
                    return error_body(
                        StatusCode::BAD_REQUEST,
                        "invalid_grant",
                        "PKCE verifier does not match the challenge",
                    );
                }
            }
            issue_tokens(&hydra, true)
        }
        "refresh_token" => {
            let refresh = params.get("refresh_token").cloned().unwrap_or_default();
            if refresh.is_empty() {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    "Missing refresh token",
                );
            }
            issue_tokens(&hydra, true)
        }
        "client_credentials" => issue_tokens(&hydra, false),
        "urn:ietf:params:oauth:grant-type:device_code" => {
            let device_code = params.get("device_code").cloned().unwrap_or_default();
            if device_code.is_empty() {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    "Missing device code",
                );
            }

            if hydra.pending_device_polls.load(Ordering::SeqCst) > 0 {
                hydra.pending_device_polls.fetch_sub(1, Ordering::SeqCst);
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "authorization_pending",
                    "User has not yet approved",
                );
            }
            issue_tokens(&hydra, true)
        }
        _ => error_body(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Unknown grant type",
        ),
    }
}

async fn device_auth(
    State(hydra): State<Arc<HydraState>>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    hydra.device_auth_hits.fetch_add(1, Ordering::SeqCst);

    if params.get("client_id").map_or(true, |id| id.is_empty()) {
        return error_body(StatusCode::BAD_REQUEST, "invalid_client", "Missing client id");
    }

    let device_code = format!("fixture_device_code_{}", Uuid::new_v4());
    let user_code = "FIXT-CODE";

    info!("Hydra: Issued device code {device_code}");

    (
        StatusCode::OK,
        Json(json!({
            "device_code": device_code,
            "user_code": user_code,
            "verification_uri": format!("{}/device/verify", hydra.base_url),
            "verification_uri_complete": format!("{}/device/verify?user_code={user_code}", hydra.base_url),
            "expires_in": 600,
            "interval": 1
        })),
    )
        .into_response()
}

fn issue_tokens(hydra: &HydraState, with_refresh: bool) -> Response {
    let now = chrono::Utc::now().timestamp();

    let access_token = mint_jwt(&json!({
        "iss": hydra.base_url,
        "sub": hydra.subject,
        "iat": now,
        "exp": now + 3600,
        "scope": "openid offline",
    }));

    let mut body = json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "scope": "openid offline",
    });
    if with_refresh {
        body["refresh_token"] = json!(format!("fixture_refresh_{}", Uuid::new_v4()));
    }

    info!("Hydra: Issuing tokens for {}", hydra.subject);
    (StatusCode::OK, Json(body)).into_response()
}

fn error_body(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_tokens_decode_back_to_their_claims() {
        let token = mint_jwt(&json!({"sub": "user-1", "exp": 1234567890}));

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);

        let payload = URL_SAFE_NO_PAD.decode(segments[1]).unwrap();
        let claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["exp"], 1234567890);
    }

    #[test]
    fn verifier_hashing_matches_the_rfc_7636_vector() {
        assert_eq!(
            s256_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }
}

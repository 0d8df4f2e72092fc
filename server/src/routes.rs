use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json,
};
use maud::{html, Markup};
use serde::Deserialize;
use tower_cookies::CookieManagerLayer;
use tracing::info;

use crate::{
    auth::{AdminIdentity, CurrentIdentity},
    cookies::CookieJar,
    session,
    state::AppState,
};

pub mod api;
pub mod hydra;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        // Public pages
        .route("/", get(root_page))
        .route("/login", get(login_page))
        .route("/logout", get(logout))
        // Health check
        .route("/healthz", get(healthz))
        // OAuth redirect flow
        .route("/oauth/hydra/authorize", get(hydra::authorize))
        .route("/oauth/hydra/callback", get(hydra::callback))
        // Session JSON API
        .route(
            "/api/auth/session",
            get(api::session::get_session)
                .post(api::session::create_session)
                .delete(api::session::delete_session),
        )
        .route("/api/auth/refresh", post(api::session::refresh_session))
        // Grant flow JSON API
        .route("/api/flows/device", post(api::flows::device_authorize))
        .route("/api/flows/device/token", post(api::flows::device_token))
        .route(
            "/api/flows/client-credentials",
            post(api::flows::client_credentials),
        )
        // Admin routes
        .route("/_", get(admin_panel))
        .layer(CookieManagerLayer::new())
        // Add trace layer for debugging
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

fn page(title: &str, content: Markup) -> Markup {
    html! {
        (maud::DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body {
                (content)
            }
        }
    }
}

/// Root page handler - shows whether a session is active
async fn root_page(identity: CurrentIdentity) -> Markup {
    page(
        "Hydra Console",
        html! {
            h1 { "Hydra Console" }
            @if let Some(identity_id) = &identity.identity_id {
                p { "Signed in as " code { (identity_id) } "." }
                ul {
                    li { a href="/_" { "Diagnostics" } }
                    li { a href="/logout" { "Sign out" } }
                }
            } @else {
                p { "Not signed in." }
                ul {
                    li { a href="/login" { "Sign in" } }
                }
            }
        },
    )
}

#[derive(Deserialize)]
struct LoginPageParams {
    error: Option<String>,
    error_description: Option<String>,
}

/// Login page handler - entry to the redirect flow, and the landing spot
/// for flow failures
async fn login_page(Query(params): Query<LoginPageParams>) -> Markup {
    page(
        "Login - Hydra Console",
        html! {
            h1 { "Sign in" }
            @if let Some(error) = &params.error {
                div {
                    p { "Login failed: " code { (error) } }
                    @if let Some(description) = &params.error_description {
                        p { (description) }
                    }
                }
            }
            form action="/oauth/hydra/authorize" method="get" {
                p {
                    label for="client_id" { "Client ID (leave blank for the configured default)" }
                }
                p {
                    input type="text" id="client_id" name="client_id";
                }
                input type="hidden" name="return_url" value="/";
                button type="submit" { "Sign in with Hydra" }
            }
        },
    )
}

/// Logout route - clears the session cookie and redirects to home
async fn logout(cookies: CookieJar) -> impl IntoResponse {
    match session::identity_id_from_session(&cookies) {
        Some(identity_id) => info!("Logging out {identity_id}"),
        None => info!("User logged out"),
    }
    crate::auth::end_session(&cookies);

    Redirect::to("/")
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Admin panel page - session and provider diagnostics for whitelisted
/// identities
async fn admin_panel(
    AdminIdentity {
        identity_id,
        session,
    }: AdminIdentity,
    State(state): State<AppState>,
) -> Markup {
    page(
        "Admin - Hydra Console",
        html! {
            h1 { "Admin" }
            p { "Hello, " code { (identity_id) } "!" }

            h2 { "Session" }
            ul {
                li { "Token: " code { (session::token_preview(&session.access_token)) } }
                li { "Refresh token present: " (session.refresh_token.is_some()) }
                @if let Some(expires_at) = session.effective_expiry_millis() {
                    li { "Expires at (epoch ms): " (expires_at) }
                }
            }

            h2 { "Provider" }
            ul {
                li { "Issuer: " code { (state.hydra.public_url) } }
                li { "Default client configured: " (state.hydra.client_id.is_some()) }
                li { "Default scope: " code { (state.hydra.scope) } }
            }
        },
    )
}

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse as _, Response},
};
use reqwest::StatusCode;
use time::Duration;
use tracing::error;

pub use tower_cookies::Cookie;

use crate::state::AppState;

/// Lifetime of the short-lived cookies that carry one login attempt
/// across the redirect boundary.
pub const FLOW_COOKIE_TTL_SECONDS: i64 = 600;

/// Sealed cookie access for a single request.
///
/// Everything goes through the private jar, so values are encrypted and
/// authenticated with the application cookie key.
pub struct CookieJar {
    cookies: tower_cookies::Cookies,
    state: AppState,
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for CookieJar {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = match tower_cookies::Cookies::from_request_parts(parts, state).await {
            Ok(cookies) => cookies,
            Err(_) => {
                error!("Failed to extract cookies from request");
                return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
        };

        Ok(CookieJar {
            cookies,
            state: state.clone(),
        })
    }
}

impl CookieJar {
    /// Add a new private cookie
    pub fn add(&self, cookie: tower_cookies::Cookie<'static>) {
        let private = self.cookies.private(&self.state.cookie_key);
        private.add(cookie);
    }

    /// Get a private cookie by name
    ///
    /// Returns `None` both when the cookie is absent and when it fails
    /// the seal check; use [`CookieJar::contains_raw`] to tell the two
    /// apart.
    pub fn get(&self, name: &str) -> Option<tower_cookies::Cookie<'static>> {
        let private = self.cookies.private(&self.state.cookie_key);
        private.get(name)
    }

    /// Removes the `cookie` from the jar.
    pub fn remove(&self, cookie: tower_cookies::Cookie<'static>) {
        let private = self.cookies.private(&self.state.cookie_key);
        private.remove(cookie);
    }

    /// Whether the request carried the raw cookie at all, sealed or not.
    pub fn contains_raw(&self, name: &str) -> bool {
        self.cookies.get(name).is_some()
    }

    /// Store one piece of flow state in a sealed, short-lived cookie.
    pub fn add_flow_cookie(&self, name: &'static str, value: String) {
        let mut cookie = Cookie::new(name, value);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
        cookie.set_secure(std::env::var("PROTO").ok() == Some("https".to_owned()));
        cookie.set_max_age(Duration::seconds(FLOW_COOKIE_TTL_SECONDS));
        self.add(cookie);
    }

    /// Read a flow cookie and delete it from the jar. Flow cookies are
    /// single-use.
    pub fn take_flow_cookie(&self, name: &'static str) -> Option<String> {
        let value = self.get(name).map(|cookie| cookie.value().to_string());
        if self.contains_raw(name) {
            self.remove_named(name);
        }
        value
    }

    /// Remove a cookie by name, matching the attributes it was set with.
    pub fn remove_named(&self, name: &'static str) {
        let mut cookie = Cookie::new(name, "");
        cookie.set_path("/");
        self.remove(cookie);
    }
}

//! Redirect-based authorization code flow against the identity provider.

mod authorize;
mod callback;

pub use authorize::authorize;
pub use callback::callback;

/// Sealed cookies that carry one login attempt across the redirect
/// boundary. All of them share the flow TTL and are single-use.
pub const STATE_COOKIE: &str = "oauth_state";
pub const VERIFIER_COOKIE: &str = "code_verifier";
pub const CLIENT_SECRET_COOKIE: &str = "client_secret";
pub const CLIENT_ID_COOKIE: &str = "flow_client_id";
pub const REDIRECT_URI_COOKIE: &str = "flow_redirect_uri";
pub const RETURN_URL_COOKIE: &str = "login_return_url";

/// Where a failed flow lands, with the error carried in the query string.
fn error_redirect_target(error: &str, description: Option<&str>) -> String {
    let mut target = format!("/login?error={}", urlencoding::encode(error));
    if let Some(description) = description {
        target.push_str("&error_description=");
        target.push_str(&urlencoding::encode(description));
    }
    target
}

pub(crate) fn error_redirect(
    error: &str,
    description: Option<&str>,
) -> axum::response::Redirect {
    axum::response::Redirect::to(&error_redirect_target(error, description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_target_encodes_the_code() {
        assert_eq!(
            error_redirect_target("invalid_state", None),
            "/login?error=invalid_state"
        );
    }

    #[test]
    fn error_target_carries_the_description_when_present() {
        assert_eq!(
            error_redirect_target("access_denied", Some("User denied the request")),
            "/login?error=access_denied&error_description=User%20denied%20the%20request"
        );
    }
}

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, info};

use crate::cookies::CookieJar;
use crate::session::{self, Session};
use crate::state::AppState;

/// Extract whoever the request's session says is signed in, if anyone.
///
/// Never rejects for auth reasons; an unreadable session cookie is
/// cleared and treated as signed out.
#[derive(Debug, Clone)]
pub struct CurrentIdentity {
    pub identity_id: Option<String>,
    pub session: Option<Session>,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = match CookieJar::from_request_parts(parts, state).await {
            Ok(cookies) => cookies,
            Err(rejection) => return Err(rejection),
        };

        let session = match session::get_session(&cookies) {
            Ok(Some(session)) if session.is_valid() => Some(session),
            Ok(Some(_)) => {
                info!("Session is no longer valid, clearing");
                session::clear_session(&cookies);
                None
            }
            Ok(None) => None,
            Err(err) => {
                info!("Clearing unreadable session cookie: {err}");
                session::clear_session(&cookies);
                None
            }
        };

        Ok(CurrentIdentity {
            identity_id: session.as_ref().and_then(|s| s.identity_id.clone()),
            session,
        })
    }
}

/// Extract an authenticated identity that is on the admin whitelist.
/// Requires both a valid session and a whitelisted subject.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub identity_id: String,
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminIdentity {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = match CurrentIdentity::from_request_parts(parts, state).await {
            Ok(current) => current,
            Err(rejection) => return Err(rejection),
        };

        let (Some(session), Some(identity_id)) = (current.session, current.identity_id) else {
            info!("No valid session found, redirecting to login");
            return Err(Redirect::to("/login").into_response());
        };

        if !state.is_admin(&identity_id) {
            error!("Identity {identity_id} attempted to access the admin area without being whitelisted");
            return Err(StatusCode::FORBIDDEN.into_response());
        }

        Ok(AdminIdentity {
            identity_id,
            session,
        })
    }
}

/// Clear the session cookie.
pub fn end_session(cookies: &CookieJar) {
    session::clear_session(cookies);
    info!("Session cookie removed");
}

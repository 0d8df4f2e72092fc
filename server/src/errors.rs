use std::fmt::Debug;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;

/// An error plus the response the client should see when it happens.
///
/// Redirect-flow handlers pair their errors with a `Redirect` so a broken
/// login lands back on the login page; everything else defaults to a 500.
#[derive(Debug)]
pub struct ServerError<R: IntoResponse>(pub(crate) color_eyre::Report, pub(crate) R);

pub type ServerResult<S, F = Response> = Result<S, ServerError<F>>;

impl<R: IntoResponse> IntoResponse for ServerError<R> {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = ?self.0, "Request Error");

        // Check if we're in development mode and this is a 500 error
        let is_dev_mode = std::env::var("DEVELOPMENT_MODE")
            .map(|v| v == "1")
            .unwrap_or(false);

        if is_dev_mode {
            // Check if the response would be a 500 error
            let temp_response = self.1.into_response();
            if temp_response.status() == StatusCode::INTERNAL_SERVER_ERROR {
                // Simple HTML escaping - replace dangerous characters
                let error_text = format!("{:?}", self.0)
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;")
                    .replace('"', "&quot;")
                    .replace('\'', "&#39;");

                let error_html = format!(
                    r#"<!DOCTYPE html>
<html>
<head>
    <title>Development Error - 500</title>
    <style>
        body {{ font-family: monospace; margin: 20px; background: #1a1a1a; color: #fff; }}
        .error-container {{ background: #2d2d2d; padding: 20px; border-radius: 8px; }}
        .error-title {{ color: #ff6b6b; font-size: 24px; margin-bottom: 20px; }}
        .error-details {{ background: #000; padding: 15px; border-radius: 4px; overflow-x: auto; }}
        pre {{ margin: 0; white-space: pre-wrap; word-wrap: break-word; }}
    </style>
</head>
<body>
    <div class="error-container">
        <div class="error-title">Development Mode - Internal Server Error</div>
        <div class="error-details">
            <pre>{}</pre>
        </div>
    </div>
</body>
</html>"#,
                    error_text
                );

                return (StatusCode::INTERNAL_SERVER_ERROR, Html(error_html)).into_response();
            }
            return temp_response;
        }

        self.1.into_response()
    }
}

impl<E> From<E> for ServerError<StatusCode>
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        ServerError(err.into(), StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub(crate) trait WithRedirect<T> {
    fn with_redirect(self, redirect: Redirect) -> Result<T, ServerError<Redirect>>;
}

impl<T> WithRedirect<T> for Result<T, color_eyre::Report> {
    fn with_redirect(self, redirect: Redirect) -> Result<T, ServerError<Redirect>> {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(ServerError(err, redirect)),
        }
    }
}

/// Failure taxonomy for the JSON APIs.
///
/// The wire shape is always `{"error": ...}` with an optional
/// `error_description`, mirroring what the provider itself sends.
#[derive(Debug)]
pub enum ApiError {
    InvalidTokenFormat,
    NotAuthenticated,
    NoRefreshToken,
    MissingClientId,
    MissingClientSecret,
    /// The provider refused the request; its status and error body are
    /// passed through.
    Upstream {
        status: StatusCode,
        error: String,
        error_description: Option<String>,
    },
    /// The provider could not be reached at all.
    Transport(color_eyre::Report),
    Internal(color_eyre::Report),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidTokenFormat
            | ApiError::NoRefreshToken
            | ApiError::MissingClientId
            | ApiError::MissingClientSecret => StatusCode::BAD_REQUEST,
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Transport(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::InvalidTokenFormat => "Invalid token format",
            ApiError::NotAuthenticated => "Not authenticated",
            ApiError::NoRefreshToken => "No refresh token",
            ApiError::MissingClientId => "missing_client_id",
            ApiError::MissingClientSecret => "missing_client_secret",
            ApiError::Upstream { error, .. } => error,
            ApiError::Transport(_) => "upstream_unreachable",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Transport(report) => {
                tracing::error!(error = ?report, "Upstream request failed")
            }
            ApiError::Internal(report) => tracing::error!(error = ?report, "Request Error"),
            _ => {}
        }

        let status = self.status();
        let mut body = serde_json::json!({ "error": self.message() });
        if let ApiError::Upstream {
            error_description: Some(description),
            ..
        } = &self
        {
            body["error_description"] = serde_json::Value::String(description.clone());
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_the_right_status() {
        assert_eq!(
            ApiError::InvalidTokenFormat.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotAuthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NoRefreshToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Upstream {
                status: StatusCode::FORBIDDEN,
                error: "access_denied".to_string(),
                error_description: None,
            }
            .status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn upstream_errors_pass_the_description_through() {
        let response = ApiError::Upstream {
            status: StatusCode::BAD_REQUEST,
            error: "authorization_pending".to_string(),
            error_description: Some("User has not yet approved".to_string()),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "authorization_pending");
        assert_eq!(body["error_description"], "User has not yet approved");
    }
}

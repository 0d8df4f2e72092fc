use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;

use hydra_console::routes::routes;
use hydra_console::state::{AppState, HydraConfig, Key};

pub fn test_state(issuer: &str) -> AppState {
    let hydra = HydraConfig {
        public_url: issuer.trim_end_matches('/').to_string(),
        client_id: Some("console".to_string()),
        client_secret: None,
        scope: "openid offline".to_string(),
    };

    AppState::new(
        hydra,
        Key::from(&[7u8; 64]),
        "console.test".to_string(),
        "http".to_string(),
        vec!["fixture-admin".to_string()],
    )
    .expect("build test state")
}

pub fn test_app(issuer: &str) -> Router {
    routes(test_state(issuer))
}

/// Collect the cookie pairs a response set, ready to send back on the
/// next request. Removal cookies (empty values) are dropped.
pub fn cookies_from(res: &Response) -> String {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter(|pair| pair.split_once('=').is_some_and(|(_, v)| !v.is_empty()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whether the response told the browser to delete the named cookie.
pub fn removes_cookie(res: &Response, name: &str) -> bool {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&format!("{name}=")) && value.contains("Max-Age=0"))
}

pub fn get(uri: &str, cookies: &str) -> Request<Body> {
    let mut builder = Request::get(uri);
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).expect("build request")
}

pub fn json_request(
    method: &str,
    uri: &str,
    cookies: &str,
    body: &serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub async fn json_body(res: Response) -> serde_json::Value {
    let bytes = to_bytes(res.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse body as JSON")
}

/// The Location header of a redirect response.
pub fn location(res: &Response) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .expect("response has a Location header")
}

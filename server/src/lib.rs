//! OAuth2/OIDC console service fronting an external Hydra identity
//! provider.

pub mod auth;
pub mod cookies;
pub mod errors;
pub mod jwt;
pub mod oauth;
pub mod routes;
pub mod session;
pub mod state;

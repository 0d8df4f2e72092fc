//! OAuth client plumbing: PKCE material and token endpoint calls.

pub mod pkce;
pub mod token;

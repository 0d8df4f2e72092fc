//! JSON surface: session management and the non-redirect grant flows.

pub mod flows;
pub mod session;

//! Authorization gate for the staff-only `/admin` area.
//!
//! The decision itself is a plain async function returning [`GateDecision`]; the
//! axum middleware only translates that decision into a redirect or forwards the
//! request with refreshed session cookies attached.

pub mod gate;
pub mod middleware;
pub mod profiles;
pub mod session;

#[cfg(test)]
mod tests;

pub use gate::{authorize, AdminGate, GateDecision, GateRequest, LOGIN_PATH, ROOT_PATH};
pub use middleware::admin_gate;
pub use profiles::{ProfileError, ProfileStore};
pub use session::{
    IdentityError, IdentityProvider, SessionClaims, SessionCookie, SessionCookies,
    SessionResolution,
};

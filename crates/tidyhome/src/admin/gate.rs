use std::sync::Arc;

use tracing::{debug, info, warn};

use super::profiles::ProfileStore;
use super::session::{IdentityProvider, SessionCookie, SessionCookies};

/// Route the browser is sent to when it has no usable session.
pub const LOGIN_PATH: &str = "/auth/login";
/// Route the browser is sent to when the caller lacks admin rights.
pub const ROOT_PATH: &str = "/";

/// What the gate needs to know about an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// Original path plus query, used as the post-login return target.
    pub path_and_query: &'a str,
    pub cookies: &'a SessionCookies,
}

/// Terminal outcome of authorizing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow { cookies: Vec<SessionCookie> },
    RedirectLogin { return_path: Option<String> },
    RedirectRoot,
}

impl GateDecision {
    /// `Location` for redirect outcomes.
    pub fn location(&self) -> Option<String> {
        match self {
            GateDecision::Allow { .. } => None,
            GateDecision::RedirectLogin {
                return_path: Some(path),
            } => Some(format!("{LOGIN_PATH}?next={}", urlencoding::encode(path))),
            GateDecision::RedirectLogin { return_path: None } => Some(LOGIN_PATH.to_string()),
            GateDecision::RedirectRoot => Some(ROOT_PATH.to_string()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow { .. })
    }
}

/// Decide whether a request may enter the admin area.
///
/// Each call is independent; nothing is retried or remembered between requests.
pub async fn authorize<I, P>(request: GateRequest<'_>, identity: &I, profiles: &P) -> GateDecision
where
    I: IdentityProvider + ?Sized,
    P: ProfileStore + ?Sized,
{
    let resolution = match identity.resolve(request.cookies).await {
        Ok(resolution) => resolution,
        Err(err) => {
            warn!(error = %err, "session resolution failed");
            return GateDecision::RedirectLogin {
                return_path: Some(request.path_and_query.to_string()),
            };
        }
    };

    let Some(claims) = resolution.claims else {
        debug!(path = request.path_and_query, "no session, redirecting to login");
        return GateDecision::RedirectLogin {
            return_path: Some(request.path_and_query.to_string()),
        };
    };

    let Some(subject) = claims.subject.filter(|subject| !subject.is_empty()) else {
        debug!("session without subject, redirecting to login");
        return GateDecision::RedirectLogin { return_path: None };
    };

    match profiles.superuser_flag(&subject).await {
        Ok(Some(true)) => {
            debug!(%subject, refreshed = resolution.refreshed.len(), "admin access granted");
            GateDecision::Allow {
                cookies: resolution.refreshed,
            }
        }
        Ok(_) => {
            info!(%subject, path = request.path_and_query, "admin access denied");
            GateDecision::RedirectRoot
        }
        Err(err) => {
            warn!(%subject, error = %err, "privilege lookup failed");
            GateDecision::RedirectRoot
        }
    }
}

/// Identity and profile collaborators shared by every gated request.
pub struct AdminGate<I: ?Sized, P: ?Sized> {
    identity: Arc<I>,
    profiles: Arc<P>,
}

impl<I: ?Sized, P: ?Sized> Clone for AdminGate<I, P> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            profiles: self.profiles.clone(),
        }
    }
}

impl<I, P> AdminGate<I, P>
where
    I: IdentityProvider + ?Sized,
    P: ProfileStore + ?Sized,
{
    pub fn new(identity: Arc<I>, profiles: Arc<P>) -> Self {
        Self { identity, profiles }
    }

    pub async fn authorize(&self, request: GateRequest<'_>) -> GateDecision {
        authorize(request, self.identity.as_ref(), self.profiles.as_ref()).await
    }
}

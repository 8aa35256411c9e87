use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::admin::profiles::{ProfileError, ProfileStore};
use crate::admin::session::{
    IdentityError, IdentityProvider, SessionClaims, SessionCookie, SessionCookies,
    SessionResolution,
};

pub(super) const ACCESS_COOKIE: &str = "sb-access-token";

/// Identity double mapping access-token cookie values to subjects.
#[derive(Default)]
pub(super) struct TokenIdentity {
    subjects: HashMap<String, Option<String>>,
    refreshed: Vec<SessionCookie>,
    unavailable: bool,
}

impl TokenIdentity {
    pub(super) fn with_token(mut self, token: &str, subject: Option<&str>) -> Self {
        self.subjects
            .insert(token.to_string(), subject.map(str::to_string));
        self
    }

    pub(super) fn refreshing(mut self, cookie: SessionCookie) -> Self {
        self.refreshed.push(cookie);
        self
    }

    pub(super) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl IdentityProvider for TokenIdentity {
    async fn resolve(&self, cookies: &SessionCookies) -> Result<SessionResolution, IdentityError> {
        if self.unavailable {
            return Err(IdentityError::Unavailable("timed out".to_string()));
        }
        let Some(token) = cookies.get(ACCESS_COOKIE) else {
            return Ok(SessionResolution::anonymous());
        };
        Ok(match self.subjects.get(token) {
            Some(subject) => SessionResolution {
                claims: Some(SessionClaims {
                    subject: subject.clone(),
                    email: None,
                }),
                refreshed: self.refreshed.clone(),
            },
            None => SessionResolution::anonymous(),
        })
    }
}

/// Profile double keyed by subject, counting lookups.
#[derive(Default)]
pub(super) struct FlagProfiles {
    flags: HashMap<String, bool>,
    failing: bool,
    lookups: AtomicUsize,
}

impl FlagProfiles {
    pub(super) fn with_flag(mut self, subject: &str, is_superuser: bool) -> Self {
        self.flags.insert(subject.to_string(), is_superuser);
        self
    }

    pub(super) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(super) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for FlagProfiles {
    async fn superuser_flag(&self, subject: &str) -> Result<Option<bool>, ProfileError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ProfileError::Unavailable("permission denied".to_string()));
        }
        Ok(self.flags.get(subject).copied())
    }
}

pub(super) fn cookies_with_token(token: &str) -> SessionCookies {
    let mut cookies = SessionCookies::default();
    cookies.insert(ACCESS_COOKIE, token);
    cookies
}

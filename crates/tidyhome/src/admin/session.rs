use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

/// Cookies sent by the browser, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    values: HashMap<String, String>,
}

impl SessionCookies {
    /// Collect every `Cookie` header. Later duplicates win.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for header_value in headers.get_all(header::COOKIE) {
            let Ok(raw) = header_value.to_str() else {
                continue;
            };
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    let name = name.trim();
                    if !name.is_empty() {
                        values.insert(name.to_string(), value.trim().to_string());
                    }
                }
            }
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decoded identity assertion for the current caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Cookie the identity provider wants written back, typically a rotated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub max_age_secs: Option<i64>,
    pub secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age_secs: None,
            secure: true,
        }
    }

    pub fn with_max_age(mut self, secs: i64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut rendered = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.name, self.value
        );
        if self.secure {
            rendered.push_str("; Secure");
        }
        if let Some(max_age) = self.max_age_secs {
            rendered.push_str(&format!("; Max-Age={max_age}"));
        }
        rendered
    }
}

/// Outcome of resolving a request's session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionResolution {
    pub claims: Option<SessionClaims>,
    pub refreshed: Vec<SessionCookie>,
}

impl SessionResolution {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(claims: SessionClaims) -> Self {
        Self {
            claims: Some(claims),
            refreshed: Vec::new(),
        }
    }
}

/// Resolves session claims from request cookies.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, cookies: &SessionCookies) -> Result<SessionResolution, IdentityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity provider rejected the session ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected identity payload: {0}")]
    Decode(String),
}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::RestError;
use crate::admin::session::{
    IdentityError, IdentityProvider, SessionClaims, SessionCookie, SessionCookies,
    SessionResolution,
};
use crate::config::{BackendConfig, SessionConfig};

const REFRESH_COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 400;

/// Identity provider backed by the hosted token service.
///
/// The access token cookie is checked against `/user`. When it has expired and a
/// refresh token cookie is present, the pair is rotated through `/token` and the
/// new values are handed back as cookies to set on the response.
#[derive(Clone)]
pub struct TokenAuthProvider {
    client: Client,
    auth_url: String,
    api_key: String,
    access_cookie: String,
    refresh_cookie: String,
    secure_cookies: bool,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl UserPayload {
    fn into_claims(self) -> SessionClaims {
        SessionClaims {
            subject: self.id,
            email: self.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserPayload,
}

impl TokenAuthProvider {
    pub fn new(backend: &BackendConfig, session: &SessionConfig) -> Result<Self, RestError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, backend, session))
    }

    pub fn with_client(client: Client, backend: &BackendConfig, session: &SessionConfig) -> Self {
        Self {
            client,
            auth_url: backend.auth_url.trim_end_matches('/').to_string(),
            api_key: backend.api_key.clone(),
            access_cookie: session.access_cookie.clone(),
            refresh_cookie: session.refresh_cookie.clone(),
            secure_cookies: true,
        }
    }

    /// Plain-HTTP development setups need cookies without the `Secure` flag.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    async fn current_user(&self, access_token: &str) -> Result<Option<UserPayload>, RestError> {
        let response = self
            .client
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => response
                .json::<UserPayload>()
                .await
                .map(Some)
                .map_err(|err| RestError::Decode(err.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(RestError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenGrant>, RestError> {
        let response = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => response
                .json::<TokenGrant>()
                .await
                .map(Some)
                .map_err(|err| RestError::Decode(err.to_string())),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Ok(None),
            status => Err(RestError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    fn cookie(&self, name: &str, value: String) -> SessionCookie {
        let mut cookie = SessionCookie::new(name, value);
        cookie.secure = self.secure_cookies;
        cookie
    }
}

#[async_trait]
impl IdentityProvider for TokenAuthProvider {
    async fn resolve(&self, cookies: &SessionCookies) -> Result<SessionResolution, IdentityError> {
        if let Some(access_token) = cookies.get(&self.access_cookie) {
            if let Some(user) = self.current_user(access_token).await? {
                return Ok(SessionResolution::authenticated(user.into_claims()));
            }
            debug!("access token rejected, attempting refresh");
        }

        let Some(refresh_token) = cookies.get(&self.refresh_cookie) else {
            return Ok(SessionResolution::anonymous());
        };

        let Some(grant) = self.refresh(refresh_token).await? else {
            warn!("refresh token rejected");
            return Ok(SessionResolution::anonymous());
        };

        let mut access = self.cookie(&self.access_cookie, grant.access_token);
        access.max_age_secs = grant.expires_in;
        let refresh = self
            .cookie(&self.refresh_cookie, grant.refresh_token)
            .with_max_age(REFRESH_COOKIE_MAX_AGE_SECS);

        Ok(SessionResolution {
            claims: Some(grant.user.into_claims()),
            refreshed: vec![access, refresh],
        })
    }
}

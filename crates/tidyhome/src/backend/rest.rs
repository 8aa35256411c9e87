use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::RestError;
use crate::admin::profiles::{ProfileError, ProfileStore};
use crate::config::BackendConfig;
use crate::quotes::domain::{Quote, QuoteEvent, QuoteId};
use crate::quotes::store::{QuoteStore, StoreError};

const QUOTES_TABLE: &str = "quotes";
const QUOTE_EVENTS_TABLE: &str = "quote_events";
const PROFILES_TABLE: &str = "profiles";

/// Row-level REST client for the managed database (PostgREST dialect).
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, RestError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, &config.rest_url, &config.api_key))
    }

    pub fn with_client(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn select<T>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>, RestError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, table);
        debug!(%table, ?query, "querying rest backend");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            warn!(%table, status = status.as_u16(), "rest backend rejected query");
            return Err(RestError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|err| RestError::Decode(err.to_string()))
    }
}

#[async_trait]
impl QuoteStore for RestBackend {
    async fn fetch_quote(&self, id: &QuoteId) -> Result<Vec<Quote>, StoreError> {
        let query = [
            ("id", format!("eq.{id}")),
            ("select", "*".to_string()),
            ("limit", "2".to_string()),
        ];
        Ok(self.select(QUOTES_TABLE, &query).await?)
    }

    async fn fetch_quote_events(&self, id: &QuoteId) -> Result<Vec<QuoteEvent>, StoreError> {
        let query = [
            ("quote_id", format!("eq.{id}")),
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        Ok(self.select(QUOTE_EVENTS_TABLE, &query).await?)
    }

    async fn recent_quotes(&self, limit: usize) -> Result<Vec<Quote>, StoreError> {
        let query = [
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        Ok(self.select(QUOTES_TABLE, &query).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default)]
    is_superuser: Option<bool>,
}

#[async_trait]
impl ProfileStore for RestBackend {
    async fn superuser_flag(&self, subject: &str) -> Result<Option<bool>, ProfileError> {
        let query = [
            ("id", format!("eq.{subject}")),
            ("select", "is_superuser".to_string()),
        ];
        let rows: Vec<ProfileRow> = self.select(PROFILES_TABLE, &query).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.is_superuser.unwrap_or(false)))
    }
}

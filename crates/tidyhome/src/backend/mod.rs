//! HTTP adapters for the managed database and its identity service.

mod auth;
mod rest;

pub use auth::TokenAuthProvider;
pub use rest::RestBackend;

use crate::admin::profiles::ProfileError;
use crate::admin::session::IdentityError;
use crate::quotes::store::StoreError;

/// Failure talking to a backend HTTP endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

impl From<RestError> for StoreError {
    fn from(value: RestError) -> Self {
        match value {
            RestError::Transport(err) => StoreError::Unavailable(err.to_string()),
            RestError::Status { status, message } => StoreError::Rejected { status, message },
            RestError::Decode(message) => StoreError::Decode(message),
        }
    }
}

impl From<RestError> for ProfileError {
    fn from(value: RestError) -> Self {
        match value {
            RestError::Transport(err) => ProfileError::Unavailable(err.to_string()),
            RestError::Status { status, message } => ProfileError::Rejected { status, message },
            RestError::Decode(message) => ProfileError::Decode(message),
        }
    }
}

impl From<RestError> for IdentityError {
    fn from(value: RestError) -> Self {
        match value {
            RestError::Transport(err) => IdentityError::Unavailable(err.to_string()),
            RestError::Status { status, message } => IdentityError::Rejected { status, message },
            RestError::Decode(message) => IdentityError::Decode(message),
        }
    }
}

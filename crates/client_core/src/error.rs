use shared::error::ApiError;
use thiserror::Error;

use crate::StoreAction;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("remote request failed: {0}")]
    Remote(String),
    #[error("{entity} {id} is not loaded")]
    NotFound { entity: &'static str, id: String },
    #[error("{action} for '{key}' is already in progress")]
    DuplicateRequest { action: StoreAction, key: String },
    #[error("unexpected row from backend: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn remote(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ApiError>() {
            Some(api) => StoreError::Remote(api.user_message()),
            None => StoreError::Remote(format!("{err:#}")),
        }
    }

    pub fn decode(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }

    /// Text recorded in the store's error field.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Validation(message)
            | StoreError::Remote(message)
            | StoreError::Decode(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PointId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Network,
    Validation,
    NotFound,
    Unavailable,
}

/// Failure of a store read or mutation. The board never surfaces the detail to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("route point {0} not found")]
    NotFound(PointId),
    #[error("store is not loaded")]
    Unavailable,
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network(_) => ErrorCode::Network,
            Self::Validation(_) => ErrorCode::Validation,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Unavailable => ErrorCode::Unavailable,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

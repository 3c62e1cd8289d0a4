//! Cloud provider error types

use thiserror::Error;

/// Errors surfaced by a [`RuleStore`](crate::RuleStore) implementation
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Security group not found: {0}")]
    SecurityGroupNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),
}

pub type Result<T> = std::result::Result<T, CloudError>;

//! Alibaba Cloud provider error types

use ipfence_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AliyunError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("ECS API error {code}: {message} (HTTP {status}, RequestId: {request_id})")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AliyunError {
    /// Error code returned by the ECS API, if any
    pub fn api_code(&self) -> Option<&str> {
        match self {
            AliyunError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<AliyunError> for CloudError {
    fn from(err: AliyunError) -> Self {
        match err {
            AliyunError::Api { ref code, .. }
                if code.starts_with("InvalidAccessKeyId")
                    || code.starts_with("SignatureDoesNotMatch")
                    || code.starts_with("Forbidden") =>
            {
                CloudError::AuthenticationFailed(err.to_string())
            }
            AliyunError::Api { ref code, .. }
                if code.starts_with("InvalidSecurityGroupId") =>
            {
                CloudError::SecurityGroupNotFound(err.to_string())
            }
            AliyunError::Http(e) => CloudError::Transport(e.to_string()),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AliyunError>;

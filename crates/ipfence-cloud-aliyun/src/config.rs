//! Credentials and endpoint configuration

use crate::error::{AliyunError, Result};
use std::fmt;

pub const ACCESS_KEY_ID_ENV: &str = "ALIBABA_CLOUD_ACCESS_KEY_ID";
pub const ACCESS_KEY_SECRET_ENV: &str = "ALIBABA_CLOUD_ACCESS_KEY_SECRET";

/// AccessKey pair used to sign requests
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// Read the AccessKey pair from the environment
    ///
    /// An unset or empty variable is reported as missing.
    pub fn from_env() -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AliyunError::MissingEnvVar(name.to_string()))
        };

        Ok(Self {
            access_key_id: read(ACCESS_KEY_ID_ENV)?,
            access_key_secret: read(ACCESS_KEY_SECRET_ENV)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// Connection settings for the ECS API
#[derive(Debug, Clone)]
pub struct EcsConfig {
    pub credentials: Credentials,
    pub region_id: String,
    /// Host name, optionally prefixed with `http://` or `https://`
    pub endpoint: String,
}

impl EcsConfig {
    /// `endpoint` defaults to the regional public endpoint
    pub fn new(credentials: Credentials, region_id: impl Into<String>, endpoint: Option<String>) -> Self {
        let region_id = region_id.into();
        let endpoint = endpoint
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| default_endpoint(&region_id));

        Self {
            credentials,
            region_id,
            endpoint,
        }
    }

    /// Base URL (scheme and host) requests are sent to
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        }
    }

    /// Host name used in the signed `host` header
    pub fn host(&self) -> String {
        let base = self.base_url();
        base.split_once("://")
            .map(|(_, host)| host.to_string())
            .unwrap_or(base)
    }
}

/// `ecs.{region}.aliyuncs.com`
pub fn default_endpoint(region_id: &str) -> String {
    format!("ecs.{}.aliyuncs.com", region_id)
}

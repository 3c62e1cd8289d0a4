//! Public IP lookup
//!
//! Lookup services are tried strictly one after another; the first response
//! that looks like an IPv4 address wins.

use std::time::Duration;
use thiserror::Error;

/// Tried in this order
pub const DEFAULT_SERVICES: &[&str] = &[
    "https://api.ipify.org",
    "https://ifconfig.me/ip",
    "https://icanhazip.com",
    "https://api.ip.sb/ip",
];

/// Per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("could not determine public IP address: all {0} lookup services failed")]
    Exhausted(usize),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct IpResolver {
    client: reqwest::Client,
    services: Vec<String>,
}

impl IpResolver {
    pub fn new() -> Result<Self, ResolveError> {
        Self::with_services(
            DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_TIMEOUT,
        )
    }

    pub fn with_services(services: Vec<String>, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ipfence/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, services })
    }

    /// First plausible address from the configured services
    pub async fn resolve(&self) -> Result<String, ResolveError> {
        for service in &self.services {
            match self.query(service).await {
                Ok(ip) => {
                    tracing::debug!("{} reported {}", service, ip);
                    return Ok(ip);
                }
                Err(reason) => {
                    tracing::debug!("IP lookup via {} failed: {}", service, reason);
                }
            }
        }

        Err(ResolveError::Exhausted(self.services.len()))
    }

    async fn query(&self, service: &str) -> Result<String, String> {
        let response = self
            .client
            .get(service)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body = response.text().await.map_err(|e| e.to_string())?;
        let ip = body.trim();
        if looks_like_ipv4(ip) {
            Ok(ip.to_string())
        } else {
            Err(format!("unexpected response body: {:?}", ip))
        }
    }
}

/// Loose check: non-empty and dotted. Octet ranges are not validated.
pub fn looks_like_ipv4(s: &str) -> bool {
    !s.is_empty() && s.contains('.')
}

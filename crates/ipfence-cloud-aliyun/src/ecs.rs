//! Alibaba Cloud ECS API client
//!
//! Direct RPC-style calls over HTTPS, signed with ACS3-HMAC-SHA256.
//! Only the three security group actions ipfence needs are wrapped.

use crate::config::EcsConfig;
use crate::error::{AliyunError, Result};
use crate::signer::{RequestParts, Signer};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

pub const ECS_API_VERSION: &str = "2014-05-26";

const USER_AGENT: &str = concat!("ipfence/", env!("CARGO_PKG_VERSION"));

/// ECS security group client
pub struct EcsClient {
    client: reqwest::Client,
    config: EcsConfig,
}

/// Parameters of `RevokeSecurityGroup`
#[derive(Debug, Clone)]
pub struct RevokeRequest {
    pub security_group_id: String,
    pub ip_protocol: String,
    pub port_range: String,
    pub source_cidr_ip: String,
    pub nic_type: String,
}

/// Parameters of `AuthorizeSecurityGroup`
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub security_group_id: String,
    pub ip_protocol: String,
    pub port_range: String,
    pub source_cidr_ip: String,
    pub nic_type: String,
    pub description: String,
    pub policy: String,
    pub priority: i32,
}

impl EcsClient {
    pub fn new(config: EcsConfig) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self { client, config })
    }

    /// Ingress permissions of a security group
    pub async fn describe_security_group_attribute(
        &self,
        security_group_id: &str,
    ) -> Result<Vec<ApiPermission>> {
        let mut params = BTreeMap::new();
        params.insert("SecurityGroupId".to_string(), security_group_id.to_string());
        params.insert("Direction".to_string(), "ingress".to_string());

        let response: DescribeSecurityGroupAttributeResponse = self
            .call("DescribeSecurityGroupAttribute", params)
            .await?;

        tracing::debug!(
            "DescribeSecurityGroupAttribute {} returned {} permissions (RequestId: {})",
            security_group_id,
            response.permissions.permission.len(),
            response.request_id
        );
        Ok(response.permissions.permission)
    }

    /// Remove an ingress rule
    pub async fn revoke_security_group(&self, request: &RevokeRequest) -> Result<()> {
        let params: BTreeMap<String, String> = [
            ("SecurityGroupId", request.security_group_id.clone()),
            ("IpProtocol", request.ip_protocol.clone()),
            ("PortRange", request.port_range.clone()),
            ("SourceCidrIp", request.source_cidr_ip.clone()),
            ("NicType", request.nic_type.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let response: RequestIdResponse = self.call("RevokeSecurityGroup", params).await?;
        tracing::debug!("RevokeSecurityGroup ok (RequestId: {})", response.request_id);
        Ok(())
    }

    /// Add an ingress rule
    pub async fn authorize_security_group(&self, request: &AuthorizeRequest) -> Result<()> {
        let params: BTreeMap<String, String> = [
            ("SecurityGroupId", request.security_group_id.clone()),
            ("IpProtocol", request.ip_protocol.clone()),
            ("PortRange", request.port_range.clone()),
            ("SourceCidrIp", request.source_cidr_ip.clone()),
            ("NicType", request.nic_type.clone()),
            ("Description", request.description.clone()),
            ("Policy", request.policy.clone()),
            ("Priority", request.priority.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let response: RequestIdResponse = self.call("AuthorizeSecurityGroup", params).await?;
        tracing::debug!(
            "AuthorizeSecurityGroup ok (RequestId: {})",
            response.request_id
        );
        Ok(())
    }

    /// Sign and send one RPC action; `RegionId` is added automatically
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        mut params: BTreeMap<String, String>,
    ) -> Result<T> {
        params.insert("RegionId".to_string(), self.config.region_id.clone());

        let host = self.config.host();
        let timestamp = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        let nonce = uuid::Uuid::new_v4().simple().to_string();

        let signed = Signer::new(&self.config.credentials).sign(&RequestParts {
            method: "POST",
            host: &host,
            action,
            version: ECS_API_VERSION,
            params: &params,
            timestamp: &timestamp,
            nonce: &nonce,
        })?;

        let url = format!("{}/?{}", self.config.base_url(), signed.query);
        tracing::debug!("POST {} {}", action, self.config.base_url());

        let mut request = self.client.post(&url);
        for (name, value) in &signed.headers {
            // reqwest derives the Host header from the URL
            if name != "host" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Decode an ECS error body, falling back to the raw text
fn parse_error(status: u16, body: &str) -> AliyunError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => AliyunError::Api {
            status,
            code: err.code,
            message: err.message,
            request_id: err.request_id,
        },
        Err(_) => AliyunError::Api {
            status,
            code: "Unknown".to_string(),
            message: body.trim().to_string(),
            request_id: String::new(),
        },
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RequestIdResponse {
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroupAttributeResponse {
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    permissions: Permissions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Permissions {
    #[serde(default)]
    permission: Vec<ApiPermission>,
}

/// One permission as returned by `DescribeSecurityGroupAttribute`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiPermission {
    #[serde(default)]
    pub ip_protocol: String,
    #[serde(default)]
    pub port_range: String,
    #[serde(default)]
    pub source_cidr_ip: String,
    #[serde(default)]
    pub nic_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policy: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// ECS reports priority as a string; accept either form
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Priority {
    Number(i64),
    Text(String),
}

impl Priority {
    pub fn value(&self) -> Option<i32> {
        match self {
            Priority::Number(n) => i32::try_from(*n).ok(),
            Priority::Text(s) => s.trim().parse().ok(),
        }
    }
}

//! Alibaba Cloud ECS rule store

use crate::config::EcsConfig;
use crate::ecs::{ApiPermission, AuthorizeRequest, EcsClient, RevokeRequest};
use crate::error::Result;
use async_trait::async_trait;
use ipfence_cloud::{
    CloudError, DesiredRule, FirewallRule, NicType, Policy, PortRange, Protocol, RuleKey,
    RuleStore, SourceCidr,
};

/// Priority ECS assigns when a rule is created without one
const ECS_DEFAULT_PRIORITY: i32 = 1;

/// [`RuleStore`] backed by the ECS security group API
pub struct AliyunRuleStore {
    client: EcsClient,
}

impl AliyunRuleStore {
    pub fn new(config: EcsConfig) -> Result<Self> {
        Ok(Self {
            client: EcsClient::new(config)?,
        })
    }
}

fn permission_to_rule(permission: ApiPermission) -> FirewallRule {
    FirewallRule {
        protocol: Protocol::from(permission.ip_protocol.as_str()),
        port_range: PortRange::new(permission.port_range),
        source_cidr: SourceCidr::new(permission.source_cidr_ip),
        nic_type: permission.nic_type.parse().unwrap_or(NicType::Intranet),
        description: permission.description,
        policy: permission.policy.parse().unwrap_or(Policy::Accept),
        priority: permission
            .priority
            .and_then(|p| p.value())
            .unwrap_or(ECS_DEFAULT_PRIORITY),
    }
}

#[async_trait]
impl RuleStore for AliyunRuleStore {
    fn name(&self) -> &str {
        "aliyun-ecs"
    }

    async fn list_rules(&self, group_id: &str) -> ipfence_cloud::Result<Vec<FirewallRule>> {
        let permissions = self
            .client
            .describe_security_group_attribute(group_id)
            .await
            .map_err(CloudError::from)?;

        Ok(permissions
            .into_iter()
            .map(permission_to_rule)
            .collect())
    }

    async fn revoke_rule(&self, group_id: &str, key: &RuleKey) -> ipfence_cloud::Result<()> {
        tracing::info!(
            "Revoking {} {} from {} in {}",
            key.protocol,
            key.port_range,
            key.source_cidr,
            group_id
        );

        self.client
            .revoke_security_group(&RevokeRequest {
                security_group_id: group_id.to_string(),
                ip_protocol: key.protocol.to_string(),
                port_range: key.port_range.to_string(),
                source_cidr_ip: key.source_cidr.to_string(),
                nic_type: key.nic_type.to_string(),
            })
            .await
            .map_err(CloudError::from)
    }

    async fn authorize_rule(&self, group_id: &str, rule: &DesiredRule) -> ipfence_cloud::Result<()> {
        tracing::info!(
            "Authorizing {} {} from {} in {}",
            rule.protocol,
            rule.port_range,
            rule.source_cidr,
            group_id
        );

        self.client
            .authorize_security_group(&AuthorizeRequest {
                security_group_id: group_id.to_string(),
                ip_protocol: rule.protocol.to_string(),
                port_range: rule.port_range.to_string(),
                source_cidr_ip: rule.source_cidr.to_string(),
                nic_type: rule.nic_type.to_string(),
                description: rule.description.clone(),
                policy: rule.policy.to_string(),
                priority: rule.priority,
            })
            .await
            .map_err(CloudError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Priority;

    fn permission() -> ApiPermission {
        ApiPermission {
            ip_protocol: "TCP".to_string(),
            port_range: "22/22".to_string(),
            source_cidr_ip: "1.2.3.4/32".to_string(),
            nic_type: "internet".to_string(),
            description: "Auto-updated from home IP".to_string(),
            policy: "Accept".to_string(),
            priority: Some(Priority::Text("100".to_string())),
        }
    }

    #[test]
    fn test_permission_to_rule() {
        let rule = permission_to_rule(permission());
        assert_eq!(rule.protocol, Protocol::Tcp);
        assert_eq!(rule.port_range, PortRange::single(22));
        assert_eq!(rule.source_cidr.as_str(), "1.2.3.4/32");
        assert_eq!(rule.nic_type, NicType::Internet);
        assert_eq!(rule.policy, Policy::Accept);
        assert_eq!(rule.priority, 100);
    }

    #[test]
    fn test_permission_defaults() {
        let rule = permission_to_rule(ApiPermission {
            nic_type: String::new(),
            policy: String::new(),
            priority: None,
            ..permission()
        });
        assert_eq!(rule.nic_type, NicType::Intranet);
        assert_eq!(rule.policy, Policy::Accept);
        assert_eq!(rule.priority, ECS_DEFAULT_PRIORITY);
    }

    #[test]
    fn test_permission_port_range_is_kept_verbatim() {
        let rule = permission_to_rule(ApiPermission {
            port_range: "22".to_string(),
            ..permission()
        });
        assert_eq!(rule.port_range.as_str(), "22");
    }
}

//! Rule store capability trait

use crate::error::Result;
use crate::rule::{DesiredRule, FirewallRule, RuleKey};
use async_trait::async_trait;

/// Security group API abstraction
///
/// A provider exposes only list / revoke / authorize; there is no atomic
/// replace. Implementations report failures as `Err` and perform no retries of
/// their own. The soft-failure policy (empty list on read error, logged revoke
/// failures) is applied by [`Reconciler`](crate::Reconciler), the only caller.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Returns the provider name (e.g., "aliyun-ecs")
    fn name(&self) -> &str;

    /// Ingress rules currently attached to the group, in provider order
    async fn list_rules(&self, group_id: &str) -> Result<Vec<FirewallRule>>;

    /// Remove the rule identified by `key`
    async fn revoke_rule(&self, group_id: &str, key: &RuleKey) -> Result<()>;

    /// Add `rule`; authorizing an already-present rule is accepted by the store
    async fn authorize_rule(&self, group_id: &str, rule: &DesiredRule) -> Result<()>;
}


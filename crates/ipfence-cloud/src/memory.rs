//! In-memory rule store for tests
//!
//! Records every call in order and can be told to fail individual operations.

use crate::error::{CloudError, Result};
use crate::rule::{DesiredRule, FirewallRule, RuleKey, SourceCidr};
use crate::store::RuleStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A call received by [`MemoryRuleStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List(String),
    Revoke(String, RuleKey),
    Authorize(String, DesiredRule),
}

#[derive(Debug, Default)]
struct Inner {
    groups: HashMap<String, Vec<FirewallRule>>,
    calls: Vec<StoreCall>,
    fail_list: bool,
    fail_all_revokes: bool,
    fail_revoke_for: HashSet<SourceCidr>,
    fail_authorize: bool,
}

#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    inner: Mutex<Inner>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(self, group_id: impl Into<String>, rules: Vec<FirewallRule>) -> Self {
        self.lock().groups.insert(group_id.into(), rules);
        self
    }

    pub fn fail_list(self) -> Self {
        self.lock().fail_list = true;
        self
    }

    pub fn fail_all_revokes(self) -> Self {
        self.lock().fail_all_revokes = true;
        self
    }

    pub fn fail_revoke_for(self, cidr: &str) -> Self {
        self.lock().fail_revoke_for.insert(SourceCidr::new(cidr));
        self
    }

    pub fn fail_authorize(self) -> Self {
        self.lock().fail_authorize = true;
        self
    }

    /// Rules currently held for `group_id`
    pub fn rules(&self, group_id: &str) -> Vec<FirewallRule> {
        self.lock().groups.get(group_id).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn revoke_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Revoke(..)))
            .count()
    }

    pub fn authorize_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Authorize(..)))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_rules(&self, group_id: &str) -> Result<Vec<FirewallRule>> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::List(group_id.to_string()));
        if inner.fail_list {
            return Err(CloudError::Transport("simulated list failure".to_string()));
        }
        Ok(inner.groups.get(group_id).cloned().unwrap_or_default())
    }

    async fn revoke_rule(&self, group_id: &str, key: &RuleKey) -> Result<()> {
        let mut inner = self.lock();
        inner
            .calls
            .push(StoreCall::Revoke(group_id.to_string(), key.clone()));
        if inner.fail_all_revokes || inner.fail_revoke_for.contains(&key.source_cidr) {
            return Err(CloudError::ApiError(format!(
                "simulated revoke failure for {}",
                key.source_cidr
            )));
        }
        if let Some(rules) = inner.groups.get_mut(group_id) {
            rules.retain(|rule| rule.key() != *key);
        }
        Ok(())
    }

    async fn authorize_rule(&self, group_id: &str, rule: &DesiredRule) -> Result<()> {
        let mut inner = self.lock();
        inner
            .calls
            .push(StoreCall::Authorize(group_id.to_string(), rule.clone()));
        if inner.fail_authorize {
            return Err(CloudError::ApiError("simulated authorize failure".to_string()));
        }

        let added = FirewallRule {
            protocol: rule.protocol.clone(),
            port_range: rule.port_range.clone(),
            source_cidr: rule.source_cidr.clone(),
            nic_type: rule.nic_type,
            description: rule.description.clone(),
            policy: rule.policy,
            priority: rule.priority,
        };
        let rules = inner.groups.entry(group_id.to_string()).or_default();
        // Re-authorizing an identical rule is a no-op at the store
        if !rules
            .iter()
            .any(|r| r.key() == added.key() && r.policy == added.policy)
        {
            rules.push(added);
        }
        Ok(())
    }
}

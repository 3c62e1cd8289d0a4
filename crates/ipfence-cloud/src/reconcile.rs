//! Rule reconciliation
//!
//! Replaces a stale allow-rule with a fresh one using only list / revoke /
//! authorize. The run has three strictly sequential phases and no rollback:
//!
//! 1. **Normalize**: pin the desired source to a single host (`/32`).
//! 2. **Diff**: read the group once and select managed rules whose source
//!    differs from the desired one.
//! 3. **Converge**: revoke each stale rule in snapshot order, then issue
//!    exactly one authorize for the desired rule.
//!
//! Only the authorize outcome decides success. If authorize fails after stale
//! rules were revoked, the group is left without a matching rule; nothing is
//! re-authorized.

use crate::error::CloudError;
use crate::rule::{DesiredRule, FirewallRule, SecurityGroupSnapshot};
use crate::store::RuleStore;
use std::fmt;
use std::time::Instant;

/// Output of the normalize and diff phases
#[derive(Debug, Clone)]
pub struct Plan {
    /// Security group the plan targets
    pub group_id: String,

    /// Desired rule with its source already normalized
    pub desired: DesiredRule,

    /// Managed rules pointing at an outdated source, in snapshot order
    pub stale: Vec<FirewallRule>,

    /// Managed rules that already carry the desired source
    pub current: usize,

    /// Total rules seen in the snapshot
    pub observed: usize,

    /// Set when the snapshot read failed and an empty one was substituted
    pub snapshot_error: Option<String>,
}

impl Plan {
    /// Diff `snapshot` against `desired`; `desired` must already be normalized
    pub fn from_snapshot(snapshot: &SecurityGroupSnapshot, desired: DesiredRule) -> Self {
        let stale: Vec<FirewallRule> = snapshot
            .iter()
            .filter(|rule| desired.is_stale(rule))
            .cloned()
            .collect();
        let current = snapshot
            .iter()
            .filter(|rule| desired.manages(rule) && !desired.is_stale(rule))
            .count();

        Self {
            group_id: snapshot.group_id.clone(),
            desired,
            stale,
            current,
            observed: snapshot.len(),
            snapshot_error: None,
        }
    }

    pub fn has_stale(&self) -> bool {
        !self.stale.is_empty()
    }

    /// Whether the desired rule is already present with the desired source
    pub fn is_current(&self) -> bool {
        self.current > 0
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            revoke: self.stale.len(),
            authorize: 1,
            unchanged: self.current,
        }
    }
}

/// Counts of planned operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub revoke: usize,
    pub authorize: usize,
    pub unchanged: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to revoke, {} to authorize, {} already current",
            self.revoke, self.authorize, self.unchanged
        )
    }
}

/// Result of one revoke attempt
#[derive(Debug, Clone)]
pub struct RevokeOutcome {
    pub rule: FirewallRule,
    pub error: Option<String>,
}

impl RevokeOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of the converge phase
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// The rule that was authorized (or attempted)
    pub desired: DesiredRule,

    /// One entry per stale rule, in the order revokes were issued
    pub revokes: Vec<RevokeOutcome>,

    /// Error from the authorize call, if it failed
    pub authorize_error: Option<String>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ReconcileReport {
    /// The run succeeded iff the authorize call succeeded
    pub fn is_success(&self) -> bool {
        self.authorize_error.is_none()
    }

    pub fn revoked_count(&self) -> usize {
        self.revokes.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed_revokes(&self) -> impl Iterator<Item = &RevokeOutcome> {
        self.revokes.iter().filter(|r| !r.succeeded())
    }
}

/// Receives converge events as they happen
///
/// All methods default to no-ops.
pub trait ReconcileObserver {
    fn revoking(&mut self, _rule: &FirewallRule) {}

    fn revoked(&mut self, _outcome: &RevokeOutcome) {}

    fn authorizing(&mut self, _rule: &DesiredRule) {}

    fn authorized(&mut self, _rule: &DesiredRule, _error: Option<&CloudError>) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReconcileObserver for NoopObserver {}

/// Drives one security group toward a single desired rule
pub struct Reconciler<'a, S: RuleStore + ?Sized> {
    store: &'a S,
    group_id: String,
}

impl<'a, S: RuleStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, group_id: impl Into<String>) -> Self {
        Self {
            store,
            group_id: group_id.into(),
        }
    }

    /// Normalize and diff. Never fails: a list error yields a plan over an
    /// empty snapshot with `snapshot_error` set.
    pub async fn plan(&self, desired: &DesiredRule) -> Plan {
        let desired = desired.normalized();

        match self.store.list_rules(&self.group_id).await {
            Ok(rules) => {
                let snapshot = SecurityGroupSnapshot::new(self.group_id.clone(), rules);
                tracing::debug!(
                    "Read {} rules from {} via {}",
                    snapshot.len(),
                    self.group_id,
                    self.store.name()
                );
                Plan::from_snapshot(&snapshot, desired)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to list rules for {}, treating as empty: {}",
                    self.group_id,
                    e
                );
                let snapshot = SecurityGroupSnapshot::empty(self.group_id.clone());
                let mut plan = Plan::from_snapshot(&snapshot, desired);
                plan.snapshot_error = Some(e.to_string());
                plan
            }
        }
    }

    /// Revoke every stale rule, then authorize the desired rule once
    pub async fn apply<O>(&self, plan: &Plan, observer: &mut O) -> ReconcileReport
    where
        O: ReconcileObserver + ?Sized,
    {
        let start = Instant::now();
        let mut revokes = Vec::with_capacity(plan.stale.len());

        for rule in &plan.stale {
            observer.revoking(rule);
            tracing::info!("Revoking stale rule: {}", rule);

            let outcome = match self.store.revoke_rule(&self.group_id, &rule.key()).await {
                Ok(()) => RevokeOutcome {
                    rule: rule.clone(),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("Failed to revoke {}: {}", rule.source_cidr, e);
                    RevokeOutcome {
                        rule: rule.clone(),
                        error: Some(e.to_string()),
                    }
                }
            };

            observer.revoked(&outcome);
            revokes.push(outcome);
        }

        observer.authorizing(&plan.desired);
        tracing::info!("Authorizing rule for {}", plan.desired.source_cidr);

        let authorize_error = match self
            .store
            .authorize_rule(&self.group_id, &plan.desired)
            .await
        {
            Ok(()) => {
                observer.authorized(&plan.desired, None);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to authorize {}: {}", plan.desired.source_cidr, e);
                observer.authorized(&plan.desired, Some(&e));
                Some(e.to_string())
            }
        };

        ReconcileReport {
            desired: plan.desired.clone(),
            revokes,
            authorize_error,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Plan and apply in one call
    pub async fn reconcile<O>(&self, desired: &DesiredRule, observer: &mut O) -> ReconcileReport
    where
        O: ReconcileObserver + ?Sized,
    {
        let plan = self.plan(desired).await;
        self.apply(&plan, observer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryRuleStore, StoreCall};
    use crate::rule::{
        DEFAULT_DESCRIPTION, NicType, Policy, PortRange, Protocol, SourceCidr,
    };

    const GROUP: &str = "sg-test";

    fn existing(cidr: &str, description: &str) -> FirewallRule {
        FirewallRule {
            protocol: Protocol::Tcp,
            port_range: PortRange::single(22),
            source_cidr: SourceCidr::new(cidr),
            nic_type: NicType::Intranet,
            description: description.to_string(),
            policy: Policy::Accept,
            priority: 1,
        }
    }

    fn desired(ip: &str) -> DesiredRule {
        DesiredRule::new(Protocol::Tcp, PortRange::single(22), ip, DEFAULT_DESCRIPTION)
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ReconcileObserver for Recorder {
        fn revoking(&mut self, rule: &FirewallRule) {
            self.events.push(format!("revoking {}", rule.source_cidr));
        }

        fn revoked(&mut self, outcome: &RevokeOutcome) {
            self.events.push(format!(
                "revoked {} ok={}",
                outcome.rule.source_cidr,
                outcome.succeeded()
            ));
        }

        fn authorizing(&mut self, rule: &DesiredRule) {
            self.events.push(format!("authorizing {}", rule.source_cidr));
        }

        fn authorized(&mut self, rule: &DesiredRule, error: Option<&CloudError>) {
            self.events
                .push(format!("authorized {} ok={}", rule.source_cidr, error.is_none()));
        }
    }

    #[tokio::test]
    async fn test_replaces_stale_rule() {
        let store =
            MemoryRuleStore::new().with_rules(GROUP, vec![existing("1.2.3.4/32", DEFAULT_DESCRIPTION)]);
        let reconciler = Reconciler::new(&store, GROUP);

        let report = reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;

        assert!(report.is_success());
        assert_eq!(report.revoked_count(), 1);

        let calls = store.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], StoreCall::List(g) if g == GROUP));
        assert!(
            matches!(&calls[1], StoreCall::Revoke(_, key) if key.source_cidr.as_str() == "1.2.3.4/32")
        );
        assert!(
            matches!(&calls[2], StoreCall::Authorize(_, rule) if rule.source_cidr.as_str() == "5.6.7.8/32")
        );

        let rules = store.rules(GROUP);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source_cidr.as_str(), "5.6.7.8/32");
        assert_eq!(rules[0].description, DEFAULT_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_current_rule_is_left_alone() {
        let store =
            MemoryRuleStore::new().with_rules(GROUP, vec![existing("5.6.7.8/32", DEFAULT_DESCRIPTION)]);
        let reconciler = Reconciler::new(&store, GROUP);

        let plan = reconciler.plan(&desired("5.6.7.8")).await;
        assert!(!plan.has_stale());
        assert!(plan.is_current());

        let report = reconciler.apply(&plan, &mut NoopObserver).await;
        assert!(report.is_success());
        assert_eq!(store.revoke_count(), 0);
        assert_eq!(store.authorize_count(), 1);
        assert_eq!(store.rules(GROUP).len(), 1);
    }

    #[tokio::test]
    async fn test_first_run_goes_straight_to_authorize() {
        let store = MemoryRuleStore::new();
        let reconciler = Reconciler::new(&store, GROUP);

        let report = reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;

        assert!(report.is_success());
        assert!(report.revokes.is_empty());
        assert_eq!(store.revoke_count(), 0);
        assert_eq!(store.authorize_count(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_is_treated_as_empty() {
        let store = MemoryRuleStore::new()
            .with_rules(GROUP, vec![existing("1.2.3.4/32", DEFAULT_DESCRIPTION)])
            .fail_list();
        let reconciler = Reconciler::new(&store, GROUP);

        let plan = reconciler.plan(&desired("5.6.7.8")).await;
        assert!(plan.snapshot_error.is_some());
        assert!(plan.stale.is_empty());

        let report = reconciler.apply(&plan, &mut NoopObserver).await;
        assert!(report.is_success());
        assert_eq!(store.revoke_count(), 0);
        assert_eq!(store.authorize_count(), 1);
    }

    #[tokio::test]
    async fn test_authorize_failure_after_revoke_is_not_rolled_back() {
        let store = MemoryRuleStore::new()
            .with_rules(GROUP, vec![existing("1.2.3.4/32", DEFAULT_DESCRIPTION)])
            .fail_authorize();
        let reconciler = Reconciler::new(&store, GROUP);

        let report = reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;

        assert!(!report.is_success());
        assert_eq!(report.revoked_count(), 1);
        assert!(report.authorize_error.is_some());
        // The revoked rule stays gone and nothing else was attempted
        assert!(store.rules(GROUP).is_empty());
        assert_eq!(store.authorize_count(), 1);
        assert_eq!(store.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_revoke_failures_do_not_stop_the_run() {
        let store = MemoryRuleStore::new()
            .with_rules(
                GROUP,
                vec![
                    existing("1.1.1.1/32", DEFAULT_DESCRIPTION),
                    existing("2.2.2.2/32", DEFAULT_DESCRIPTION),
                    existing("3.3.3.3/32", DEFAULT_DESCRIPTION),
                ],
            )
            .fail_revoke_for("2.2.2.2/32");
        let reconciler = Reconciler::new(&store, GROUP);

        let report = reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;

        assert!(report.is_success());
        assert_eq!(store.revoke_count(), 3);
        assert_eq!(store.authorize_count(), 1);
        assert_eq!(report.revoked_count(), 2);
        let failed: Vec<_> = report.failed_revokes().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].rule.source_cidr.as_str(), "2.2.2.2/32");
    }

    #[tokio::test]
    async fn test_revokes_follow_snapshot_order() {
        let store = MemoryRuleStore::new()
            .with_rules(
                GROUP,
                vec![
                    existing("1.1.1.1/32", DEFAULT_DESCRIPTION),
                    existing("5.6.7.8/32", DEFAULT_DESCRIPTION),
                    existing("2.2.2.2/32", DEFAULT_DESCRIPTION),
                    existing("4.4.4.4/32", "office VPN"),
                    existing("3.3.3.3/32", DEFAULT_DESCRIPTION),
                ],
            )
            .fail_revoke_for("2.2.2.2/32");
        let reconciler = Reconciler::new(&store, GROUP);

        let report = reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;
        assert!(report.is_success());

        let writes: Vec<String> = store
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::List(_) => None,
                StoreCall::Revoke(_, key) => Some(format!("revoke {}", key.source_cidr)),
                StoreCall::Authorize(_, rule) => Some(format!("authorize {}", rule.source_cidr)),
            })
            .collect();
        assert_eq!(
            writes,
            vec![
                "revoke 1.1.1.1/32",
                "revoke 2.2.2.2/32",
                "revoke 3.3.3.3/32",
                "authorize 5.6.7.8/32",
            ]
        );

        let order: Vec<&str> = report
            .revokes
            .iter()
            .map(|r| r.rule.source_cidr.as_str())
            .collect();
        assert_eq!(order, vec!["1.1.1.1/32", "2.2.2.2/32", "3.3.3.3/32"]);
    }

    #[tokio::test]
    async fn test_revoke_and_authorize_counts_for_any_stale_set() {
        for n in 0..5 {
            let rules = (0..n)
                .map(|i| existing(&format!("10.0.0.{i}/32"), DEFAULT_DESCRIPTION))
                .collect();
            let store = MemoryRuleStore::new()
                .with_rules(GROUP, rules)
                .fail_all_revokes();
            let reconciler = Reconciler::new(&store, GROUP);

            let report = reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;

            assert_eq!(store.revoke_count(), n);
            assert_eq!(store.authorize_count(), 1);
            assert!(report.is_success());
        }
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store =
            MemoryRuleStore::new().with_rules(GROUP, vec![existing("1.2.3.4/32", DEFAULT_DESCRIPTION)]);
        let reconciler = Reconciler::new(&store, GROUP);

        reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;
        let after_first = store.rules(GROUP);

        let plan = reconciler.plan(&desired("5.6.7.8")).await;
        assert!(plan.stale.is_empty());
        let report = reconciler.apply(&plan, &mut NoopObserver).await;

        assert!(report.is_success());
        assert_eq!(store.rules(GROUP), after_first);
    }

    #[tokio::test]
    async fn test_prefixless_source_is_stored_as_single_host() {
        for ip in ["5.6.7.8", "192.168.0.1", "not-an-ip.example"] {
            let store = MemoryRuleStore::new();
            let reconciler = Reconciler::new(&store, GROUP);

            reconciler.reconcile(&desired(ip), &mut NoopObserver).await;

            let rules = store.rules(GROUP);
            assert_eq!(rules.len(), 1);
            assert!(rules[0].source_cidr.as_str().ends_with("/32"));
        }
    }

    #[tokio::test]
    async fn test_explicit_prefix_is_kept() {
        let store = MemoryRuleStore::new();
        let reconciler = Reconciler::new(&store, GROUP);

        let plan = reconciler.plan(&desired("10.0.0.0/24")).await;
        assert_eq!(plan.desired.source_cidr.as_str(), "10.0.0.0/24");
    }

    #[tokio::test]
    async fn test_foreign_description_is_never_touched() {
        let store = MemoryRuleStore::new().with_rules(
            GROUP,
            vec![
                existing("1.2.3.4/32", "office VPN"),
                existing("9.9.9.9/32", DEFAULT_DESCRIPTION),
            ],
        );
        let reconciler = Reconciler::new(&store, GROUP);

        reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;

        let cidrs: Vec<String> = store
            .rules(GROUP)
            .iter()
            .map(|r| r.source_cidr.to_string())
            .collect();
        assert!(cidrs.contains(&"1.2.3.4/32".to_string()));
        assert!(!cidrs.contains(&"9.9.9.9/32".to_string()));
        assert!(cidrs.contains(&"5.6.7.8/32".to_string()));
    }

    #[tokio::test]
    async fn test_revoke_uses_stale_rule_identity() {
        let mut stale = existing("1.2.3.4/32", DEFAULT_DESCRIPTION);
        stale.protocol = "TCP".parse().unwrap();
        stale.nic_type = NicType::Internet;
        let store = MemoryRuleStore::new().with_rules(GROUP, vec![stale]);
        let reconciler = Reconciler::new(&store, GROUP);

        reconciler.reconcile(&desired("5.6.7.8"), &mut NoopObserver).await;

        let calls = store.calls();
        assert!(matches!(
            &calls[1],
            StoreCall::Revoke(_, key) if key.nic_type == NicType::Internet
        ));
    }

    #[tokio::test]
    async fn test_observer_sees_events_in_order() {
        let store =
            MemoryRuleStore::new().with_rules(GROUP, vec![existing("1.2.3.4/32", DEFAULT_DESCRIPTION)]);
        let reconciler = Reconciler::new(&store, GROUP);
        let mut recorder = Recorder::default();

        reconciler.reconcile(&desired("5.6.7.8"), &mut recorder).await;

        assert_eq!(
            recorder.events,
            vec![
                "revoking 1.2.3.4/32",
                "revoked 1.2.3.4/32 ok=true",
                "authorizing 5.6.7.8/32",
                "authorized 5.6.7.8/32 ok=true",
            ]
        );
    }

    #[test]
    fn test_plan_summary_display() {
        let snapshot = SecurityGroupSnapshot::new(
            GROUP,
            vec![
                existing("1.2.3.4/32", DEFAULT_DESCRIPTION),
                existing("5.6.7.8/32", DEFAULT_DESCRIPTION),
            ],
        );
        let plan = Plan::from_snapshot(&snapshot, desired("5.6.7.8").normalized());

        assert_eq!(plan.observed, 2);
        assert_eq!(
            plan.summary().to_string(),
            "1 to revoke, 1 to authorize, 1 already current"
        );
    }
}

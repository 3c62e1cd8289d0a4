//! ipfence Cloud Core
//!
//! Provider-neutral model and reconciliation logic for keeping one security
//! group rule pinned to the caller's current public IP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  ipfence CLI                     │
//! │          (resolve IP → reconcile → exit)         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                ipfence-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │              Reconciler                   │   │
//! │  │  normalize → diff → revoke* → authorize   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Rule Model  │  │ trait        │            │
//! │  │              │  │ RuleStore    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │  aliyun-ecs   │
//! │   provider    │
//! └───────────────┘
//! ```

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod reconcile;
pub mod rule;
pub mod store;

// Re-exports
pub use error::{CloudError, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryRuleStore, StoreCall};
pub use reconcile::{
    NoopObserver, Plan, PlanSummary, ReconcileObserver, ReconcileReport, Reconciler, RevokeOutcome,
};
pub use rule::{
    DEFAULT_DESCRIPTION, DEFAULT_PRIORITY, DesiredRule, FirewallRule, NicType, Policy, PortRange,
    Protocol, RuleKey, SINGLE_HOST_PREFIX, SecurityGroupSnapshot, SourceCidr,
};
pub use store::RuleStore;

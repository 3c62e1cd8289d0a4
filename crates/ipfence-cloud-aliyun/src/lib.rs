//! Alibaba Cloud provider for ipfence
//!
//! This crate implements the RuleStore trait for Alibaba Cloud ECS security
//! groups, talking to the ECS RPC API directly.
//!
//! # Features
//!
//! - List ingress permissions (`DescribeSecurityGroupAttribute`)
//! - Revoke a rule (`RevokeSecurityGroup`)
//! - Authorize a rule (`AuthorizeSecurityGroup`)
//! - ACS3-HMAC-SHA256 request signing
//!
//! # Requirements
//!
//! - `ALIBABA_CLOUD_ACCESS_KEY_ID`, `ALIBABA_CLOUD_ACCESS_KEY_SECRET` env vars
//!
//! # Example
//!
//! ```ignore
//! use ipfence_cloud::{DesiredRule, NoopObserver, PortRange, Protocol, Reconciler};
//! use ipfence_cloud_aliyun::{AliyunRuleStore, Credentials, EcsConfig};
//!
//! let config = EcsConfig::new(Credentials::from_env()?, "cn-hangzhou", None);
//! let store = AliyunRuleStore::new(config)?;
//!
//! let desired = DesiredRule::new(Protocol::Tcp, PortRange::single(22), "203.0.113.7", "home");
//! let report = Reconciler::new(&store, "sg-bp1example")
//!     .reconcile(&desired, &mut NoopObserver)
//!     .await;
//! ```

pub mod config;
pub mod ecs;
pub mod error;
pub mod provider;
pub mod signer;

pub use config::{ACCESS_KEY_ID_ENV, ACCESS_KEY_SECRET_ENV, Credentials, EcsConfig};
pub use ecs::{ECS_API_VERSION, EcsClient};
pub use error::{AliyunError, Result};
pub use provider::AliyunRuleStore;

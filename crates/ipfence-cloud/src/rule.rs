//! Security group rule model
//!
//! These types are ephemeral views of remote state. Nothing here is persisted;
//! a [`SecurityGroupSnapshot`] is read fresh at the start of every run.

use crate::error::{CloudError, Result};
use std::fmt;
use std::str::FromStr;

/// Description stamped on rules this tool manages unless the caller overrides it
pub const DEFAULT_DESCRIPTION: &str = "Auto-updated from home IP";

/// Priority sent with every authorize call
pub const DEFAULT_PRIORITY: i32 = 100;

/// Prefix that pins a CIDR to exactly one address
pub const SINGLE_HOST_PREFIX: &str = "/32";

/// IP protocol of a rule
///
/// Parsing is case-insensitive and never fails: values the provider may return
/// that this tool does not model (e.g. `GRE`) are kept as [`Protocol::Other`]
/// in lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    All,
    Other(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::All => "all",
            Protocol::Other(p) => p,
        }
    }
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Ok(match lower.as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "icmp" => Protocol::Icmp,
            "all" => Protocol::All,
            _ => Protocol::Other(lower),
        })
    }
}

impl From<&str> for Protocol {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(p) => p,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port interval as written on the wire, e.g. `22/22` or `-1/-1` for all ports
///
/// Carried verbatim and compared by exact string. A malformed value is left for
/// the provider to reject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRange(String);

impl PortRange {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `PORT/PORT`
    pub fn single(port: u16) -> Self {
        Self(format!("{port}/{port}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PortRange {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source address of a rule, e.g. `203.0.113.7/32`
///
/// The address part is carried verbatim; a malformed address is left for the
/// provider to reject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceCidr(String);

impl SourceCidr {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix(&self) -> bool {
        self.0.contains('/')
    }

    /// Appends `/32` when no prefix is present
    pub fn normalized(&self) -> Self {
        if self.has_prefix() {
            self.clone()
        } else {
            Self(format!("{}{}", self.0, SINGLE_HOST_PREFIX))
        }
    }
}

impl fmt::Display for SourceCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network scope a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NicType {
    Internet,
    #[default]
    Intranet,
}

impl FromStr for NicType {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "internet" => Ok(NicType::Internet),
            "intranet" => Ok(NicType::Intranet),
            other => Err(CloudError::InvalidRule(format!(
                "unknown nic type '{other}' (expected internet or intranet)"
            ))),
        }
    }
}

impl fmt::Display for NicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NicType::Internet => write!(f, "internet"),
            NicType::Intranet => write!(f, "intranet"),
        }
    }
}

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Policy {
    #[default]
    Accept,
    Drop,
}

impl FromStr for Policy {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Policy::Accept),
            "drop" => Ok(Policy::Drop),
            other => Err(CloudError::InvalidRule(format!(
                "unknown policy '{other}' (expected accept or drop)"
            ))),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Accept => write!(f, "accept"),
            Policy::Drop => write!(f, "drop"),
        }
    }
}

/// A rule currently attached to a security group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub protocol: Protocol,
    pub port_range: PortRange,
    pub source_cidr: SourceCidr,
    pub nic_type: NicType,
    /// Free text; the only stable correlation key the API offers
    pub description: String,
    pub policy: Policy,
    /// Lower value wins
    pub priority: i32,
}

impl FirewallRule {
    /// The fields a revoke call identifies this rule by
    pub fn key(&self) -> RuleKey {
        RuleKey {
            protocol: self.protocol.clone(),
            port_range: self.port_range.clone(),
            source_cidr: self.source_cidr.clone(),
            nic_type: self.nic_type,
        }
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} from {} ({}, {}, priority {}) \"{}\"",
            self.protocol,
            self.port_range,
            self.source_cidr,
            self.nic_type,
            self.policy,
            self.priority,
            self.description
        )
    }
}

/// Identity of a rule for revocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub protocol: Protocol,
    pub port_range: PortRange,
    pub source_cidr: SourceCidr,
    pub nic_type: NicType,
}

/// The rule the caller wants to exist after this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRule {
    pub protocol: Protocol,
    pub port_range: PortRange,
    pub source_cidr: SourceCidr,
    pub description: String,
    pub nic_type: NicType,
    pub policy: Policy,
    pub priority: i32,
}

impl DesiredRule {
    pub fn new(
        protocol: Protocol,
        port_range: PortRange,
        source: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            protocol,
            port_range,
            source_cidr: SourceCidr::new(source),
            description: description.into(),
            nic_type: NicType::default(),
            policy: Policy::default(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_nic_type(mut self, nic_type: NicType) -> Self {
        self.nic_type = nic_type;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Copy of this rule whose source is pinned to a single host
    pub fn normalized(&self) -> Self {
        Self {
            source_cidr: self.source_cidr.normalized(),
            ..self.clone()
        }
    }

    /// Whether `rule` carries the identity this tool manages:
    /// same protocol, port range and description
    pub fn manages(&self, rule: &FirewallRule) -> bool {
        rule.protocol == self.protocol
            && rule.port_range == self.port_range
            && rule.description == self.description
    }

    /// A managed rule pointing at some other source
    pub fn is_stale(&self, rule: &FirewallRule) -> bool {
        self.manages(rule) && rule.source_cidr != self.source_cidr
    }
}

/// Rules attached to one security group at read time, in provider order
#[derive(Debug, Clone, Default)]
pub struct SecurityGroupSnapshot {
    pub group_id: String,
    pub rules: Vec<FirewallRule>,
}

impl SecurityGroupSnapshot {
    pub fn new(group_id: impl Into<String>, rules: Vec<FirewallRule>) -> Self {
        Self {
            group_id: group_id.into(),
            rules,
        }
    }

    pub fn empty(group_id: impl Into<String>) -> Self {
        Self::new(group_id, Vec::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FirewallRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

//! Immutable policy snapshots and the store that swaps them.
//!
//! Every resolution reads one snapshot from start to finish. Reloading a
//! policy builds a fresh snapshot and swaps the shared pointer, so
//! in-flight envelopes never see a half-applied rule set.

use crate::rules::{RoutingRule, RuleCondition};
use cw_core::{ActionKind, Envelope, Severity, TenantId};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised while loading or validating a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid policy: {reason}")]
    Invalid { reason: String },
}

/// The rule set and no-match fallback in effect for one tenant.
///
/// `default_actions` applies when no rule matches: `Some(vec![])` is a
/// deliberate observe-only fallback, `None` means no fallback was
/// configured and a no-match is a logged misconfiguration.
#[derive(Debug, Clone, Default)]
pub struct TenantPolicy {
    pub rules: Vec<RoutingRule>,
    pub default_actions: Option<Vec<ActionKind>>,
}

/// An immutable, fully validated rule set.
///
/// Tenant overrides replace the default policy wholesale for that
/// tenant, rules and no-match defaults both; there is no per-rule
/// merging and no fallback from an override to the default set.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    /// Opaque label carried through logs, usually a date or revision.
    pub version: String,
    default_policy: TenantPolicy,
    tenant_overrides: HashMap<TenantId, TenantPolicy>,
}

impl PolicySnapshot {
    /// Builds a snapshot, rejecting duplicate rule names per rule set.
    pub fn new(
        version: String,
        default_policy: TenantPolicy,
        tenant_overrides: HashMap<TenantId, TenantPolicy>,
    ) -> Result<Self, PolicyError> {
        validate_rule_names(&default_policy.rules, "default")?;
        for (tenant, policy) in &tenant_overrides {
            validate_rule_names(&policy.rules, tenant.as_str())?;
        }
        Ok(Self {
            version,
            default_policy,
            tenant_overrides,
        })
    }

    /// The built-in routing policy: page-worthy severities get the full
    /// page/ticket/alert treatment, medium gets a ticket, everything else
    /// falls through to an explicit observe-only default.
    pub fn builtin() -> Self {
        Self {
            version: "builtin".to_string(),
            default_policy: TenantPolicy {
                rules: vec![
                    RoutingRule::new(
                        "page-on-high-severity",
                        vec![RuleCondition::SeverityAtLeast(Severity::High)],
                        vec![ActionKind::Page, ActionKind::Ticket, ActionKind::Alert],
                    )
                    .with_description("High and critical investigations page the on-call"),
                    RoutingRule::new(
                        "ticket-on-medium",
                        vec![RuleCondition::SeverityIn(vec![Severity::Medium])],
                        vec![ActionKind::Ticket],
                    )
                    .with_description("Medium investigations open a ticket"),
                ],
                default_actions: Some(vec![]),
            },
            tenant_overrides: HashMap::new(),
        }
    }

    /// Loads a snapshot from a TOML policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parses a snapshot from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = toml::from_str(raw)?;
        let mut overrides = HashMap::new();
        for entry in file.tenant_overrides {
            if !entry.tenant.is_well_formed() {
                return Err(PolicyError::Invalid {
                    reason: format!("malformed tenant id in override: {}", entry.tenant),
                });
            }
            let policy = TenantPolicy {
                rules: entry.rules,
                default_actions: entry.default_actions,
            };
            if overrides.insert(entry.tenant.clone(), policy).is_some() {
                return Err(PolicyError::Invalid {
                    reason: format!("duplicate tenant override: {}", entry.tenant),
                });
            }
        }
        Self::new(
            file.version.unwrap_or_else(|| "unversioned".to_string()),
            TenantPolicy {
                rules: file.rules,
                default_actions: file.default_actions,
            },
            overrides,
        )
    }

    /// Returns the policy in effect for the given tenant.
    pub fn policy_for(&self, tenant: &TenantId) -> &TenantPolicy {
        self.tenant_overrides
            .get(tenant)
            .unwrap_or(&self.default_policy)
    }

    /// Resolves the envelope against the policy for its tenant.
    pub fn route(&self, envelope: &Envelope) -> crate::engine::RouteDecision {
        let policy = self.policy_for(&envelope.tenant_id);
        crate::engine::resolve(&policy.rules, policy.default_actions.as_deref(), envelope)
    }
}

fn validate_rule_names(rules: &[RoutingRule], scope: &str) -> Result<(), PolicyError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if rule.name.is_empty() {
            return Err(PolicyError::Invalid {
                reason: format!("unnamed rule in {scope} rule set"),
            });
        }
        if !seen.insert(rule.name.as_str()) {
            return Err(PolicyError::Invalid {
                reason: format!("duplicate rule name '{}' in {scope} rule set", rule.name),
            });
        }
    }
    Ok(())
}

/// On-disk policy file shape.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    version: Option<String>,
    #[serde(default)]
    default_actions: Option<Vec<ActionKind>>,
    #[serde(default, rename = "rule")]
    rules: Vec<RoutingRule>,
    #[serde(default, rename = "tenant_override")]
    tenant_overrides: Vec<TenantOverride>,
}

#[derive(Debug, Deserialize)]
struct TenantOverride {
    tenant: TenantId,
    #[serde(default)]
    default_actions: Option<Vec<ActionKind>>,
    #[serde(default, rename = "rule")]
    rules: Vec<RoutingRule>,
}

/// Shared handle to the current snapshot.
///
/// Readers clone an `Arc` and evaluate against it; `replace` swaps the
/// pointer atomically so reloads never block resolution.
pub struct PolicyStore {
    current: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyStore {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Returns the snapshot in effect right now.
    pub async fn current(&self) -> Arc<PolicySnapshot> {
        self.current.read().await.clone()
    }

    /// Installs a new snapshot. In-flight resolutions keep the one they
    /// started with.
    pub async fn replace(&self, snapshot: PolicySnapshot) {
        let version = snapshot.version.clone();
        *self.current.write().await = Arc::new(snapshot);
        tracing::info!(%version, "policy snapshot replaced");
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(PolicySnapshot::builtin())
    }
}

//! Routing rule definitions.
//!
//! A rule pairs a set of conditions over a validated envelope with the
//! actions to fire when every condition holds.

use cw_core::{ActionKind, Envelope, InvestigationStatus, Severity};
use serde::{Deserialize, Serialize};

/// A routing rule evaluated against each accepted envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Unique name for this rule.
    pub name: String,
    /// Description of what this rule does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Conditions that must all be true for this rule to match.
    pub conditions: Vec<RuleCondition>,
    /// Actions to fire on match. `None` marks a misconfigured rule; the
    /// engine treats it as observe-only and logs a warning. An explicit
    /// empty list is a deliberate observe-only rule.
    #[serde(default)]
    pub actions: Option<Vec<ActionKind>>,
    /// Whether this rule is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RoutingRule {
    /// Creates a new enabled rule.
    pub fn new(name: &str, conditions: Vec<RuleCondition>, actions: Vec<ActionKind>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            conditions,
            actions: Some(actions),
            enabled: true,
        }
    }

    /// Sets the rule description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Enables or disables the rule.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Checks if this rule matches the given envelope.
    pub fn matches(&self, envelope: &Envelope) -> bool {
        if !self.enabled {
            return false;
        }
        self.conditions.iter().all(|c| c.evaluate(envelope))
    }
}

/// Conditions that can be used in routing rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    /// Severity must be at or above the given level.
    SeverityAtLeast(Severity),
    /// Severity must be in the given list.
    SeverityIn(Vec<Severity>),
    /// Status must match.
    StatusIs(InvestigationStatus),
    /// Status must be in the given list.
    StatusIn(Vec<InvestigationStatus>),
    /// Category must match exactly.
    CategoryIs(String),
    /// Category must be in the given list.
    CategoryIn(Vec<String>),
    /// All sub-conditions must match.
    All(Vec<RuleCondition>),
    /// Any sub-condition must match.
    Any(Vec<RuleCondition>),
    /// Sub-condition must NOT match.
    Not(Box<RuleCondition>),
    /// Always true.
    Always,
}

impl RuleCondition {
    /// Evaluates this condition against the given envelope.
    pub fn evaluate(&self, envelope: &Envelope) -> bool {
        match self {
            RuleCondition::SeverityAtLeast(level) => envelope.severity >= *level,

            RuleCondition::SeverityIn(levels) => levels.contains(&envelope.severity),

            RuleCondition::StatusIs(status) => envelope.status == *status,

            RuleCondition::StatusIn(statuses) => statuses.contains(&envelope.status),

            RuleCondition::CategoryIs(category) => envelope.category == *category,

            RuleCondition::CategoryIn(categories) => categories.contains(&envelope.category),

            RuleCondition::All(conditions) => conditions.iter().all(|c| c.evaluate(envelope)),

            RuleCondition::Any(conditions) => conditions.iter().any(|c| c.evaluate(envelope)),

            RuleCondition::Not(condition) => !condition.evaluate(envelope),

            RuleCondition::Always => true,
        }
    }
}

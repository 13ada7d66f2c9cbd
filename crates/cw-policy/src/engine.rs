//! Pure rule evaluation.
//!
//! Resolution is deterministic: the same rule set and the same envelope
//! always produce the same action list, in rule order, with duplicates
//! removed. Resolution never performs I/O.

use crate::rules::RoutingRule;
use cw_core::{ActionKind, Envelope};
use serde::Serialize;

/// The outcome of evaluating a rule set against one envelope.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RouteDecision {
    /// Actions to fire, in first-match order, deduplicated.
    pub actions: Vec<ActionKind>,
    /// Names of the rules that matched, in evaluation order.
    pub matched_rules: Vec<String>,
    /// True when no rule matched and the snapshot's default actions were
    /// applied instead.
    pub used_default_actions: bool,
}

impl RouteDecision {
    /// Returns whether any action should fire.
    pub fn is_actionable(&self) -> bool {
        !self.actions.is_empty()
    }
}

/// Evaluates every enabled rule against the envelope.
///
/// When no rule matches, `default_actions` applies: an explicit list
/// (empty meaning deliberate observe-only) fills the decision, while an
/// absent one is a misconfiguration — logged, and resolved as
/// observe-only so the envelope still lands in the store.
///
/// A matching rule whose action list is absent is likewise a
/// misconfiguration; it is reported once per resolution and contributes
/// nothing.
pub fn resolve(
    rules: &[RoutingRule],
    default_actions: Option<&[ActionKind]>,
    envelope: &Envelope,
) -> RouteDecision {
    let mut decision = RouteDecision::default();
    for rule in rules {
        if !rule.matches(envelope) {
            continue;
        }
        decision.matched_rules.push(rule.name.clone());
        match &rule.actions {
            Some(actions) => {
                for action in actions {
                    if !decision.actions.contains(action) {
                        decision.actions.push(*action);
                    }
                }
            }
            None => {
                tracing::warn!(
                    rule = %rule.name,
                    tenant_id = %envelope.tenant_id,
                    "matched rule has no action list, treating as observe-only"
                );
            }
        }
    }
    if decision.matched_rules.is_empty() {
        match default_actions {
            Some(defaults) => {
                for action in defaults {
                    if !decision.actions.contains(action) {
                        decision.actions.push(*action);
                    }
                }
                decision.used_default_actions = true;
            }
            None => {
                tracing::warn!(
                    tenant_id = %envelope.tenant_id,
                    category = %envelope.category,
                    "policy misconfiguration: no rule matched and no default actions configured, treating as observe-only"
                );
            }
        }
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCondition;
    use cw_core::{InvestigationStatus, Severity, TenantId};
    use chrono::Utc;
    use std::collections::HashMap;

    fn envelope(severity: Severity) -> Envelope {
        Envelope {
            investigation_id: "inv-1".to_string(),
            tenant_id: TenantId::new("acme"),
            occurred_at: Utc::now(),
            severity,
            status: InvestigationStatus::Investigating,
            category: "db-pool".to_string(),
            summary: "pool exhausted".to_string(),
            resource_refs: vec![],
            links: HashMap::new(),
        }
    }

    #[test]
    fn test_actions_dedup_preserves_first_match_order() {
        let rules = vec![
            RoutingRule::new(
                "page-high",
                vec![RuleCondition::SeverityAtLeast(Severity::High)],
                vec![ActionKind::Page, ActionKind::Ticket],
            ),
            RoutingRule::new(
                "ticket-db",
                vec![RuleCondition::CategoryIs("db-pool".to_string())],
                vec![ActionKind::Ticket, ActionKind::Alert],
            ),
        ];

        let decision = resolve(&rules, Some(&[]), &envelope(Severity::High));
        assert_eq!(
            decision.actions,
            vec![ActionKind::Page, ActionKind::Ticket, ActionKind::Alert]
        );
        assert_eq!(decision.matched_rules, vec!["page-high", "ticket-db"]);
        assert!(!decision.used_default_actions);
    }

    #[test]
    fn test_no_match_with_empty_defaults_is_observe_only() {
        let rules = vec![RoutingRule::new(
            "page-critical",
            vec![RuleCondition::SeverityAtLeast(Severity::Critical)],
            vec![ActionKind::Page],
        )];

        let decision = resolve(&rules, Some(&[]), &envelope(Severity::Low));
        assert!(!decision.is_actionable());
        assert!(decision.matched_rules.is_empty());
        assert!(decision.used_default_actions);
    }

    #[test]
    fn test_no_match_falls_back_to_default_actions() {
        let rules = vec![RoutingRule::new(
            "page-critical",
            vec![RuleCondition::SeverityAtLeast(Severity::Critical)],
            vec![ActionKind::Page],
        )];

        let decision = resolve(&rules, Some(&[ActionKind::Ticket]), &envelope(Severity::Low));
        assert_eq!(decision.actions, vec![ActionKind::Ticket]);
        assert!(decision.matched_rules.is_empty());
        assert!(decision.used_default_actions);
    }

    #[test]
    fn test_defaults_do_not_apply_when_a_rule_matched() {
        // A matched rule with an empty action list is a deliberate
        // observe-only decision; the defaults must not override it.
        let rules = vec![RoutingRule::new(
            "watch-db",
            vec![RuleCondition::CategoryIs("db-pool".to_string())],
            vec![],
        )];

        let decision = resolve(&rules, Some(&[ActionKind::Page]), &envelope(Severity::High));
        assert_eq!(decision.matched_rules, vec!["watch-db"]);
        assert!(!decision.is_actionable());
        assert!(!decision.used_default_actions);
    }

    #[test]
    fn test_no_rules_and_no_defaults_is_misconfiguration() {
        let decision = resolve(&[], None, &envelope(Severity::Critical));
        assert!(!decision.is_actionable());
        assert!(decision.matched_rules.is_empty());
        // The miss is logged, not filled in from defaults.
        assert!(!decision.used_default_actions);
    }

    #[test]
    fn test_missing_action_list_contributes_nothing() {
        let mut misconfigured = RoutingRule::new("broken", vec![RuleCondition::Always], vec![]);
        misconfigured.actions = None;
        let rules = vec![
            misconfigured,
            RoutingRule::new(
                "ticket-all",
                vec![RuleCondition::Always],
                vec![ActionKind::Ticket],
            ),
        ];

        let decision = resolve(&rules, Some(&[]), &envelope(Severity::Medium));
        // The broken rule is recorded as matched but adds no actions.
        assert_eq!(decision.matched_rules, vec!["broken", "ticket-all"]);
        assert_eq!(decision.actions, vec![ActionKind::Ticket]);
    }

    #[test]
    fn test_explicit_empty_actions_is_observe_only() {
        let rules = vec![RoutingRule::new(
            "watch-db",
            vec![RuleCondition::CategoryIs("db-pool".to_string())],
            vec![],
        )];

        let decision = resolve(&rules, Some(&[]), &envelope(Severity::High));
        assert_eq!(decision.matched_rules, vec!["watch-db"]);
        assert!(!decision.is_actionable());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let rules = vec![
            RoutingRule::new(
                "page-high",
                vec![RuleCondition::SeverityAtLeast(Severity::High)],
                vec![ActionKind::Page],
            ),
            RoutingRule::new(
                "ticket-all",
                vec![RuleCondition::Always],
                vec![ActionKind::Ticket],
            ),
        ];

        let env = envelope(Severity::Critical);
        let first = resolve(&rules, Some(&[]), &env);
        let second = resolve(&rules, Some(&[]), &env);
        assert_eq!(first.actions, second.actions);
        assert_eq!(first.matched_rules, second.matched_rules);
    }
}

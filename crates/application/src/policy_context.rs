//! Resolution of stored policy rules into one immutable audit configuration.
//!
//! Rules of the same category merge: personnel and address sets are unioned,
//! production patterns are concatenated in discovery order, and the first
//! long-access rule with an integer `days` defines the threshold, a
//! non-positive value disabling the check. Malformed rules are
//! skipped and reported as [`RuleDiagnostic`] values instead of failing the run.

use std::collections::HashSet;

use bastion_audit_domain::{HostMatcher, HostPattern, IpSet, PolicyRule, RuleCategory, RulePayload};

/// A rule skipped while resolving the policy context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDiagnostic {
    /// Category of the skipped rule.
    pub category: RuleCategory,
    /// Key of the skipped rule.
    pub rule_key: String,
    /// Stored description of the skipped rule, if any.
    pub description: Option<String>,
    /// Why the rule was skipped.
    pub message: String,
}

/// Resolved context plus diagnostics for the rules that were skipped.
#[derive(Debug, Clone)]
pub struct PolicyResolution {
    /// Resolved context.
    pub context: PolicyContext,
    /// Skipped rules.
    pub diagnostics: Vec<RuleDiagnostic>,
}

#[derive(Debug, Clone)]
struct ProductionPattern {
    pattern: HostPattern,
    matcher: HostMatcher,
}

/// Snapshot of policy configuration for one audit run.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    operations_personnel: HashSet<String>,
    long_access_threshold_days: u32,
    production_patterns: Vec<ProductionPattern>,
    master_database_ips: IpSet,
}

impl PolicyContext {
    /// Creates a context with no rules. Only duplicate detection is active.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolves a context from every stored rule.
    #[must_use]
    pub fn from_rules(rules: &[PolicyRule]) -> PolicyResolution {
        let mut context = Self::empty();
        let mut threshold_defined = false;
        let mut diagnostics = Vec::new();

        for rule in rules {
            let payload = match rule.typed_payload() {
                Ok(payload) => payload,
                Err(error) => {
                    diagnostics.push(RuleDiagnostic::for_rule(rule, error.to_string()));
                    continue;
                }
            };

            match payload {
                RulePayload::OperationsPersonnel(payload) => {
                    context.operations_personnel.extend(payload.personnel);
                }
                RulePayload::LongAccessThreshold(payload) => {
                    if !threshold_defined {
                        context.long_access_threshold_days = payload.effective_days();
                        threshold_defined = true;
                    }
                }
                RulePayload::ProductionPattern(pattern) => match pattern.compile() {
                    Ok(matcher) => context
                        .production_patterns
                        .push(ProductionPattern { pattern, matcher }),
                    Err(error) => {
                        diagnostics.push(RuleDiagnostic::for_rule(rule, error.to_string()));
                    }
                },
                RulePayload::MasterDatabaseIps(payload) => {
                    for address in payload.single_ips {
                        context.master_database_ips.insert(address);
                    }
                    for expression in &payload.ip_ranges {
                        context.master_database_ips.insert_range(expression);
                    }
                }
            }
        }

        PolicyResolution {
            context,
            diagnostics,
        }
    }

    /// Returns whether the person is exempt from non-duplicate checks.
    #[must_use]
    pub fn is_operations_person(&self, person: &str) -> bool {
        self.operations_personnel.contains(person)
    }

    /// Returns the number of distinct operations personnel.
    #[must_use]
    pub fn operations_personnel_count(&self) -> usize {
        self.operations_personnel.len()
    }

    /// Returns the long-access threshold in days; zero disables the check.
    #[must_use]
    pub fn long_access_threshold_days(&self) -> u32 {
        self.long_access_threshold_days
    }

    /// Returns production patterns in discovery order.
    pub fn production_patterns(&self) -> impl Iterator<Item = &HostPattern> {
        self.production_patterns.iter().map(|entry| &entry.pattern)
    }

    /// Returns the first production pattern the host name satisfies.
    #[must_use]
    pub fn matching_production_pattern(&self, host_name: &str) -> Option<&HostPattern> {
        self.production_patterns
            .iter()
            .find(|entry| entry.matcher.matches(host_name))
            .map(|entry| &entry.pattern)
    }

    /// Returns whether the host name classifies the host as production.
    #[must_use]
    pub fn is_production_host(&self, host_name: &str) -> bool {
        self.matching_production_pattern(host_name).is_some()
    }

    /// Returns the protected master database addresses.
    #[must_use]
    pub fn master_database_ips(&self) -> &IpSet {
        &self.master_database_ips
    }
}

impl RuleDiagnostic {
    fn for_rule(rule: &PolicyRule, message: String) -> Self {
        Self {
            category: rule.category(),
            rule_key: rule.rule_key().as_str().to_owned(),
            description: rule.description().map(ToOwned::to_owned),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use bastion_audit_domain::{HostPatternKind, PolicyRule, RuleCategory};
    use serde_json::{Value, json};

    use super::PolicyContext;

    fn rule(category: RuleCategory, key: &str, payload: Value) -> PolicyRule {
        PolicyRule::new(category, key, payload, None).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn empty_rule_set_disables_policy_checks() {
        let resolution = PolicyContext::from_rules(&[]);

        assert!(resolution.diagnostics.is_empty());
        assert_eq!(resolution.context.long_access_threshold_days(), 0);
        assert_eq!(resolution.context.operations_personnel_count(), 0);
        assert!(resolution.context.master_database_ips().is_empty());
        assert!(!resolution.context.is_production_host("db-prd-01"));
    }

    #[test]
    fn personnel_rules_are_unioned() {
        let resolution = PolicyContext::from_rules(&[
            rule(
                RuleCategory::OperationsPersonnel,
                "dba",
                json!({ "personnel": ["alice", "bob"] }),
            ),
            rule(
                RuleCategory::OperationsPersonnel,
                "sre",
                json!({ "personnel": ["bob", "carol"] }),
            ),
        ]);

        let context = resolution.context;
        assert_eq!(context.operations_personnel_count(), 3);
        assert!(context.is_operations_person("carol"));
        assert!(!context.is_operations_person("dave"));
    }

    #[test]
    fn first_well_formed_threshold_wins() {
        let resolution = PolicyContext::from_rules(&[
            rule(RuleCategory::LongAccessThreshold, "broken", json!({ "days": "x" })),
            rule(RuleCategory::LongAccessThreshold, "default", json!({ "days": 30 })),
            rule(RuleCategory::LongAccessThreshold, "strict", json!({ "days": 7 })),
        ]);

        assert_eq!(resolution.context.long_access_threshold_days(), 30);
        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(resolution.diagnostics[0].rule_key, "broken");
        assert_eq!(resolution.diagnostics[0].description, None);
    }

    #[test]
    fn negative_first_threshold_disables_long_access() {
        let resolution = PolicyContext::from_rules(&[
            rule(RuleCategory::LongAccessThreshold, "legacy", json!({ "days": -1 })),
            rule(RuleCategory::LongAccessThreshold, "default", json!({ "days": 30 })),
        ]);

        assert!(resolution.diagnostics.is_empty());
        assert_eq!(resolution.context.long_access_threshold_days(), 0);
    }

    #[test]
    fn production_patterns_keep_discovery_order() {
        let resolution = PolicyContext::from_rules(&[
            rule(
                RuleCategory::ProductionPattern,
                "contains_prd",
                json!({ "type": "contains", "value": "prd" }),
            ),
            rule(
                RuleCategory::ProductionPattern,
                "prefix_db",
                json!({ "type": "starts_with", "value": "db-" }),
            ),
        ]);

        let context = resolution.context;
        let kinds: Vec<HostPatternKind> = context
            .production_patterns()
            .map(|pattern| pattern.kind())
            .collect();
        assert_eq!(kinds, vec![HostPatternKind::Contains, HostPatternKind::StartsWith]);

        let first = context.matching_production_pattern("db-prd-01");
        assert_eq!(first.map(|pattern| pattern.value()), Some("prd"));
    }

    #[test]
    fn uncompilable_regex_is_skipped_with_diagnostic() {
        let resolution = PolicyContext::from_rules(&[
            rule(
                RuleCategory::ProductionPattern,
                "bad_regex",
                json!({ "type": "regex", "value": "prd(" }),
            ),
            rule(
                RuleCategory::ProductionPattern,
                "contains_outpub",
                json!({ "type": "contains", "value": "outpub" }),
            ),
        ]);

        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(resolution.diagnostics[0].category, RuleCategory::ProductionPattern);
        assert_eq!(resolution.context.production_patterns().count(), 1);
        assert!(resolution.context.is_production_host("web-outpub-02"));
    }

    #[test]
    fn master_database_ips_union_literals_and_range_endpoints() {
        let resolution = PolicyContext::from_rules(&[
            rule(
                RuleCategory::MasterDatabaseIps,
                "primary",
                json!({ "single_ips": ["10.0.0.5"], "ip_ranges": ["10.0.0.1-10.0.0.50"] }),
            ),
            rule(
                RuleCategory::MasterDatabaseIps,
                "replica",
                json!({ "single_ips": ["10.0.0.5", "10.0.1.5"] }),
            ),
        ]);

        let addresses = resolution.context.master_database_ips();
        assert_eq!(addresses.len(), 4);
        assert!(addresses.contains("10.0.0.1"));
        assert!(addresses.contains("10.0.0.50"));
        assert!(!addresses.contains("10.0.0.25"));
    }

    #[test]
    fn diagnostics_carry_the_rule_description() {
        let described = PolicyRule::new(
            RuleCategory::ProductionPattern,
            "legacy_regex",
            json!({ "type": "regex", "value": "(?=prd)" }),
            Some("look-ahead imported from the old auditor".to_owned()),
        )
        .unwrap_or_else(|_| unreachable!());

        let resolution = PolicyContext::from_rules(&[described]);

        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(
            resolution.diagnostics[0].description.as_deref(),
            Some("look-ahead imported from the old auditor")
        );
    }

    #[test]
    fn malformed_rules_do_not_block_others() {
        let resolution = PolicyContext::from_rules(&[
            rule(RuleCategory::OperationsPersonnel, "broken", json!({ "personnel": "alice" })),
            rule(RuleCategory::MasterDatabaseIps, "broken", json!({ "ip_ranges": 5 })),
            rule(RuleCategory::OperationsPersonnel, "default", json!({ "personnel": ["bob"] })),
        ]);

        assert_eq!(resolution.diagnostics.len(), 2);
        assert!(resolution.context.is_operations_person("bob"));
        assert!(!resolution.context.is_operations_person("alice"));
    }
}

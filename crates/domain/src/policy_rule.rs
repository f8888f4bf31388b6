use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bastion_audit_core::{AppError, AppResult, NonEmptyString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HostPattern;

/// Policy rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Identities exempt from non-duplicate checks.
    OperationsPersonnel,
    /// Age in days after which a grant counts as long-standing.
    LongAccessThreshold,
    /// Host naming rule that classifies a host as production.
    ProductionPattern,
    /// Protected master database addresses.
    MasterDatabaseIps,
}

impl RuleCategory {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperationsPersonnel => "operations_personnel",
            Self::LongAccessThreshold => "long_access_threshold",
            Self::ProductionPattern => "production_pattern",
            Self::MasterDatabaseIps => "master_database_ips",
        }
    }

    /// Returns all known categories.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[RuleCategory] = &[
            RuleCategory::OperationsPersonnel,
            RuleCategory::LongAccessThreshold,
            RuleCategory::ProductionPattern,
            RuleCategory::MasterDatabaseIps,
        ];

        ALL
    }
}

impl Display for RuleCategory {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for RuleCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "operations_personnel" | "ops_personnel" => Ok(Self::OperationsPersonnel),
            "long_access_threshold" | "long_time_setting" => Ok(Self::LongAccessThreshold),
            "production_pattern" | "prod_env_pattern" => Ok(Self::ProductionPattern),
            "master_database_ips" | "master_db_ips" => Ok(Self::MasterDatabaseIps),
            _ => Err(AppError::Validation(format!(
                "unknown rule category '{value}'"
            ))),
        }
    }
}

/// Payload of an operations-personnel rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsPersonnelPayload {
    /// Exempt identities.
    pub personnel: Vec<String>,
}

/// Payload of a long-access-threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongAccessThresholdPayload {
    /// Threshold in days; zero or a negative value disables the check.
    pub days: i64,
}

/// Payload of a master-database-ips rule. Both lists are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterDatabaseIpsPayload {
    /// Literal addresses.
    #[serde(default)]
    pub single_ips: Vec<String>,
    /// Range expressions in `start-end` form.
    #[serde(default)]
    pub ip_ranges: Vec<String>,
}

/// Typed rule payload, one variant per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePayload {
    /// Operations personnel list.
    OperationsPersonnel(OperationsPersonnelPayload),
    /// Long access threshold.
    LongAccessThreshold(LongAccessThresholdPayload),
    /// Production host pattern.
    ProductionPattern(HostPattern),
    /// Master database addresses.
    MasterDatabaseIps(MasterDatabaseIpsPayload),
}

impl LongAccessThresholdPayload {
    /// Returns the effective threshold, with non-positive values mapped to zero.
    #[must_use]
    pub fn effective_days(&self) -> u32 {
        u32::try_from(self.days.max(0)).unwrap_or(u32::MAX)
    }
}

impl RulePayload {
    /// Decodes a raw payload against the schema of its category.
    pub fn decode(category: RuleCategory, payload: &Value) -> AppResult<Self> {
        Ok(match category {
            RuleCategory::OperationsPersonnel => Self::OperationsPersonnel(decode_as(payload)?),
            RuleCategory::LongAccessThreshold => Self::LongAccessThreshold(decode_as(payload)?),
            RuleCategory::ProductionPattern => Self::ProductionPattern(decode_as(payload)?),
            RuleCategory::MasterDatabaseIps => Self::MasterDatabaseIps(decode_as(payload)?),
        })
    }
}

fn decode_as<T: DeserializeOwned>(payload: &Value) -> AppResult<T> {
    T::deserialize(payload).map_err(|error| AppError::Validation(error.to_string()))
}

/// One stored policy rule with its raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    category: RuleCategory,
    rule_key: NonEmptyString,
    payload: Value,
    description: Option<String>,
}

impl PolicyRule {
    /// Creates a policy rule. The payload is validated later, per rule.
    pub fn new(
        category: RuleCategory,
        rule_key: impl Into<String>,
        payload: Value,
        description: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            category,
            rule_key: NonEmptyString::new(rule_key)?,
            payload,
            description,
        })
    }

    /// Returns rule category.
    #[must_use]
    pub fn category(&self) -> RuleCategory {
        self.category
    }

    /// Returns rule key.
    #[must_use]
    pub fn rule_key(&self) -> &NonEmptyString {
        &self.rule_key
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the human description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Decodes the payload according to the rule category.
    pub fn typed_payload(&self) -> AppResult<RulePayload> {
        RulePayload::decode(self.category, &self.payload).map_err(|error| {
            AppError::Validation(format!(
                "malformed {} rule '{}': {error}",
                self.category,
                self.rule_key.as_str()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use crate::HostPatternKind;

    use super::{PolicyRule, RuleCategory, RulePayload};

    fn rule(category: RuleCategory, payload: serde_json::Value) -> PolicyRule {
        PolicyRule::new(category, "default", payload, None).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn category_roundtrip_storage_value() {
        for category in RuleCategory::all() {
            let restored = RuleCategory::from_str(category.as_str());
            assert!(restored.is_ok());
            assert_eq!(
                restored.unwrap_or(RuleCategory::OperationsPersonnel),
                *category
            );
        }
    }

    #[test]
    fn legacy_category_names_are_accepted() {
        assert!(matches!(
            RuleCategory::from_str("master_db_ips"),
            Ok(RuleCategory::MasterDatabaseIps)
        ));
        assert!(RuleCategory::from_str("firewall").is_err());
    }

    #[test]
    fn blank_rule_key_is_rejected() {
        let result = PolicyRule::new(RuleCategory::ProductionPattern, " ", json!({}), None);
        assert!(result.is_err());
    }

    #[test]
    fn decodes_each_category() {
        let personnel = rule(
            RuleCategory::OperationsPersonnel,
            json!({ "personnel": ["alice"] }),
        );
        assert!(matches!(
            personnel.typed_payload(),
            Ok(RulePayload::OperationsPersonnel(payload)) if payload.personnel == vec!["alice".to_owned()]
        ));

        let threshold = rule(RuleCategory::LongAccessThreshold, json!({ "days": 30 }));
        assert!(matches!(
            threshold.typed_payload(),
            Ok(RulePayload::LongAccessThreshold(payload)) if payload.days == 30
        ));

        let pattern = rule(
            RuleCategory::ProductionPattern,
            json!({ "type": "ends_with", "value": "-prd" }),
        );
        assert!(matches!(
            pattern.typed_payload(),
            Ok(RulePayload::ProductionPattern(pattern)) if pattern.kind() == HostPatternKind::EndsWith
        ));
    }

    #[test]
    fn non_positive_threshold_decodes_as_disabled() {
        let negative = rule(RuleCategory::LongAccessThreshold, json!({ "days": -1 }));
        assert!(matches!(
            negative.typed_payload(),
            Ok(RulePayload::LongAccessThreshold(payload)) if payload.effective_days() == 0
        ));

        let huge = rule(
            RuleCategory::LongAccessThreshold,
            json!({ "days": 10_000_000_000_i64 }),
        );
        assert!(matches!(
            huge.typed_payload(),
            Ok(RulePayload::LongAccessThreshold(payload)) if payload.effective_days() == u32::MAX
        ));
    }

    #[test]
    fn master_database_lists_are_individually_optional() {
        let only_singles = rule(
            RuleCategory::MasterDatabaseIps,
            json!({ "single_ips": ["10.0.0.5"] }),
        );
        assert!(matches!(
            only_singles.typed_payload(),
            Ok(RulePayload::MasterDatabaseIps(payload)) if payload.ip_ranges.is_empty()
        ));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let cases = [
            rule(RuleCategory::OperationsPersonnel, json!({ "people": [] })),
            rule(RuleCategory::OperationsPersonnel, json!(["alice"])),
            rule(RuleCategory::LongAccessThreshold, json!({ "days": 1.5 })),
            rule(RuleCategory::LongAccessThreshold, json!({ "days": "30" })),
            rule(RuleCategory::ProductionPattern, json!({ "type": "contains" })),
            rule(RuleCategory::MasterDatabaseIps, json!({ "single_ips": "10.0.0.5" })),
        ];

        for case in cases {
            let error = case.typed_payload();
            assert!(error.is_err(), "expected {:?} to be rejected", case.payload());
        }
    }
}

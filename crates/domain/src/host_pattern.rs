use bastion_audit_core::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Supported host naming pattern kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostPatternKind {
    /// Host name contains the value.
    Contains,
    /// Host name starts with the value.
    StartsWith,
    /// Host name ends with the value.
    EndsWith,
    /// Value is a regular expression searched anywhere in the host name.
    Regex,
    /// Kind not understood by this version; never matches.
    #[serde(other)]
    Unknown,
}

/// One host naming rule as authored in a production-pattern rule payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPattern {
    #[serde(rename = "type")]
    kind: HostPatternKind,
    value: String,
}

impl HostPattern {
    /// Creates a host pattern.
    #[must_use]
    pub fn new(kind: HostPatternKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Returns the pattern kind.
    #[must_use]
    pub fn kind(&self) -> HostPatternKind {
        self.kind
    }

    /// Returns the pattern value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    /// Prepares the pattern for repeated matching.
    ///
    /// Fails only for `regex` patterns that do not compile.
    pub fn compile(&self) -> AppResult<HostMatcher> {
        let value = self.value.clone();
        Ok(match self.kind {
            HostPatternKind::Contains => HostMatcher::Contains(value),
            HostPatternKind::StartsWith => HostMatcher::StartsWith(value),
            HostPatternKind::EndsWith => HostMatcher::EndsWith(value),
            HostPatternKind::Regex => {
                HostMatcher::Regex(Regex::new(value.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid host regex '{value}': {error}"))
                })?)
            }
            HostPatternKind::Unknown => HostMatcher::Never,
        })
    }
}

/// Compiled host pattern. Comparisons are case-sensitive.
#[derive(Debug, Clone)]
pub enum HostMatcher {
    /// Substring test.
    Contains(String),
    /// Prefix test.
    StartsWith(String),
    /// Suffix test.
    EndsWith(String),
    /// Unanchored regular expression search.
    Regex(Regex),
    /// Matches nothing.
    Never,
}

impl HostMatcher {
    /// Returns whether the host name satisfies this pattern.
    #[must_use]
    pub fn matches(&self, host_name: &str) -> bool {
        match self {
            Self::Contains(value) => host_name.contains(value.as_str()),
            Self::StartsWith(value) => host_name.starts_with(value.as_str()),
            Self::EndsWith(value) => host_name.ends_with(value.as_str()),
            Self::Regex(regex) => regex.is_match(host_name),
            Self::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{HostPattern, HostPatternKind};

    fn matches(kind: HostPatternKind, value: &str, host_name: &str) -> bool {
        HostPattern::new(kind, value)
            .compile()
            .map(|matcher| matcher.matches(host_name))
            .unwrap_or(false)
    }

    #[test]
    fn literal_kinds_match_by_position() {
        assert!(matches(HostPatternKind::Contains, "prd", "db-prd-01"));
        assert!(matches(HostPatternKind::StartsWith, "db-", "db-prd-01"));
        assert!(!matches(HostPatternKind::StartsWith, "prd", "db-prd-01"));
        assert!(matches(HostPatternKind::EndsWith, "-01", "db-prd-01"));
        assert!(!matches(HostPatternKind::EndsWith, "db", "db-prd-01"));
    }

    #[test]
    fn literal_kinds_are_case_sensitive() {
        assert!(!matches(HostPatternKind::Contains, "PRD", "db-prd-01"));
    }

    #[test]
    fn regex_searches_anywhere() {
        assert!(matches(HostPatternKind::Regex, r"prd-\d+", "east-db-prd-01"));
        assert!(!matches(HostPatternKind::Regex, r"^prd", "east-db-prd-01"));
    }

    #[test]
    fn invalid_regex_fails_to_compile() {
        let pattern = HostPattern::new(HostPatternKind::Regex, "prd(");
        assert!(pattern.compile().is_err());
    }

    #[test]
    fn unknown_kind_deserializes_and_never_matches() {
        let pattern: Result<HostPattern, _> =
            serde_json::from_value(json!({ "type": "glob", "value": "*" }));
        assert!(pattern.is_ok());

        let pattern = pattern.unwrap_or_else(|_| unreachable!());
        assert_eq!(pattern.kind(), HostPatternKind::Unknown);
        assert!(!matches(pattern.kind(), pattern.value(), "anything"));
    }
}

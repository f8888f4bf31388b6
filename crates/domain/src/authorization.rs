use std::fmt::{Display, Formatter};

use bastion_audit_core::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocols whose grants count as database access, in normalized form.
pub const DATABASE_PROTOCOLS: &[&str] = &["MYSQL", "MARIADB", "POSTGRESQL"];

/// Input payload for constructing one authorization record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRecordInput {
    /// Person holding the grant.
    pub person: String,
    /// Dotted-quad host IP.
    pub host_ip: String,
    /// Host name.
    pub host_name: String,
    /// Optional host network label.
    pub host_network: Option<String>,
    /// Optional host group label.
    pub host_group: Option<String>,
    /// Optional access protocol, compared case-insensitively.
    pub protocol: Option<String>,
    /// Optional account login name on the host.
    pub account_login_name: Option<String>,
    /// Grant or last check timestamp.
    pub checked_at: DateTime<Utc>,
}

/// One granted access entitlement on a bastion host.
///
/// Deletion is logical: a record carries a deletion reason exactly when it is
/// marked for deletion, and nothing here removes records physically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    id: RecordId,
    person: String,
    host_ip: String,
    host_name: String,
    host_network: Option<String>,
    host_group: Option<String>,
    protocol: Option<String>,
    account_login_name: Option<String>,
    checked_at: DateTime<Utc>,
    deletion_reason: Option<String>,
}

/// Identity of a grant for duplicate detection.
///
/// Missing protocol and account login compare equal to empty strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DuplicateKey<'a> {
    person: &'a str,
    host_ip: &'a str,
    host_name: &'a str,
    protocol: &'a str,
    account_login_name: &'a str,
}

impl AuthorizationRecord {
    /// Creates an unmarked record.
    #[must_use]
    pub fn new(id: RecordId, input: AuthorizationRecordInput) -> Self {
        Self::restore(id, input, None)
    }

    /// Rebuilds a record from storage, keeping any existing deletion mark.
    #[must_use]
    pub fn restore(
        id: RecordId,
        input: AuthorizationRecordInput,
        deletion_reason: Option<String>,
    ) -> Self {
        let AuthorizationRecordInput {
            person,
            host_ip,
            host_name,
            host_network,
            host_group,
            protocol,
            account_login_name,
            checked_at,
        } = input;

        Self {
            id,
            person,
            host_ip,
            host_name,
            host_network,
            host_group,
            protocol,
            account_login_name,
            checked_at,
            deletion_reason,
        }
    }

    /// Returns the record identifier.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the person holding the grant.
    #[must_use]
    pub fn person(&self) -> &str {
        self.person.as_str()
    }

    /// Returns the host IP.
    #[must_use]
    pub fn host_ip(&self) -> &str {
        self.host_ip.as_str()
    }

    /// Returns the host name.
    #[must_use]
    pub fn host_name(&self) -> &str {
        self.host_name.as_str()
    }

    /// Returns the host network label.
    #[must_use]
    pub fn host_network(&self) -> Option<&str> {
        self.host_network.as_deref()
    }

    /// Returns the host group label.
    #[must_use]
    pub fn host_group(&self) -> Option<&str> {
        self.host_group.as_deref()
    }

    /// Returns the protocol as stored.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Returns the account login name.
    #[must_use]
    pub fn account_login_name(&self) -> Option<&str> {
        self.account_login_name.as_deref()
    }

    /// Returns the grant or last check timestamp.
    #[must_use]
    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// Returns whether the record is marked for deletion.
    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.deletion_reason.is_some()
    }

    /// Returns the deletion reason when marked.
    #[must_use]
    pub fn deletion_reason(&self) -> Option<&str> {
        self.deletion_reason.as_deref()
    }

    /// Returns the duplicate-detection key.
    #[must_use]
    pub fn duplicate_key(&self) -> DuplicateKey<'_> {
        DuplicateKey {
            person: self.person.as_str(),
            host_ip: self.host_ip.as_str(),
            host_name: self.host_name.as_str(),
            protocol: self.protocol.as_deref().unwrap_or_default(),
            account_login_name: self.account_login_name.as_deref().unwrap_or_default(),
        }
    }

    /// Returns whether the grant uses one of [`DATABASE_PROTOCOLS`].
    #[must_use]
    pub fn uses_database_protocol(&self) -> bool {
        self.protocol
            .as_deref()
            .map(str::to_uppercase)
            .is_some_and(|protocol| DATABASE_PROTOCOLS.contains(&protocol.as_str()))
    }

    /// Marks the record for deletion.
    ///
    /// Returns `false` and leaves the existing reason untouched when the record
    /// is already marked.
    pub fn mark_for_deletion(&mut self, reason: impl Into<String>) -> bool {
        if self.deletion_reason.is_some() {
            return false;
        }

        self.deletion_reason = Some(reason.into());
        true
    }

    /// Clears the deletion mark and its reason.
    pub fn clear_deletion_mark(&mut self) {
        self.deletion_reason = None;
    }
}

/// Policy violation that marks a record for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    /// Another unmarked record with the same duplicate key came first.
    DuplicateAuthorization,
    /// Grant is older than the long-standing access threshold.
    LongStandingAccess {
        /// Threshold in days.
        threshold_days: u32,
    },
    /// Non-operations person holds access to a production host.
    ProductionEnvironmentAccess,
    /// Non-operations person holds database access to a master database host.
    MasterDatabaseAccess,
}

impl DeletionReason {
    /// Returns the reason text stored on the record.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::DuplicateAuthorization => "duplicate authorization".to_owned(),
            Self::LongStandingAccess { threshold_days } => {
                format!("exceeds {threshold_days}-day long-standing access")
            }
            Self::ProductionEnvironmentAccess => {
                "non-operations person holds production-environment access".to_owned()
            }
            Self::MasterDatabaseAccess => {
                "non-operations person holds master-database access".to_owned()
            }
        }
    }
}

impl Display for DeletionReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.message().as_str())
    }
}

#[cfg(test)]
mod tests {
    use bastion_audit_core::RecordId;
    use chrono::{TimeZone, Utc};

    use super::{AuthorizationRecord, AuthorizationRecordInput, DeletionReason};

    fn input(protocol: Option<&str>, account: Option<&str>) -> AuthorizationRecordInput {
        AuthorizationRecordInput {
            person: "alice".to_owned(),
            host_ip: "10.0.0.5".to_owned(),
            host_name: "db-prd-01".to_owned(),
            host_network: None,
            host_group: None,
            protocol: protocol.map(str::to_owned),
            account_login_name: account.map(str::to_owned),
            checked_at: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(|| unreachable!()),
        }
    }

    #[test]
    fn missing_optional_fields_key_like_empty_strings() {
        let absent = AuthorizationRecord::new(RecordId::new(1), input(None, None));
        let empty = AuthorizationRecord::new(RecordId::new(2), input(Some(""), Some("")));

        assert_eq!(absent.duplicate_key(), empty.duplicate_key());
    }

    #[test]
    fn first_mark_wins() {
        let mut record = AuthorizationRecord::new(RecordId::new(1), input(None, None));

        assert!(record.mark_for_deletion(DeletionReason::DuplicateAuthorization.message()));
        assert!(!record.mark_for_deletion(DeletionReason::MasterDatabaseAccess.message()));
        assert_eq!(record.deletion_reason(), Some("duplicate authorization"));
    }

    #[test]
    fn clearing_mark_removes_reason() {
        let mut record = AuthorizationRecord::restore(
            RecordId::new(1),
            input(None, None),
            Some("manual".to_owned()),
        );
        assert!(record.is_marked_for_deletion());

        record.clear_deletion_mark();

        assert!(!record.is_marked_for_deletion());
        assert_eq!(record.deletion_reason(), None);
    }

    #[test]
    fn database_protocol_check_ignores_case() {
        let mysql = AuthorizationRecord::new(RecordId::new(1), input(Some("mySQL"), None));
        let ssh = AuthorizationRecord::new(RecordId::new(2), input(Some("ssh"), None));
        let none = AuthorizationRecord::new(RecordId::new(3), input(None, None));

        assert!(mysql.uses_database_protocol());
        assert!(!ssh.uses_database_protocol());
        assert!(!none.uses_database_protocol());
    }

    #[test]
    fn long_access_reason_mentions_threshold() {
        let reason = DeletionReason::LongStandingAccess { threshold_days: 30 };
        assert!(reason.message().contains("30"));
    }
}

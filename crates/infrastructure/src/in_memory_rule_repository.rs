use async_trait::async_trait;
use bastion_audit_application::RuleRepository;
use bastion_audit_core::AppResult;
use bastion_audit_domain::PolicyRule;
use tokio::sync::RwLock;

/// In-memory policy rule repository.
#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<Vec<PolicyRule>>,
}

impl InMemoryRuleRepository {
    /// Creates a repository holding the given rules in definition order.
    #[must_use]
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Appends one rule after the existing ones.
    pub async fn insert(&self, rule: PolicyRule) {
        self.rules.write().await.push(rule);
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn list_rules(&self) -> AppResult<Vec<PolicyRule>> {
        Ok(self.rules.read().await.clone())
    }
}

use async_trait::async_trait;

use crate::domain::rules::{ApprovalRule, ApprovalRuleInput};
use crate::error::Result;

#[async_trait]
pub trait ApprovalRulesRepository: Send + Sync {
    async fn create_rule(&self, input: ApprovalRuleInput) -> Result<ApprovalRule>;
    async fn update_rule(
        &self,
        id: i64,
        input: ApprovalRuleInput,
    ) -> Result<ApprovalRule>;
    async fn delete_rule(&self, id: i64) -> Result<bool>;
    async fn get_rule(&self, id: i64) -> Result<Option<ApprovalRule>>;
    /// Highest priority first.
    async fn list_rules(&self) -> Result<Vec<ApprovalRule>>;
    async fn list_enabled_rules(&self) -> Result<Vec<ApprovalRule>>;
}

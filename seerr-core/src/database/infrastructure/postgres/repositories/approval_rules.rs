use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgRow};

use super::column;
use crate::database::ports::approval_rules::ApprovalRulesRepository;
use crate::domain::rules::{ApprovalRule, ApprovalRuleInput};
use crate::error::{Result, SeerrError};

#[derive(Debug, Clone)]
pub struct PostgresApprovalRulesRepository {
    pool: PgPool,
}

impl PostgresApprovalRulesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<ApprovalRule> {
        Ok(ApprovalRule {
            id: column(row, "id")?,
            name: column(row, "name")?,
            description: column(row, "description")?,
            enabled: column(row, "enabled")?,
            priority: column(row, "priority")?,
            rule_type: column(row, "rule_type")?,
            conditions: column(row, "conditions")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }

    fn validate(input: &ApprovalRuleInput) -> Result<()> {
        if input.name.trim().is_empty() || input.rule_type.trim().is_empty() {
            return Err(SeerrError::InvalidInput(
                "approval rules need a name and a rule type".into(),
            ));
        }
        if !input.conditions.is_object() {
            return Err(SeerrError::InvalidInput(
                "approval rule conditions must be a JSON object".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalRulesRepository for PostgresApprovalRulesRepository {
    async fn create_rule(&self, input: ApprovalRuleInput) -> Result<ApprovalRule> {
        Self::validate(&input)?;

        let row = sqlx::query(
            r#"
            INSERT INTO approval_rule (name, description, enabled, priority, rule_type, conditions)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, enabled, priority, rule_type, conditions,
                      created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.description)
        .bind(input.enabled)
        .bind(input.priority)
        .bind(input.rule_type.trim())
        .bind(input.conditions)
        .fetch_one(self.pool())
        .await?;

        Self::map_row(&row)
    }

    async fn update_rule(
        &self,
        id: i64,
        input: ApprovalRuleInput,
    ) -> Result<ApprovalRule> {
        Self::validate(&input)?;

        let row = sqlx::query(
            r#"
            UPDATE approval_rule SET
                name = $2,
                description = $3,
                enabled = $4,
                priority = $5,
                rule_type = $6,
                conditions = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, enabled, priority, rule_type, conditions,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.description)
        .bind(input.enabled)
        .bind(input.priority)
        .bind(input.rule_type.trim())
        .bind(input.conditions)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| SeerrError::NotFound(format!("approval rule {id}")))?;

        Self::map_row(&row)
    }

    async fn delete_rule(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM approval_rule WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_rule(&self, id: i64) -> Result<Option<ApprovalRule>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, enabled, priority, rule_type, conditions,
                   created_at, updated_at
            FROM approval_rule
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn list_rules(&self) -> Result<Vec<ApprovalRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, enabled, priority, rule_type, conditions,
                   created_at, updated_at
            FROM approval_rule
            ORDER BY priority DESC, id
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list_enabled_rules(&self) -> Result<Vec<ApprovalRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, enabled, priority, rule_type, conditions,
                   created_at, updated_at
            FROM approval_rule
            WHERE enabled
            ORDER BY priority DESC, id
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}

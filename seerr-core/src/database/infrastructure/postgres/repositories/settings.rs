use async_trait::async_trait;
use sqlx::PgPool;

use super::column;
use crate::database::ports::settings::{SettingsRepository, StoredSetting};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PostgresSettingsRepository {
    pool: PgPool,
}

impl PostgresSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM app_setting WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool())
                .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_setting (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM app_setting WHERE key = $1")
            .bind(key)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_settings(&self) -> Result<Vec<StoredSetting>> {
        let rows = sqlx::query(
            "SELECT key, value, updated_at FROM app_setting ORDER BY key",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StoredSetting {
                    key: column(row, "key")?,
                    value: column(row, "value")?,
                    updated_at: column(row, "updated_at")?,
                })
            })
            .collect()
    }
}

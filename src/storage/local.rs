use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // Local Storage Operations
    // ========================================================================

    /// Get a single stored value by key.
    ///
    /// # Returns
    ///
    /// The value if the key exists, or `None` if not set.
    pub async fn get_entry(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM local_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a value (UPSERT).
    ///
    /// The whole value is replaced; concurrent writers to one key end up with
    /// whichever write landed last.
    pub async fn set_entry(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO local_storage (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a key. Returns whether a row was deleted; removing a missing key
    /// is not an error.
    pub async fn remove_entry(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM local_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

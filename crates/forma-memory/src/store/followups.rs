//! Manual follow-up records for failed external actions.

use super::Store;
use forma_core::error::FormaError;
use uuid::Uuid;

impl Store {
    /// File a follow-up item for an edit that needs a human.
    pub async fn record_followup(
        &self,
        identity_id: &str,
        description: &str,
    ) -> Result<String, FormaError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO followups (id, identity_id, description) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(identity_id)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| FormaError::Memory(format!("followup insert failed: {e}")))?;

        Ok(id)
    }

    /// All open follow-ups for an identity: (id, description).
    pub async fn open_followups(
        &self,
        identity_id: &str,
    ) -> Result<Vec<(String, String)>, FormaError> {
        sqlx::query_as(
            "SELECT id, description FROM followups \
             WHERE identity_id = ? AND status = 'open' ORDER BY created_at ASC",
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FormaError::Memory(format!("followup query failed: {e}")))
    }

    /// Mark a follow-up resolved. Returns `true` if a row was updated.
    pub async fn resolve_followup(&self, id: &str) -> Result<bool, FormaError> {
        let result =
            sqlx::query("UPDATE followups SET status = 'resolved' WHERE id = ? AND status = 'open'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| FormaError::Memory(format!("followup update failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

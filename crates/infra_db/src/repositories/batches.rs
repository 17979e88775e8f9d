//! Claim batch repository
//!
//! The batch aggregate (line items, outcome histories, status history) is
//! stored as one JSONB document; the caller-supplied batch identifier,
//! message identifier, and status are lifted into indexed columns.

use sqlx::PgPool;
use uuid::Uuid;

use domain_exchange::ClaimBatch;

use crate::error::{classify_sqlx_error, DatabaseError};

/// Row shape for the `claim_batches` table
#[derive(Debug, sqlx::FromRow)]
pub struct BatchRow {
    pub id: Uuid,
    pub batch_id: String,
    pub message_identifier: Option<String>,
    pub status: String,
    pub body: serde_json::Value,
}

impl BatchRow {
    pub fn into_domain(self) -> Result<ClaimBatch, DatabaseError> {
        serde_json::from_value(self.body)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))
    }
}

/// Repository for claim batches
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: PgPool,
}

impl BatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_batch_id(
        &self,
        batch_id: &str,
    ) -> Result<Option<ClaimBatch>, DatabaseError> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_id, message_identifier, status, body
            FROM claim_batches
            WHERE batch_id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(BatchRow::into_domain).transpose()
    }

    pub async fn find_by_message_identifier(
        &self,
        message_identifier: &str,
    ) -> Result<Option<ClaimBatch>, DatabaseError> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_id, message_identifier, status, body
            FROM claim_batches
            WHERE message_identifier = $1
            "#,
        )
        .bind(message_identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(BatchRow::into_domain).transpose()
    }

    /// Inserts or replaces the batch document
    ///
    /// Reconciliation rewrites the whole aggregate; the row-level lock taken
    /// by the update keeps concurrent writers serialized on the same batch.
    pub async fn upsert(&self, batch: &ClaimBatch) -> Result<(), DatabaseError> {
        let body = serde_json::to_value(batch)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO claim_batches (id, batch_id, message_identifier, status, body)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (batch_id) DO UPDATE SET
                message_identifier = EXCLUDED.message_identifier,
                status = EXCLUDED.status,
                body = EXCLUDED.body
            "#,
        )
        .bind(batch.id.as_uuid())
        .bind(&batch.batch_id)
        .bind(batch.message_identifier.as_deref())
        .bind(batch.status.as_str())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        Ok(())
    }
}

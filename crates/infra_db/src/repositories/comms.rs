//! Communication record repository

use sqlx::PgPool;
use uuid::Uuid;

use domain_exchange::CommunicationRecord;

use crate::error::{classify_sqlx_error, DatabaseError};

/// Row shape for the `communication_records` table
#[derive(Debug, sqlx::FromRow)]
pub struct CommRecordRow {
    pub id: Uuid,
    pub exchange_identifier: Option<String>,
    pub body: serde_json::Value,
}

impl CommRecordRow {
    pub fn into_domain(self) -> Result<CommunicationRecord, DatabaseError> {
        serde_json::from_value(self.body)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))
    }
}

/// Repository for stored communication-requests
#[derive(Debug, Clone)]
pub struct CommRepository {
    pool: PgPool,
}

impl CommRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Matches the wire identifier of the communication-request
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CommunicationRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, CommRecordRow>(
            r#"
            SELECT id, exchange_identifier, body
            FROM communication_records
            WHERE exchange_identifier = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(CommRecordRow::into_domain).transpose()
    }

    pub async fn insert(&self, record: &CommunicationRecord) -> Result<(), DatabaseError> {
        let body = serde_json::to_value(record)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO communication_records (id, exchange_identifier, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.exchange_identifier.as_deref())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        Ok(())
    }
}

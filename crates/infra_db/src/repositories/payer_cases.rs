//! Payer-initiated case repository

use sqlx::PgPool;
use uuid::Uuid;

use domain_exchange::PayerCaseRecord;

use crate::error::{classify_sqlx_error, DatabaseError};

/// Row shape for the `payer_cases` table
#[derive(Debug, sqlx::FromRow)]
pub struct PayerCaseRow {
    pub id: Uuid,
    pub case_number: String,
    pub source_identifier: Option<String>,
    pub body: serde_json::Value,
}

impl PayerCaseRow {
    pub fn into_domain(self) -> Result<PayerCaseRecord, DatabaseError> {
        serde_json::from_value(self.body)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))
    }
}

/// Repository for records the payer opened unilaterally
#[derive(Debug, Clone)]
pub struct PayerCaseRepository {
    pool: PgPool,
}

impl PayerCaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<PayerCaseRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, PayerCaseRow>(
            r#"
            SELECT id, case_number, source_identifier, body
            FROM payer_cases
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(PayerCaseRow::into_domain).transpose()
    }

    /// Matches the originating payload identifier or the case number
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PayerCaseRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, PayerCaseRow>(
            r#"
            SELECT id, case_number, source_identifier, body
            FROM payer_cases
            WHERE source_identifier = $1 OR case_number = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(PayerCaseRow::into_domain).transpose()
    }

    pub async fn insert(&self, case: &PayerCaseRecord) -> Result<(), DatabaseError> {
        let body = serde_json::to_value(case)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO payer_cases (id, case_number, source_identifier, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(case.id.as_uuid())
        .bind(&case.case_number)
        .bind(case.source_identifier.as_deref())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        Ok(())
    }
}

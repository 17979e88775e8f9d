//! Outbound request repository
//!
//! Correlation keys (message identifier, request number, exchange request
//! identifier) live in indexed columns; the full aggregate is stored as a
//! JSONB document. A partial unique index on `message_identifier` backs the
//! one-request-per-identifier rule.

use sqlx::PgPool;
use uuid::Uuid;

use domain_exchange::{OutboundRequest, RequestKind};

use crate::error::{classify_sqlx_error, DatabaseError};

/// Row shape for the `outbound_requests` table
#[derive(Debug, sqlx::FromRow)]
pub struct RequestRow {
    pub id: Uuid,
    pub kind: String,
    pub request_number: String,
    pub message_identifier: Option<String>,
    pub exchange_request_id: Option<String>,
    pub body: serde_json::Value,
}

impl RequestRow {
    pub fn into_domain(self) -> Result<OutboundRequest, DatabaseError> {
        serde_json::from_value(self.body)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))
    }
}

/// Repository for outbound requests (prior authorizations and claims)
#[derive(Debug, Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<OutboundRequest>, DatabaseError> {
        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, kind, request_number, message_identifier, exchange_request_id, body
            FROM outbound_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(RequestRow::into_domain).transpose()
    }

    /// Exact match on the stored outbound message identifier within a family
    pub async fn find_by_message_identifier(
        &self,
        kind: RequestKind,
        message_identifier: &str,
    ) -> Result<Option<OutboundRequest>, DatabaseError> {
        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, kind, request_number, message_identifier, exchange_request_id, body
            FROM outbound_requests
            WHERE kind = $1 AND message_identifier = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(message_identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(RequestRow::into_domain).transpose()
    }

    /// Matches a payload-carried reference against the request number or the
    /// exchange-assigned request identifier within a family
    pub async fn find_by_reference(
        &self,
        kind: RequestKind,
        reference: &str,
    ) -> Result<Option<OutboundRequest>, DatabaseError> {
        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, kind, request_number, message_identifier, exchange_request_id, body
            FROM outbound_requests
            WHERE kind = $1 AND (request_number = $2 OR exchange_request_id = $2)
            "#,
        )
        .bind(kind.as_str())
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        row.map(RequestRow::into_domain).transpose()
    }

    /// Inserts or updates a request
    ///
    /// The unique index on `message_identifier` surfaces a duplicate as
    /// `DatabaseError::DuplicateEntry`.
    pub async fn upsert(&self, request: &OutboundRequest) -> Result<(), DatabaseError> {
        let body = serde_json::to_value(request)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO outbound_requests
                (id, kind, request_number, message_identifier, exchange_request_id, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                message_identifier = EXCLUDED.message_identifier,
                exchange_request_id = EXCLUDED.exchange_request_id,
                body = EXCLUDED.body
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.kind.as_str())
        .bind(&request.request_number)
        .bind(request.message_identifier.as_deref())
        .bind(request.exchange_request_id.as_deref())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        Ok(())
    }
}

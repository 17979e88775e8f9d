//! Infrastructure Database Layer
//!
//! This crate provides the database infrastructure for the claims exchange,
//! implementing the domain's record-store port on PostgreSQL using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: one repository per record
//! family (requests, payer cases, communication records, batches), composed
//! by the `PostgresRecordStore` adapter that the domain layer consumes
//! through its `RecordStore` port.
//!
//! Correlation keys are lifted into indexed columns; the aggregates
//! themselves are stored as JSONB documents, so the schema does not chase
//! every domain field.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresRecordStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/claims_exchange")).await?;
//! let store = PostgresRecordStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresRecordStore;
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, DatabaseConfig, DatabasePool};

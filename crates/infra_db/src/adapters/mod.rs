//! Port adapters backed by PostgreSQL

pub mod record_store;

pub use record_store::PostgresRecordStore;

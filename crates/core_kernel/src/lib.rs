//! Core Kernel - Foundational types for the claims exchange engine
//!
//! This crate provides the fundamental building blocks used across the
//! correlation and reconciliation modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers for the exchange record families
//! - Common error types

pub mod money;
pub mod identifiers;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{
    RequestId, BatchId, LineItemId, PayerCaseId, CommRecordId, OutcomeRecordId,
};
pub use error::CoreError;

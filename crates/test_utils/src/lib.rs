//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! claims exchange test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for test data construction
//! - `memory`: In-memory record store and scripted exchange gateway
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod memory;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use memory::*;
pub use assertions::*;
pub use generators::*;

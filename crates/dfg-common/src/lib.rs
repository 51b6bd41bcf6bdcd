//! datafrog common types, IDs, and errors.
//!
//! This crate provides foundational types shared across dfg-core modules:
//! - Expectation identity and id generation
//! - Testcase schema versioning
//! - Common error types with stable codes
//! - Output format selection

pub mod error;
pub mod id;
pub mod output;
pub mod schema;

pub use error::{Error, Result};
pub use id::{ExpectationId, IdProvider, SequentialIdProvider, UuidProvider};
pub use output::OutputFormat;
pub use schema::{SchemaError, SCHEMA_VERSION};

//! Persisted data shapes produced by recording and consumed by verification.

pub mod expectation;
pub mod testcase;

pub use expectation::{summary, Expectation};
pub use testcase::Testcase;

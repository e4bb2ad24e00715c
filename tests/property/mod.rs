//! Property-based tests for the fortify policies.
//!
//! Run with: cargo test --test property_tests

pub mod backoff;
pub mod retry;

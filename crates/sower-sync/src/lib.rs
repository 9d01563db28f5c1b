//! Stub generation, provider-root reconciliation, and pack orchestration.
//!
//! The canonical skill tree is the single source of truth; every provider
//! root is a materialized view rebuilt by a pure diff-and-apply step against
//! what is actually on disk.

pub mod controller;
pub mod engine;
pub mod land;
pub mod manifest;
pub mod stub;

mod error;

pub use error::SyncError;

//! Pack definitions, persisted activation state, and selection resolution.

pub mod resolver;
pub mod state;
pub mod store;

mod error;

pub use error::PackError;

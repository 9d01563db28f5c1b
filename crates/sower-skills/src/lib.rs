//! SKILL.md loader, canonical-tree reader, and lint rules.

pub mod lint;
pub mod loader;
pub mod reader;

mod error;

pub use error::SkillError;

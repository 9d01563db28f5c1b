#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frontmatter in {path}: {reason}")]
    MalformedFrontmatter { path: String, reason: String },

    #[error("duplicate skill id '{id}': {first} and {second}")]
    DuplicateSkillId {
        id: String,
        first: String,
        second: String,
    },
}

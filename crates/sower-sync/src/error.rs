use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Skill(#[from] sower_skills::SkillError),

    #[error(transparent)]
    Pack(#[from] sower_packs::PackError),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("stub conflict at {path}: skills '{first}' and '{second}' render the same path")]
    StubConflict {
        path: String,
        first: String,
        second: String,
    },

    #[error("write failure during apply at {}: {source}", path.display())]
    ProviderWriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsafe pack disable would remove still-required stubs: {paths:?}")]
    UnsafePackDisable { paths: Vec<String> },
}

impl SyncError {
    /// True for I/O failures raised mid-apply, after writes may have started.
    /// These map to exit code 2; everything else is a validation/plan failure.
    #[must_use]
    pub fn is_apply_failure(&self) -> bool {
        matches!(self, Self::ProviderWriteFailure { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown pack: {0}")]
    UnknownPack(String),

    #[error("pack '{pack}' include rule '{rule}' matches no known skill")]
    InvalidPackReference { pack: String, rule: String },
}

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PackError;

/// The only mutable state the engine owns: which packs are enabled and when
/// the last successful apply happened.
///
/// Persisted last, only after a fully successful apply, so an interrupted run
/// never records an unconfirmed change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivationState {
    pub enabled_packs: BTreeSet<String>,
    pub last_sync: Option<String>,
}

impl ActivationState {
    /// Record the current instant as the last successful sync.
    pub fn touch(&mut self) {
        self.last_sync = Some(chrono::Utc::now().to_rfc3339());
    }
}

/// Load the activation state, defaulting to empty when the file is absent.
///
/// # Errors
///
/// Returns [`PackError::Json`] for a corrupt file and [`PackError::Io`] on
/// read failure.
pub fn load_state(path: &Path) -> Result<ActivationState, PackError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ActivationState::default()),
        Err(e) => Err(e.into()),
    }
}

/// Persist the activation state atomically (write-to-temp, then rename).
///
/// # Errors
///
/// Returns [`PackError::Io`] on write or rename failure.
pub fn save_state(path: &Path, state: &ActivationState) -> Result<(), PackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

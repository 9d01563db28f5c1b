use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Generated snapshot of the last applied selection. Never hand-edited; a
/// manifest that disagrees with recomputation is drift and is repaired by
/// regeneration on the next successful apply.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub scope: String,
    pub providers: Vec<String>,
    pub skills: Vec<String>,
    pub generated_at: String,
}

impl Manifest {
    #[must_use]
    pub fn new(scope: &str, providers: &[String], selection: &BTreeSet<String>) -> Self {
        Self {
            scope: scope.to_string(),
            providers: providers.to_vec(),
            skills: selection.iter().cloned().collect(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether this on-disk manifest disagrees with a fresh recomputation.
    /// `generated_at` is informational and never part of the comparison.
    #[must_use]
    pub fn drifted_from(&self, fresh: &Self) -> bool {
        self.scope != fresh.scope
            || self.providers != fresh.providers
            || self.skills != fresh.skills
    }
}

/// Load the manifest, returning `None` when no apply has happened yet.
///
/// # Errors
///
/// Returns [`SyncError::Json`] for a corrupt file and [`SyncError::Io`] on
/// read failure.
pub fn load_manifest(path: &Path) -> Result<Option<Manifest>, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write the manifest atomically (write-to-temp, then rename).
///
/// # Errors
///
/// Returns [`SyncError::Io`] on write or rename failure.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(manifest)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = Manifest::new("all", &["claude".into()], &selection(&["x", "y"]));

        write_manifest(&path, &manifest).unwrap();
        let loaded = load_manifest(&path).unwrap().unwrap();
        assert_eq!(loaded.skills, vec!["x", "y"]);
        assert!(!loaded.drifted_from(&manifest));
    }

    #[test]
    fn missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_manifest(&dir.path().join("manifest.json")).unwrap().is_none());
    }

    #[test]
    fn drift_ignores_timestamp() {
        let a = Manifest::new("all", &["claude".into()], &selection(&["x"]));
        let mut b = a.clone();
        b.generated_at = "2001-01-01T00:00:00Z".into();
        assert!(!a.drifted_from(&b));
    }

    #[test]
    fn drift_detects_selection_change() {
        let a = Manifest::new("all", &["claude".into()], &selection(&["x"]));
        let b = Manifest::new("all", &["claude".into()], &selection(&["x", "y"]));
        assert!(a.drifted_from(&b));
    }
}

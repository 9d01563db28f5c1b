use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::PackError;

/// A named, declarative bundle of inclusion rules over the canonical tree.
///
/// Packs are data, not code; they are authored once and stored independently
/// of activation state. One JSON file per pack:
/// `{"packId": "backend", "include": ["backend/", "release-checklist"]}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Pack {
    pub pack_id: String,
    pub include: Vec<String>,
}

/// Load every `*.json` pack definition under `dir`.
///
/// A missing directory is an empty store, not an error; packs may be authored
/// later than the engine is installed.
///
/// # Errors
///
/// Returns [`PackError::Json`] for an unparsable definition and
/// [`PackError::Io`] on read failure.
pub fn load_packs(dir: &Path) -> Result<BTreeMap<String, Pack>, PackError> {
    let mut packs = BTreeMap::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no pack directory at {}", dir.display());
            return Ok(packs);
        }
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let pack: Pack = serde_json::from_str(&content)?;
        if let Some(previous) = packs.insert(pack.pack_id.clone(), pack) {
            tracing::warn!(
                "pack '{}' defined more than once; keeping the last definition",
                previous.pack_id
            );
        }
    }

    Ok(packs)
}

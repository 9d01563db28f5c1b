use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::SkillError;
use crate::loader::{Frontmatter, load_doc};

/// Marker file that makes a directory a skill.
pub const SKILL_MARKER: &str = "SKILL.md";

/// Companion directories a skill may carry next to its marker file.
pub const ASSET_DIRS: [&str; 3] = ["examples", "templates", "scripts"];

/// Companion reference document a skill may carry next to its marker file.
pub const REFERENCE_FILE: &str = "reference.md";

/// A skill record read from the canonical tree.
#[derive(Clone, Debug)]
pub struct Skill {
    /// Final path segment under the canonical root; unique repo-wide.
    pub id: String,
    /// Root-relative directory of the marker file, forward-slash separated.
    pub source_path: String,
    /// Absolute path to the marker file.
    pub marker_path: PathBuf,
    pub frontmatter: Frontmatter,
    pub has_assets: bool,
}

/// Locate every `SKILL.md` under `root`, sorted by path.
///
/// Hidden directories (backups, VCS metadata) are skipped. Ignore files from
/// an enclosing repository have no say over the canonical tree.
#[must_use]
pub fn find_markers(root: &Path) -> Vec<PathBuf> {
    let mut markers = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build();
    for entry in walker.flatten() {
        let path = entry.path();
        if path.is_file() && path.file_name().is_some_and(|n| n == SKILL_MARKER) {
            markers.push(path.to_path_buf());
        }
    }
    markers.sort();
    markers
}

/// Read the canonical tree into an ordered list of skill records.
///
/// The output is sorted by id, independent of traversal order, so downstream
/// diffing is deterministic.
///
/// # Errors
///
/// Returns [`SkillError::MalformedFrontmatter`] for an unparsable marker,
/// [`SkillError::DuplicateSkillId`] when two directories resolve to the same
/// id, and [`SkillError::Io`] on read failure.
pub fn read_tree(root: &Path) -> Result<Vec<Skill>, SkillError> {
    let mut by_id: BTreeMap<String, Skill> = BTreeMap::new();

    for marker in find_markers(root) {
        let Some(skill) = read_marker(root, &marker)? else {
            continue;
        };
        if let Some(existing) = by_id.get(&skill.id) {
            return Err(SkillError::DuplicateSkillId {
                id: skill.id,
                first: existing.source_path.clone(),
                second: skill.source_path,
            });
        }
        by_id.insert(skill.id.clone(), skill);
    }

    Ok(by_id.into_values().collect())
}

fn read_marker(root: &Path, marker: &Path) -> Result<Option<Skill>, SkillError> {
    let Some(dir) = marker.parent() else {
        return Ok(None);
    };
    let Ok(rel) = dir.strip_prefix(root) else {
        return Ok(None);
    };
    let source_path = relative_to_string(rel);
    if source_path.is_empty() {
        tracing::warn!(
            "skipping {}: marker directly under the canonical root",
            marker.display()
        );
        return Ok(None);
    }

    let doc = load_doc(marker)?;
    let id = source_path
        .rsplit('/')
        .next()
        .unwrap_or(&source_path)
        .to_string();

    Ok(Some(Skill {
        id,
        source_path,
        marker_path: marker.to_path_buf(),
        frontmatter: doc.frontmatter,
        has_assets: has_companion_assets(dir),
    }))
}

fn relative_to_string(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_companion_assets(dir: &Path) -> bool {
    ASSET_DIRS.iter().any(|d| dir.join(d).is_dir()) || dir.join(REFERENCE_FILE).is_file()
}

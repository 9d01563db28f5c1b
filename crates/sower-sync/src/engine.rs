use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ignore::WalkBuilder;
use sower_skills::reader::Skill;

use crate::error::SyncError;
use crate::stub;

/// The rendered target for one provider root: relative stub path → content.
pub type TargetSet = BTreeMap<String, String>;

/// How an apply run is allowed to touch the filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    /// Report the diff, perform zero writes.
    DryRun,
    /// Make the provider root exactly equal to the target set.
    Reset,
}

/// A classified plan: what `apply` would create, rewrite, or remove.
#[derive(Clone, Debug, Default)]
pub struct Diff {
    pub create: BTreeMap<String, String>,
    pub update: BTreeMap<String, String>,
    pub delete: BTreeSet<String>,
}

impl Diff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// True if applying would rewrite or remove anything that already exists.
    #[must_use]
    pub fn touches_existing(&self) -> bool {
        !self.update.is_empty() || !self.delete.is_empty()
    }
}

/// Render the target stub set for a provider from the selected skills.
///
/// # Errors
///
/// Returns [`SyncError::StubConflict`] if two selected skills render to the
/// same stub path; one unambiguous source skill per path is an invariant.
pub fn build_target(
    skills: &[Skill],
    selection: &BTreeSet<String>,
    provider: &str,
) -> Result<TargetSet, SyncError> {
    let mut target = TargetSet::new();
    let mut owners: BTreeMap<String, String> = BTreeMap::new();

    for skill in skills.iter().filter(|s| selection.contains(&s.id)) {
        let path = stub::stub_path(skill);
        if let Some(first) = owners.get(&path) {
            return Err(SyncError::StubConflict {
                path,
                first: first.clone(),
                second: skill.id.clone(),
            });
        }
        owners.insert(path.clone(), skill.id.clone());
        target.insert(path, stub::render(skill, provider));
    }

    Ok(target)
}

/// Diff the target set against the provider root's actual contents.
///
/// Every file under the root participates: anything absent from the target is
/// a delete, so `Reset` leaves nothing the selection does not imply. The diff
/// is recomputed from disk on every call; nothing is remembered between runs.
///
/// # Errors
///
/// Returns [`SyncError::Io`] on a read failure while walking the root.
pub fn plan(target: &TargetSet, provider_root: &Path) -> Result<Diff, SyncError> {
    let mut diff = Diff::default();
    let mut on_disk = BTreeSet::new();

    if provider_root.is_dir() {
        for entry in WalkBuilder::new(provider_root)
            .standard_filters(false)
            .build()
        {
            let entry = entry.map_err(|e| SyncError::Io(std::io::Error::other(e)))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(provider_root) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match target.get(&rel) {
                Some(content) => {
                    let disk = std::fs::read(path)?;
                    if blake3::hash(&disk) != blake3::hash(content.as_bytes()) {
                        diff.update.insert(rel.clone(), content.clone());
                    }
                }
                None => {
                    diff.delete.insert(rel.clone());
                }
            }
            on_disk.insert(rel);
        }
    }

    for (rel, content) in target {
        if !on_disk.contains(rel) {
            diff.create.insert(rel.clone(), content.clone());
        }
    }

    Ok(diff)
}

/// Execute a diff against a provider root.
///
/// `DryRun` performs zero writes. `Reset` applies every operation; the first
/// failing write or delete aborts the remaining batch so a partial apply is
/// loud and re-runnable, never silently skipped.
///
/// # Errors
///
/// Returns [`SyncError::ProviderWriteFailure`] naming the offending path.
pub fn apply(diff: &Diff, provider_root: &Path, mode: ApplyMode) -> Result<(), SyncError> {
    if mode == ApplyMode::DryRun {
        tracing::info!(
            create = diff.create.len(),
            update = diff.update.len(),
            delete = diff.delete.len(),
            "dry-run, no writes performed"
        );
        return Ok(());
    }

    for (rel, content) in diff.create.iter().chain(&diff.update) {
        let path = provider_root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| {
                SyncError::ProviderWriteFailure {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }
        std::fs::write(&path, content)
            .map_err(|source| SyncError::ProviderWriteFailure { path, source })?;
        tracing::debug!("wrote {rel}");
    }

    for rel in &diff.delete {
        let path = provider_root.join(rel);
        std::fs::remove_file(&path)
            .map_err(|source| SyncError::ProviderWriteFailure { path: path.clone(), source })?;
        tracing::debug!("removed {rel}");
        prune_empty_dirs(path.parent(), provider_root);
    }

    Ok(())
}

/// Remove directories emptied by deletes, up to (not including) the root.
fn prune_empty_dirs(start: Option<&Path>, root: &Path) {
    let mut dir = start;
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use sower_skills::loader::Frontmatter;

    use super::*;

    fn skill(id: &str, source_path: &str) -> Skill {
        Skill {
            id: id.into(),
            source_path: source_path.into(),
            marker_path: PathBuf::from(source_path).join("SKILL.md"),
            frontmatter: Frontmatter {
                name: id.into(),
                description: format!("about {id}"),
                extra: BTreeMap::new(),
            },
            has_assets: false,
        }
    }

    fn selection(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn plan_on_empty_root_is_all_creates() {
        let dir = tempfile::tempdir().unwrap();
        let skills = vec![skill("x", "a/x"), skill("y", "b/y")];
        let target = build_target(&skills, &selection(&["x", "y"]), "claude").unwrap();

        let diff = plan(&target, dir.path()).unwrap();
        assert_eq!(diff.create.len(), 2);
        assert!(diff.update.is_empty());
        assert!(diff.delete.is_empty());
    }

    #[test]
    fn apply_then_replan_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let skills = vec![skill("x", "a/x")];
        let target = build_target(&skills, &selection(&["x"]), "claude").unwrap();

        let diff = plan(&target, dir.path()).unwrap();
        apply(&diff, dir.path(), ApplyMode::Reset).unwrap();

        let second = plan(&target, dir.path()).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn drifted_stub_classified_as_update() {
        let dir = tempfile::tempdir().unwrap();
        let skills = vec![skill("x", "a/x")];
        let target = build_target(&skills, &selection(&["x"]), "claude").unwrap();
        apply(&plan(&target, dir.path()).unwrap(), dir.path(), ApplyMode::Reset).unwrap();

        std::fs::write(dir.path().join("a/x/SKILL.md"), "hand edit").unwrap();

        let diff = plan(&target, dir.path()).unwrap();
        assert_eq!(diff.update.len(), 1);
        apply(&diff, dir.path(), ApplyMode::Reset).unwrap();
        let content = std::fs::read_to_string(dir.path().join("a/x/SKILL.md")).unwrap();
        assert!(content.contains("ssot_path: a/x/SKILL.md"));
    }

    #[test]
    fn foreign_file_deleted_on_reset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("stale/thing")).unwrap();
        std::fs::write(dir.path().join("stale/thing/SKILL.md"), "old stub").unwrap();

        let skills = vec![skill("x", "a/x")];
        let target = build_target(&skills, &selection(&["x"]), "claude").unwrap();
        let diff = plan(&target, dir.path()).unwrap();
        assert_eq!(diff.delete.len(), 1);

        apply(&diff, dir.path(), ApplyMode::Reset).unwrap();
        assert!(!dir.path().join("stale").exists());
        assert!(dir.path().join("a/x/SKILL.md").is_file());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("stale")).unwrap();
        std::fs::write(dir.path().join("stale/SKILL.md"), "old").unwrap();

        let skills = vec![skill("x", "a/x")];
        let target = build_target(&skills, &selection(&["x"]), "claude").unwrap();
        let diff = plan(&target, dir.path()).unwrap();
        assert!(!diff.is_empty());

        apply(&diff, dir.path(), ApplyMode::DryRun).unwrap();
        assert!(dir.path().join("stale/SKILL.md").is_file());
        assert!(!dir.path().join("a").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("stale/SKILL.md")).unwrap(),
            "old"
        );
    }

    #[test]
    fn empty_selection_empties_root() {
        let dir = tempfile::tempdir().unwrap();
        let skills = vec![skill("x", "a/x")];
        let target = build_target(&skills, &selection(&["x"]), "claude").unwrap();
        apply(&plan(&target, dir.path()).unwrap(), dir.path(), ApplyMode::Reset).unwrap();

        let empty = TargetSet::new();
        let diff = plan(&empty, dir.path()).unwrap();
        apply(&diff, dir.path(), ApplyMode::Reset).unwrap();
        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn conflicting_stub_paths_rejected() {
        let mut a = skill("x", "a/x");
        a.id = "x".into();
        let mut b = skill("x2", "a/x");
        b.id = "x2".into();
        let skills = vec![a, b];

        let err = build_target(&skills, &selection(&["x", "x2"]), "claude").unwrap_err();
        assert!(matches!(err, SyncError::StubConflict { .. }));
    }

    #[test]
    fn delete_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut diff = Diff::default();
        diff.delete.insert("missing/SKILL.md".into());

        let err = apply(&diff, dir.path(), ApplyMode::Reset).unwrap_err();
        assert!(err.is_apply_failure());
        assert!(err.to_string().contains("missing"));
    }
}

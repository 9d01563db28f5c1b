use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use sower_skills::lint::{Violation, lint};

use crate::error::SyncError;

/// How colliding paths are treated when landing a bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Never touch an existing path.
    None,
    /// Rewrite only files whose content differs byte-for-byte.
    Changed,
    /// Rewrite every colliding path unconditionally.
    All,
}

/// Classification of one bundle file against the canonical tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandAction {
    /// Not present in the canonical tree.
    Add,
    /// Present with different content.
    Overwrite,
    /// Present with identical content.
    Unchanged,
}

#[derive(Clone, Debug)]
pub struct LandEntry {
    pub relative: String,
    pub action: LandAction,
}

/// A computed import plan from a bundle into the canonical tree.
#[derive(Clone, Debug)]
pub struct LandPlan {
    pub bundle_root: PathBuf,
    pub canonical_root: PathBuf,
    pub entries: Vec<LandEntry>,
}

#[derive(Clone, Debug, Default)]
pub struct LandReport {
    pub written: usize,
    pub skipped: usize,
    pub backed_up: usize,
    pub backup_dir: Option<PathBuf>,
}

/// Diff a bundle directory against the canonical tree.
///
/// # Errors
///
/// Returns [`SyncError::Io`] on read failure while walking either tree.
pub fn plan_land(bundle_root: &Path, canonical_root: &Path) -> Result<LandPlan, SyncError> {
    let mut entries = Vec::new();

    for entry in WalkBuilder::new(bundle_root).build() {
        let entry = entry.map_err(|e| SyncError::Io(std::io::Error::other(e)))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Ok(rel) = path.strip_prefix(bundle_root) else {
            continue;
        };
        let relative = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let existing = canonical_root.join(rel);
        let action = if existing.is_file() {
            let theirs = std::fs::read(path)?;
            let ours = std::fs::read(&existing)?;
            if blake3::hash(&theirs) == blake3::hash(&ours) {
                LandAction::Unchanged
            } else {
                LandAction::Overwrite
            }
        } else {
            LandAction::Add
        };

        entries.push(LandEntry { relative, action });
    }

    entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(LandPlan {
        bundle_root: bundle_root.to_path_buf(),
        canonical_root: canonical_root.to_path_buf(),
        entries,
    })
}

/// Execute a land plan under the given overwrite policy.
///
/// With `backup`, every file about to be overwritten is first copied into a
/// timestamped directory under `.sower-backup/` in the canonical root,
/// mirroring the tree layout.
///
/// # Errors
///
/// Returns [`SyncError::ProviderWriteFailure`] on the first failing copy or
/// write; remaining entries are not attempted.
pub fn apply_land(
    plan: &LandPlan,
    policy: OverwritePolicy,
    backup: bool,
) -> Result<LandReport, SyncError> {
    let mut report = LandReport::default();
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

    for entry in &plan.entries {
        let write = match (entry.action, policy) {
            (LandAction::Add, _) => true,
            (LandAction::Overwrite, OverwritePolicy::Changed | OverwritePolicy::All) => true,
            (LandAction::Overwrite, OverwritePolicy::None) => false,
            (LandAction::Unchanged, OverwritePolicy::All) => true,
            (LandAction::Unchanged, _) => false,
        };
        if !write {
            report.skipped += 1;
            continue;
        }

        let source = plan.bundle_root.join(&entry.relative);
        let dest = plan.canonical_root.join(&entry.relative);

        if backup && entry.action != LandAction::Add {
            let backup_root = plan.canonical_root.join(".sower-backup").join(&stamp);
            let backup_path = backup_root.join(&entry.relative);
            copy_with_parents(&dest, &backup_path)?;
            report.backed_up += 1;
            report.backup_dir.get_or_insert(backup_root);
        }

        copy_with_parents(&source, &dest)?;
        tracing::debug!("landed {}", entry.relative);
        report.written += 1;
    }

    Ok(report)
}

/// Re-run lint over the canonical tree after an apply.
///
/// # Errors
///
/// Returns [`SyncError::Skill`] on read failure; rule breaches are returned
/// in the violation list.
pub fn verify(canonical_root: &Path) -> Result<Vec<Violation>, SyncError> {
    Ok(lint(canonical_root)?)
}

fn copy_with_parents(from: &Path, to: &Path) -> Result<(), SyncError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SyncError::ProviderWriteFailure {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::copy(from, to).map_err(|source| SyncError::ProviderWriteFailure {
        path: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

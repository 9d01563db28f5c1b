use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use sower_skills::reader::Skill;

use crate::error::PackError;
use crate::store::Pack;

/// Selection breadth for a sync invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Restrict to skills registered for the active project context.
    Current,
    /// No restriction.
    All,
}

/// External-collaborator contract: the set of skill ids and/or path prefixes
/// registered for the active project. Never written by the engine.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProjectRegistry {
    pub skills: Vec<String>,
}

/// Load the project registry, returning `None` when the file does not exist.
///
/// # Errors
///
/// Returns [`PackError::Json`] for a corrupt file and [`PackError::Io`] on
/// read failure.
pub fn load_registry(path: &Path) -> Result<Option<ProjectRegistry>, PackError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Compute the effective selection: the union of include-rule expansion over
/// every enabled pack, restricted by scope.
///
/// Deterministic for a fixed `(enabled, scope, skills)` input regardless of
/// call order; the result is a sorted set of skill ids.
///
/// # Errors
///
/// Returns [`PackError::UnknownPack`] if an enabled pack has no definition and
/// [`PackError::InvalidPackReference`] if an include rule matches nothing.
pub fn resolve(
    packs: &BTreeMap<String, Pack>,
    enabled: &BTreeSet<String>,
    skills: &[Skill],
    scope: Scope,
    registry: Option<&ProjectRegistry>,
) -> Result<BTreeSet<String>, PackError> {
    let mut selected = BTreeSet::new();

    for pack_id in enabled {
        let pack = packs
            .get(pack_id)
            .ok_or_else(|| PackError::UnknownPack(pack_id.clone()))?;

        for rule in &pack.include {
            let matched = expand_rule(rule, skills);
            if matched.is_empty() {
                return Err(PackError::InvalidPackReference {
                    pack: pack_id.clone(),
                    rule: rule.clone(),
                });
            }
            selected.extend(matched);
        }
    }

    if scope == Scope::Current {
        let Some(registry) = registry else {
            tracing::warn!("scope=current with no project registry; selecting nothing");
            return Ok(BTreeSet::new());
        };
        selected.retain(|id| {
            skills
                .iter()
                .find(|s| &s.id == id)
                .is_some_and(|s| registry.skills.iter().any(|e| entry_matches(e, s)))
        });
    }

    Ok(selected)
}

/// Expand one include rule. A trailing `/` forces prefix matching; otherwise
/// the rule is tried as an exact id first, then as a path prefix.
fn expand_rule(rule: &str, skills: &[Skill]) -> Vec<String> {
    if let Some(prefix) = rule.strip_suffix('/') {
        return skills
            .iter()
            .filter(|s| path_has_prefix(&s.source_path, prefix))
            .map(|s| s.id.clone())
            .collect();
    }

    if let Some(skill) = skills.iter().find(|s| s.id == rule) {
        return vec![skill.id.clone()];
    }

    skills
        .iter()
        .filter(|s| path_has_prefix(&s.source_path, rule))
        .map(|s| s.id.clone())
        .collect()
}

fn entry_matches(entry: &str, skill: &Skill) -> bool {
    let trimmed = entry.strip_suffix('/').unwrap_or(entry);
    skill.id == trimmed || path_has_prefix(&skill.source_path, trimmed)
}

/// Prefix matching on whole path segments: `backend` matches `backend/x` but
/// not `backend-extras/x`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

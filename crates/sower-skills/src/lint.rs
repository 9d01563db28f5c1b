use std::collections::BTreeMap;
use std::path::Path;

use crate::error::SkillError;
use crate::loader::load_doc;
use crate::reader::find_markers;

/// Lint rule identifiers, one per structural check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    Frontmatter,
    DuplicateId,
    Naming,
    CrossReference,
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Frontmatter => "frontmatter",
            Self::DuplicateId => "duplicate-id",
            Self::Naming => "naming",
            Self::CrossReference => "cross-reference",
        };
        f.write_str(s)
    }
}

/// A single rule violation attributed to a skill path.
#[derive(Clone, Debug)]
pub struct Violation {
    /// Root-relative skill path (or marker path when no skill resolved).
    pub skill: String,
    pub rule: Rule,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: [{}] {}", self.skill, self.rule, self.message)
    }
}

struct LintedDoc {
    id: String,
    source_path: String,
    body: String,
}

/// Check the canonical tree against all structural and content rules.
///
/// Unparsable markers become [`Rule::Frontmatter`] violations instead of
/// aborting, so one broken skill does not hide the rest of the report.
///
/// # Errors
///
/// Returns [`SkillError::Io`] only for filesystem failures; rule breaches are
/// reported in the returned list.
pub fn lint(root: &Path) -> Result<Vec<Violation>, SkillError> {
    let mut violations = Vec::new();
    let mut docs = Vec::new();
    let mut seen_ids: BTreeMap<String, String> = BTreeMap::new();

    for marker in find_markers(root) {
        let Some(dir) = marker.parent() else {
            continue;
        };
        let rel = dir
            .strip_prefix(root)
            .unwrap_or(dir)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        let source_path = rel.join("/");
        let id = rel.last().cloned().unwrap_or_default();

        if id.is_empty() {
            violations.push(Violation {
                skill: marker.display().to_string(),
                rule: Rule::Naming,
                message: "marker file directly under the canonical root".into(),
            });
            continue;
        }

        for segment in &rel {
            if !is_kebab_case(segment) {
                violations.push(Violation {
                    skill: source_path.clone(),
                    rule: Rule::Naming,
                    message: format!("path segment '{segment}' is not kebab-case"),
                });
            }
        }

        match load_doc(&marker) {
            Ok(doc) => {
                if let Some(first) = seen_ids.get(&id) {
                    violations.push(Violation {
                        skill: source_path.clone(),
                        rule: Rule::DuplicateId,
                        message: format!("id '{id}' already used by {first}"),
                    });
                } else {
                    seen_ids.insert(id.clone(), source_path.clone());
                }
                docs.push(LintedDoc {
                    id,
                    source_path,
                    body: doc.body,
                });
            }
            Err(SkillError::MalformedFrontmatter { reason, .. }) => {
                violations.push(Violation {
                    skill: source_path,
                    rule: Rule::Frontmatter,
                    message: reason,
                });
            }
            Err(e) => return Err(e),
        }
    }

    check_cross_references(&docs, &mut violations);
    Ok(violations)
}

/// Skills must be self-contained: a body referencing another skill's internal
/// path couples the two trees and breaks when packs select only one of them.
fn check_cross_references(docs: &[LintedDoc], violations: &mut Vec<Violation>) {
    for doc in docs {
        for other in docs {
            if path_has_prefix(&doc.source_path, &other.source_path) {
                continue;
            }
            if doc.body.contains(other.source_path.as_str()) {
                violations.push(Violation {
                    skill: doc.source_path.clone(),
                    rule: Rule::CrossReference,
                    message: format!(
                        "body references '{}' (skill '{}') directly",
                        other.source_path, other.id
                    ),
                });
            }
        }
    }
}

/// Prefix matching on whole path segments, so `a/self-contained-extra` is
/// not treated as nested under `a/self-contained`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_kebab_case(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('-')
        && !segment.ends_with('-')
        && !segment.contains("--")
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

use std::fmt::Write as _;

use sower_skills::reader::{SKILL_MARKER, Skill};

/// Category under which a provider groups a stub: the first segment of the
/// skill's canonical path.
#[must_use]
pub fn category(skill: &Skill) -> &str {
    skill
        .source_path
        .split_once('/')
        .map_or("general", |(first, _)| first)
}

/// Root-relative canonical location a stub points back at.
#[must_use]
pub fn ssot_path(skill: &Skill) -> String {
    format!("{}/{}", skill.source_path, SKILL_MARKER)
}

/// Provider-root-relative path of the stub for a skill. Mirrors the
/// canonical tree.
#[must_use]
pub fn stub_path(skill: &Skill) -> String {
    ssot_path(skill)
}

/// Frontmatter keys the generator owns; a source value under one of these
/// is dropped so the stub never carries the same key twice.
pub const RESERVED_KEYS: [&str; 2] = ["category", "ssot_path"];

/// Render the stub document for one skill and provider.
///
/// Pure: the same skill and provider always yield byte-identical output,
/// which is what makes diff-based apply possible. `name` and `description`
/// are carried over verbatim; only `category` and `ssot_path` are added,
/// and the body is a short navigation note instead of a copy of the skill.
#[must_use]
pub fn render(skill: &Skill, provider: &str) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    let _ = writeln!(out, "name: {}", skill.frontmatter.name);
    let _ = writeln!(out, "description: {}", skill.frontmatter.description);
    for (key, value) in &skill.frontmatter.extra {
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::warn!(
                "skill '{}' frontmatter key '{key}' is generator-owned; dropping it from the stub",
                skill.id
            );
            continue;
        }
        let _ = writeln!(out, "{key}: {value}");
    }
    let _ = writeln!(out, "category: {}", category(skill));
    let _ = writeln!(out, "ssot_path: {}", ssot_path(skill));
    out.push_str("---\n");
    let _ = writeln!(
        out,
        "> Generated stub for the {provider} agent. Do not edit; changes are overwritten on sync."
    );
    out.push_str(">\n");
    let _ = writeln!(
        out,
        "> The canonical instructions live at `{}` in the skill tree. Open that file; this wrapper carries no content of its own.",
        ssot_path(skill)
    );
    out
}

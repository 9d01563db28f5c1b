use std::collections::BTreeMap;
use std::path::Path;

use crate::error::SkillError;

/// Parsed frontmatter of a skill marker file.
///
/// `name` and `description` are required and non-empty; every other key is
/// preserved verbatim in `extra` so stub generation can carry it through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frontmatter {
    pub name: String,
    pub description: String,
    pub extra: BTreeMap<String, String>,
}

/// A fully loaded skill document: frontmatter plus free-form body.
#[derive(Clone, Debug)]
pub struct SkillDoc {
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Load a skill document from a `SKILL.md` file with a frontmatter block.
///
/// # Errors
///
/// Returns [`SkillError::MalformedFrontmatter`] if the delimiters are missing
/// or `name`/`description` are absent or empty, and [`SkillError::Io`] if the
/// file cannot be read.
pub fn load_doc(path: &Path) -> Result<SkillDoc, SkillError> {
    let content = std::fs::read_to_string(path)?;
    parse_doc(&content).map_err(|reason| SkillError::MalformedFrontmatter {
        path: path.display().to_string(),
        reason,
    })
}

fn parse_doc(content: &str) -> Result<SkillDoc, String> {
    let content = content.trim_start();
    let Some(after_open) = content.strip_prefix("---") else {
        return Err("missing frontmatter delimiter".into());
    };

    let Some(close) = after_open.find("\n---") else {
        return Err("unclosed frontmatter".into());
    };

    let block = &after_open[..close];
    let mut name = None;
    let mut description = None;
    let mut extra = BTreeMap::new();

    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(format!("expected 'key: value', got '{line}'"));
        };
        let key = key.trim();
        let value = value.trim().to_string();
        match key {
            "" => return Err("empty frontmatter key".into()),
            "name" => name = Some(value),
            "description" => description = Some(value),
            _ => {
                extra.insert(key.to_string(), value);
            }
        }
    }

    let name = name
        .filter(|s| !s.is_empty())
        .ok_or("missing 'name' in frontmatter")?;
    let description = description
        .filter(|s| !s.is_empty())
        .ok_or("missing 'description' in frontmatter")?;

    let body = after_open[close + 4..].trim().to_string();

    Ok(SkillDoc {
        frontmatter: Frontmatter {
            name,
            description,
            extra,
        },
        body,
    })
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sower_packs::resolver::Scope;
use sower_packs::state::load_state;
use sower_sync::controller::Controller;
use sower_sync::engine::ApplyMode;
use sower_sync::land::{self, OverwritePolicy};

fn add_skill(base: &Path, rel: &str, name: &str, description: &str) {
    let dir = base.join("skills").join(rel);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("SKILL.md"),
        format!("---\nname: {name}\ndescription: {description}\n---\n# {name}\n\nLong prose body.\n"),
    )
    .unwrap();
}

fn add_pack(base: &Path, id: &str, include: &[&str]) {
    let packs = base.join("packs");
    std::fs::create_dir_all(&packs).unwrap();
    let rules: Vec<String> = include.iter().map(|r| format!("\"{r}\"")).collect();
    std::fs::write(
        packs.join(format!("{id}.json")),
        format!(r#"{{"packId": "{id}", "include": [{}]}}"#, rules.join(", ")),
    )
    .unwrap();
}

fn controller(base: &Path, provider_names: &[&str]) -> Controller {
    let providers: BTreeMap<String, PathBuf> = provider_names
        .iter()
        .map(|n| ((*n).to_string(), base.join("out").join(n)))
        .collect();
    Controller {
        canonical_root: base.join("skills"),
        packs_dir: base.join("packs"),
        state_path: base.join(".sower/state.json"),
        manifest_path: base.join(".sower/manifest.json"),
        registry_path: base.join(".sower/project.json"),
        providers,
    }
}

fn all_files(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    if !root.exists() {
        return files;
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                files.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

// Two skills, two packs, two providers: the canonical end-to-end scenario.
#[test]
fn enable_then_disable_scenario() {
    let dir = tempfile::tempdir().unwrap();
    add_skill(dir.path(), "a/x", "x", "skill x");
    add_skill(dir.path(), "b/y", "y", "skill y");
    add_pack(dir.path(), "p1", &["a/"]);
    add_pack(dir.path(), "p2", &["b/"]);
    let c = controller(dir.path(), &["claude", "codex"]);
    let names: Vec<String> = c.providers.keys().cloned().collect();

    c.enable("p1", &names).unwrap();
    c.enable("p2", &names).unwrap();

    let stubs: usize = ["claude", "codex"]
        .iter()
        .map(|p| all_files(&dir.path().join("out").join(p)).len())
        .sum();
    assert_eq!(stubs, 4, "2 skills x 2 providers");

    c.disable("p1", &names).unwrap();
    for provider in ["claude", "codex"] {
        let root = dir.path().join("out").join(provider);
        assert!(!root.join("a").exists());
        assert!(root.join("b/y/SKILL.md").is_file());
    }

    let state = load_state(&c.state_path).unwrap();
    assert_eq!(
        state.enabled_packs.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["p2"]
    );
}

#[test]
fn pack_overlap_disable_keeps_shared_prefix() {
    let dir = tempfile::tempdir().unwrap();
    add_skill(dir.path(), "backend/common/retry", "retry", "d");
    add_skill(dir.path(), "backend/auth", "auth", "d");
    add_pack(dir.path(), "a", &["backend/"]);
    add_pack(dir.path(), "b", &["backend/common/"]);
    let c = controller(dir.path(), &["claude"]);
    let names: Vec<String> = c.providers.keys().cloned().collect();

    c.enable("a", &names).unwrap();
    c.enable("b", &names).unwrap();
    c.disable("a", &names).unwrap();

    let root = dir.path().join("out/claude");
    assert!(root.join("backend/common/retry/SKILL.md").is_file());
    assert!(!root.join("backend/auth").exists());
}

#[test]
fn second_apply_is_empty_diff() {
    let dir = tempfile::tempdir().unwrap();
    add_skill(dir.path(), "a/x", "x", "d");
    add_pack(dir.path(), "p", &["a/"]);
    let c = controller(dir.path(), &["claude"]);
    let names: Vec<String> = c.providers.keys().cloned().collect();

    c.enable("p", &names).unwrap();
    let plan = c.plan_sync(Scope::All, &names).unwrap();
    assert!(plan.is_empty());

    c.apply_plan(&plan, ApplyMode::Reset).unwrap();
    assert!(c.plan_sync(Scope::All, &names).unwrap().is_empty());
}

#[test]
fn dry_run_leaves_every_byte_untouched() {
    let dir = tempfile::tempdir().unwrap();
    add_skill(dir.path(), "a/x", "x", "d");
    add_skill(dir.path(), "b/y", "y", "d");
    add_pack(dir.path(), "p1", &["a/"]);
    add_pack(dir.path(), "p2", &["b/"]);
    let c = controller(dir.path(), &["claude"]);
    let names: Vec<String> = c.providers.keys().cloned().collect();

    c.enable("p1", &names).unwrap();
    let before = all_files(dir.path());

    // a large pending diff: p2 enabled in state but not yet applied
    let mut state = load_state(&c.state_path).unwrap();
    state.enabled_packs.insert("p2".into());
    sower_packs::state::save_state(&c.state_path, &state).unwrap();
    let snapshot = all_files(dir.path());

    let plan = c.plan_sync(Scope::All, &names).unwrap();
    assert!(!plan.is_empty());
    c.apply_plan(&plan, ApplyMode::DryRun).unwrap();

    assert_eq!(all_files(dir.path()), snapshot);
    assert_eq!(
        all_files(&dir.path().join("out")),
        before
            .iter()
            .filter_map(|(k, v)| k
                .strip_prefix("out/")
                .map(|rest| (rest.to_string(), v.clone())))
            .collect()
    );
}

#[test]
fn stub_frontmatter_is_byte_identical_to_source() {
    let dir = tempfile::tempdir().unwrap();
    add_skill(
        dir.path(),
        "backend/tricky",
        "Tricky: name, with punctuation",
        "Description with trailing detail -- exactly preserved.",
    );
    add_pack(dir.path(), "p", &["backend/"]);
    let c = controller(dir.path(), &["claude"]);
    let names: Vec<String> = c.providers.keys().cloned().collect();
    c.enable("p", &names).unwrap();

    let stub =
        std::fs::read_to_string(dir.path().join("out/claude/backend/tricky/SKILL.md")).unwrap();
    assert!(stub.contains("name: Tricky: name, with punctuation\n"));
    assert!(stub.contains("description: Description with trailing detail -- exactly preserved.\n"));
    assert!(stub.contains("ssot_path: backend/tricky/SKILL.md\n"));
    assert!(!stub.contains("Long prose body"));
}

#[test]
fn lint_reports_missing_description_by_skill() {
    let dir = tempfile::tempdir().unwrap();
    add_skill(dir.path(), "a/good", "good", "fine");
    let bad = dir.path().join("skills/a/bad");
    std::fs::create_dir_all(&bad).unwrap();
    std::fs::write(bad.join("SKILL.md"), "---\nname: bad\n---\nbody").unwrap();

    let violations = sower_skills::lint::lint(&dir.path().join("skills")).unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].skill, "a/bad");
    assert_eq!(violations[0].rule, sower_skills::lint::Rule::Frontmatter);
}

#[test]
fn land_then_enable_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    std::fs::create_dir_all(bundle.join("imported/tool")).unwrap();
    std::fs::write(
        bundle.join("imported/tool/SKILL.md"),
        "---\nname: tool\ndescription: imported\n---\nbody",
    )
    .unwrap();
    add_skill(dir.path(), "a/x", "x", "d");
    add_pack(dir.path(), "imported", &["imported/"]);
    let c = controller(dir.path(), &["claude"]);
    let names: Vec<String> = c.providers.keys().cloned().collect();

    let plan = land::plan_land(&bundle, &c.canonical_root).unwrap();
    land::apply_land(&plan, OverwritePolicy::None, false).unwrap();
    assert!(land::verify(&c.canonical_root).unwrap().is_empty());

    c.enable("imported", &names).unwrap();
    assert!(
        dir.path()
            .join("out/claude/imported/tool/SKILL.md")
            .is_file()
    );
}

#[test]
fn land_overwrite_none_preserves_colliding_path() {
    let dir = tempfile::tempdir().unwrap();
    add_skill(dir.path(), "a/x", "x", "original");
    let bundle = dir.path().join("bundle");
    std::fs::create_dir_all(bundle.join("a/x")).unwrap();
    std::fs::write(
        bundle.join("a/x/SKILL.md"),
        "---\nname: x\ndescription: replacement\n---\nbody",
    )
    .unwrap();
    let canonical = dir.path().join("skills");
    let original = std::fs::read(canonical.join("a/x/SKILL.md")).unwrap();

    let plan = land::plan_land(&bundle, &canonical).unwrap();
    land::apply_land(&plan, OverwritePolicy::None, false).unwrap();
    assert_eq!(std::fs::read(canonical.join("a/x/SKILL.md")).unwrap(), original);

    land::apply_land(&plan, OverwritePolicy::Changed, false).unwrap();
    assert_ne!(std::fs::read(canonical.join("a/x/SKILL.md")).unwrap(), original);
}

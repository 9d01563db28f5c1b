use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use sower_sync::controller::Controller;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub tree: TreeConfig,
    pub state: StateConfig,
    /// Provider name → output root directory.
    pub providers: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct TreeConfig {
    pub canonical_root: PathBuf,
    pub packs_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct StateConfig {
    pub activation_path: PathBuf,
    pub manifest_path: PathBuf,
    pub project_registry: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to a working default layout when the file does not exist,
    /// so a fresh checkout needs no setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SOWER_ROOT") {
            self.tree.canonical_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SOWER_STATE_PATH") {
            self.state.activation_path = PathBuf::from(v);
        }
    }

    fn default() -> Self {
        Self {
            tree: TreeConfig {
                canonical_root: "./skills".into(),
                packs_dir: "./packs".into(),
            },
            state: StateConfig {
                activation_path: "./.sower/state.json".into(),
                manifest_path: "./.sower/manifest.json".into(),
                project_registry: "./.sower/project.json".into(),
            },
            providers: BTreeMap::from([
                ("claude".to_string(), PathBuf::from("./providers/claude")),
                ("codex".to_string(), PathBuf::from("./providers/codex")),
            ]),
        }
    }

    /// Expand a `--providers` argument into configured provider names.
    ///
    /// `all` (and its two-provider alias `both`) selects every configured
    /// provider; otherwise the value is a comma-separated list of names.
    #[must_use]
    pub fn provider_names(&self, arg: &str) -> Vec<String> {
        if arg == "all" || arg == "both" {
            self.providers.keys().cloned().collect()
        } else {
            arg.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }
    }

    #[must_use]
    pub fn controller(&self) -> Controller {
        Controller {
            canonical_root: self.tree.canonical_root.clone(),
            packs_dir: self.tree.packs_dir.clone(),
            state_path: self.state.activation_path.clone(),
            manifest_path: self.state.manifest_path.clone(),
            registry_path: self.state.project_registry.clone(),
            providers: self.providers.clone(),
        }
    }
}

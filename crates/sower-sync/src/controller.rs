use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use sower_packs::resolver::{ProjectRegistry, Scope, load_registry, resolve};
use sower_packs::state::{ActivationState, load_state, save_state};
use sower_packs::store::{Pack, load_packs};
use sower_skills::reader::{Skill, read_tree};

use crate::engine::{ApplyMode, Diff, TargetSet, apply, build_target, plan};
use crate::error::SyncError;
use crate::manifest::{Manifest, load_manifest, write_manifest};
use crate::stub;

/// Orchestration layer over the engine: enable/disable/sync/status.
///
/// Every command follows the same read-compute-write-once lifecycle: load the
/// world, compute a plan from on-disk truth, apply it, and persist activation
/// state last, only after a fully successful apply.
#[derive(Clone, Debug)]
pub struct Controller {
    pub canonical_root: PathBuf,
    pub packs_dir: PathBuf,
    pub state_path: PathBuf,
    pub manifest_path: PathBuf,
    pub registry_path: PathBuf,
    /// Provider name → provider root directory.
    pub providers: BTreeMap<String, PathBuf>,
}

/// One provider's share of a computed plan.
#[derive(Clone, Debug)]
pub struct ProviderPlan {
    pub name: String,
    pub root: PathBuf,
    pub target: TargetSet,
    pub diff: Diff,
}

/// A fully computed plan: selection, per-provider diffs, and the activation
/// state to persist if the apply succeeds.
#[derive(Clone, Debug)]
pub struct SyncPlan {
    pub scope: Scope,
    pub selection: BTreeSet<String>,
    pub providers: Vec<ProviderPlan>,
    state: ActivationState,
}

impl SyncPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.iter().all(|p| p.diff.is_empty())
    }

    /// True if applying would rewrite or remove existing provider files.
    #[must_use]
    pub fn touches_existing(&self) -> bool {
        self.providers.iter().any(|p| p.diff.touches_existing())
    }
}

/// Per-provider apply counts for reporting.
#[derive(Clone, Debug)]
pub struct ProviderReport {
    pub name: String,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Outcome of a successful apply.
#[derive(Clone, Debug)]
pub struct SyncReport {
    pub mode: ApplyMode,
    pub selection_size: usize,
    pub providers: Vec<ProviderReport>,
}

/// Read-only status snapshot.
#[derive(Clone, Debug)]
pub struct StatusReport {
    pub enabled_packs: BTreeSet<String>,
    pub last_sync: Option<String>,
    pub selection: BTreeSet<String>,
    /// Provider name → (stubs currently materialized, stubs selected).
    pub providers: Vec<(String, usize, usize)>,
    pub manifest_drift: bool,
}

struct World {
    skills: Vec<Skill>,
    packs: BTreeMap<String, Pack>,
    state: ActivationState,
    registry: Option<ProjectRegistry>,
}

impl Controller {
    fn load_world(&self) -> Result<World, SyncError> {
        Ok(World {
            skills: read_tree(&self.canonical_root)?,
            packs: load_packs(&self.packs_dir)?,
            state: load_state(&self.state_path)?,
            registry: load_registry(&self.registry_path)?,
        })
    }

    fn provider_roots(&self, requested: &[String]) -> Result<Vec<(String, PathBuf)>, SyncError> {
        requested
            .iter()
            .map(|name| {
                self.providers
                    .get(name)
                    .map(|root| (name.clone(), root.clone()))
                    .ok_or_else(|| SyncError::UnknownProvider(name.clone()))
            })
            .collect()
    }

    fn plan_with_state(
        &self,
        world: &World,
        state: ActivationState,
        scope: Scope,
        providers: &[String],
    ) -> Result<SyncPlan, SyncError> {
        let selection = resolve(
            &world.packs,
            &state.enabled_packs,
            &world.skills,
            scope,
            world.registry.as_ref(),
        )?;

        let mut provider_plans = Vec::new();
        for (name, root) in self.provider_roots(providers)? {
            let target = build_target(&world.skills, &selection, &name)?;
            let diff = plan(&target, &root)?;
            provider_plans.push(ProviderPlan {
                name,
                root,
                target,
                diff,
            });
        }

        Ok(SyncPlan {
            scope,
            selection,
            providers: provider_plans,
            state,
        })
    }

    /// Compute a sync plan from the persisted activation state.
    ///
    /// # Errors
    ///
    /// Fails on read errors, unknown providers, invalid pack references, or
    /// stub conflicts; no writes are attempted.
    pub fn plan_sync(&self, scope: Scope, providers: &[String]) -> Result<SyncPlan, SyncError> {
        let world = self.load_world()?;
        let state = world.state.clone();
        self.plan_with_state(&world, state, scope, providers)
    }

    /// Apply a computed plan. Under `Reset`, the manifest is regenerated and
    /// the activation state persisted only after every provider succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ProviderWriteFailure`] on the first failing
    /// write; remaining operations for that provider are not attempted.
    pub fn apply_plan(&self, plan: &SyncPlan, mode: ApplyMode) -> Result<SyncReport, SyncError> {
        let mut reports = Vec::new();

        for provider in &plan.providers {
            apply(&provider.diff, &provider.root, mode)?;
            reports.push(ProviderReport {
                name: provider.name.clone(),
                created: provider.diff.create.len(),
                updated: provider.diff.update.len(),
                deleted: provider.diff.delete.len(),
            });
            tracing::info!(
                provider = %provider.name,
                created = provider.diff.create.len(),
                updated = provider.diff.update.len(),
                deleted = provider.diff.delete.len(),
                "provider reconciled"
            );
        }

        if mode == ApplyMode::Reset {
            let provider_names: Vec<String> =
                plan.providers.iter().map(|p| p.name.clone()).collect();
            let manifest = Manifest::new(scope_label(plan.scope), &provider_names, &plan.selection);
            write_manifest(&self.manifest_path, &manifest)?;

            let mut state = plan.state.clone();
            state.touch();
            save_state(&self.state_path, &state)?;
        }

        Ok(SyncReport {
            mode,
            selection_size: plan.selection.len(),
            providers: reports,
        })
    }

    /// Enable a pack and reconcile the requested providers.
    ///
    /// # Errors
    ///
    /// Fails before any write if the pack is unknown or its rules do not
    /// resolve; state is persisted only after a successful apply.
    pub fn enable(&self, pack_id: &str, providers: &[String]) -> Result<SyncReport, SyncError> {
        let world = self.load_world()?;
        if !world.packs.contains_key(pack_id) {
            return Err(sower_packs::PackError::UnknownPack(pack_id.to_string()).into());
        }

        let mut state = world.state.clone();
        state.enabled_packs.insert(pack_id.to_string());

        let plan = self.plan_with_state(&world, state, Scope::All, providers)?;
        self.apply_plan(&plan, ApplyMode::Reset)
    }

    /// Disable a pack and remove exactly the stubs no other enabled pack
    /// still requires (`before − after`).
    ///
    /// # Errors
    ///
    /// [`SyncError::UnsafePackDisable`] guards against a resolver bug that
    /// would remove a still-required skill; it should be unreachable.
    pub fn disable(&self, pack_id: &str, providers: &[String]) -> Result<SyncReport, SyncError> {
        let world = self.load_world()?;
        let mut state = world.state.clone();

        if !state.enabled_packs.remove(pack_id) {
            tracing::warn!("pack '{pack_id}' was not enabled; reconciling anyway");
        }

        let before = resolve(
            &world.packs,
            &world.state.enabled_packs,
            &world.skills,
            Scope::All,
            world.registry.as_ref(),
        )?;
        let after = resolve(
            &world.packs,
            &state.enabled_packs,
            &world.skills,
            Scope::All,
            world.registry.as_ref(),
        )?;

        let removed: BTreeSet<String> = before.difference(&after).cloned().collect();
        let removed_paths = Self::stub_paths(&world.skills, &removed);
        let kept_paths = Self::stub_paths(&world.skills, &after);
        let still_required: Vec<String> = removed_paths
            .intersection(&kept_paths)
            .cloned()
            .collect();
        if !still_required.is_empty() {
            return Err(SyncError::UnsafePackDisable {
                paths: still_required,
            });
        }
        tracing::info!(
            removed = removed.len(),
            kept = after.len(),
            "disabling pack '{pack_id}'"
        );

        let plan = self.plan_with_state(&world, state, Scope::All, providers)?;
        self.apply_plan(&plan, ApplyMode::Reset)
    }

    /// Read-only report: enabled packs, last sync, per-provider stub counts,
    /// and whether the manifest has drifted from recomputation.
    ///
    /// # Errors
    ///
    /// Fails on read errors or unresolvable pack references.
    pub fn status(&self) -> Result<StatusReport, SyncError> {
        let world = self.load_world()?;
        let selection = resolve(
            &world.packs,
            &world.state.enabled_packs,
            &world.skills,
            Scope::All,
            world.registry.as_ref(),
        )?;

        let mut providers = Vec::new();
        for (name, root) in &self.providers {
            let target = build_target(&world.skills, &selection, name)?;
            let diff = plan(&target, root)?;
            let present = target.len() - diff.create.len();
            providers.push((name.clone(), present, target.len()));
        }

        // Drift is judged against a recomputation under the manifest's own
        // recorded scope and providers, not the status invocation's.
        let manifest_drift = match load_manifest(&self.manifest_path)? {
            Some(on_disk) => {
                let recorded_scope = if on_disk.scope == "current" {
                    Scope::Current
                } else {
                    Scope::All
                };
                let expected = resolve(
                    &world.packs,
                    &world.state.enabled_packs,
                    &world.skills,
                    recorded_scope,
                    world.registry.as_ref(),
                )?;
                let fresh = Manifest::new(&on_disk.scope, &on_disk.providers, &expected);
                let drifted = on_disk.drifted_from(&fresh);
                if drifted {
                    tracing::warn!(
                        "manifest drift detected; it will be regenerated on the next apply"
                    );
                }
                drifted
            }
            None => false,
        };

        Ok(StatusReport {
            enabled_packs: world.state.enabled_packs,
            last_sync: world.state.last_sync,
            selection,
            providers,
            manifest_drift,
        })
    }

    /// Stub paths implied by a selection, for reporting.
    #[must_use]
    pub fn stub_paths(skills: &[Skill], selection: &BTreeSet<String>) -> BTreeSet<String> {
        skills
            .iter()
            .filter(|s| selection.contains(&s.id))
            .map(stub::stub_path)
            .collect()
    }
}

fn scope_label(scope: Scope) -> &'static str {
    match scope {
        Scope::Current => "current",
        Scope::All => "all",
    }
}

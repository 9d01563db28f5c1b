use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use sower_packs::resolver::Scope;
use sower_sync::SyncError;
use sower_sync::controller::{SyncPlan, SyncReport};
use sower_sync::engine::ApplyMode;
use sower_sync::land::{self, LandAction, OverwritePolicy};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "sower", version, about = "Sync a canonical skill tree into provider stub trees")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "sower.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the canonical tree against structural and content rules.
    Lint {
        /// Exit non-zero on any violation.
        #[arg(long)]
        strict: bool,
    },
    /// Reconcile provider roots with the current effective selection.
    Sync {
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
        /// Comma-separated provider names, or `all`.
        #[arg(long, default_value = "all")]
        providers: String,
        #[arg(long, value_enum, default_value_t = ModeArg::DryRun)]
        mode: ModeArg,
        /// Skip the confirmation prompt for destructive applies.
        #[arg(long)]
        yes: bool,
    },
    /// Enable a pack and sync the requested providers.
    EnablePack {
        id: String,
        #[arg(long, default_value = "all")]
        providers: String,
    },
    /// Disable a pack, removing only stubs no other enabled pack requires.
    DisablePack {
        id: String,
        #[arg(long, default_value = "all")]
        providers: String,
    },
    /// Report enabled packs, last sync, and per-provider stub counts.
    Status,
    /// Import an external skill bundle into the canonical tree.
    Land {
        /// Bundle directory to import.
        #[arg(long)]
        source: PathBuf,
        /// Execute the plan; without this flag only the plan is printed.
        #[arg(long)]
        apply: bool,
        #[arg(long, value_enum, default_value_t = OverwriteArg::None)]
        overwrite: OverwriteArg,
        /// Copy files about to be overwritten into a timestamped backup.
        #[arg(long)]
        backup: bool,
        /// Re-run lint over the canonical tree after applying.
        #[arg(long)]
        verify: bool,
        /// Skip the confirmation prompt for --overwrite all.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Current,
    All,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Current => Self::Current,
            ScopeArg::All => Self::All,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Reset,
    DryRun,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OverwriteArg {
    None,
    Changed,
    All,
}

impl From<OverwriteArg> for OverwritePolicy {
    fn from(arg: OverwriteArg) -> Self {
        match arg {
            OverwriteArg::None => Self::None,
            OverwriteArg::Changed => Self::Changed,
            OverwriteArg::All => Self::All,
        }
    }
}

fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sower: {e:#}");
            return ExitCode::from(1);
        }
    };

    match run(&cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("sower: {e}");
            if e.is_apply_failure() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn run(command: &Command, config: &Config) -> Result<ExitCode, SyncError> {
    match command {
        Command::Lint { strict } => run_lint(config, *strict),
        Command::Sync {
            scope,
            providers,
            mode,
            yes,
        } => run_sync(config, (*scope).into(), providers, *mode, *yes),
        Command::EnablePack { id, providers } => {
            let report = config
                .controller()
                .enable(id, &config.provider_names(providers))?;
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Command::DisablePack { id, providers } => {
            let report = config
                .controller()
                .disable(id, &config.provider_names(providers))?;
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => run_status(config),
        Command::Land {
            source,
            apply,
            overwrite,
            backup,
            verify,
            yes,
        } => run_land(config, source, *apply, (*overwrite).into(), *backup, *verify, *yes),
    }
}

fn run_lint(config: &Config, strict: bool) -> Result<ExitCode, SyncError> {
    let violations = sower_skills::lint::lint(&config.tree.canonical_root)?;
    if violations.is_empty() {
        println!("lint: clean");
        return Ok(ExitCode::SUCCESS);
    }

    for violation in &violations {
        if strict {
            println!("{violation}");
        } else {
            tracing::warn!("{violation}");
        }
    }
    println!("lint: {} violation(s)", violations.len());
    Ok(ExitCode::from(lint_exit_code(violations.len(), strict)))
}

/// Violations fail the run only under `--strict`; otherwise they are warnings
/// and the exit stays zero.
fn lint_exit_code(violations: usize, strict: bool) -> u8 {
    u8::from(strict && violations > 0)
}

fn run_sync(
    config: &Config,
    scope: Scope,
    providers: &str,
    mode: ModeArg,
    yes: bool,
) -> Result<ExitCode, SyncError> {
    let controller = config.controller();
    let names = config.provider_names(providers);
    let plan = controller.plan_sync(scope, &names)?;

    print_plan(&plan);

    if mode == ModeArg::DryRun {
        controller.apply_plan(&plan, ApplyMode::DryRun)?;
        return Ok(ExitCode::SUCCESS);
    }

    if plan.touches_existing()
        && !confirm("reset will rewrite or delete existing provider files; continue?", yes)
    {
        println!("aborted, no writes performed");
        return Ok(ExitCode::from(1));
    }

    let report = controller.apply_plan(&plan, ApplyMode::Reset)?;
    print_report(&report);
    Ok(ExitCode::SUCCESS)
}

fn run_status(config: &Config) -> Result<ExitCode, SyncError> {
    let status = config.controller().status()?;

    let packs: Vec<&str> = status.enabled_packs.iter().map(String::as_str).collect();
    println!("enabled packs: {}", if packs.is_empty() { "(none)".to_string() } else { packs.join(", ") });
    println!(
        "last sync: {}",
        status.last_sync.as_deref().unwrap_or("never")
    );
    println!("effective selection: {} skill(s)", status.selection.len());
    for (name, present, selected) in &status.providers {
        println!("  {name}: {present}/{selected} stub(s) materialized");
    }
    if status.manifest_drift {
        println!("manifest: drifted (regenerated on next apply)");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_land(
    config: &Config,
    source: &std::path::Path,
    apply: bool,
    policy: OverwritePolicy,
    backup: bool,
    verify: bool,
    yes: bool,
) -> Result<ExitCode, SyncError> {
    let plan = land::plan_land(source, &config.tree.canonical_root)?;

    for entry in &plan.entries {
        let marker = match entry.action {
            LandAction::Add => "+",
            LandAction::Overwrite => "~",
            LandAction::Unchanged => "=",
        };
        println!("{marker} {}", entry.relative);
    }
    println!("land plan: {} file(s)", plan.entries.len());

    if !apply {
        return Ok(ExitCode::SUCCESS);
    }

    if policy == OverwritePolicy::All
        && !confirm("overwrite=all rewrites every colliding path; continue?", yes)
    {
        println!("aborted, no writes performed");
        return Ok(ExitCode::from(1));
    }

    let report = land::apply_land(&plan, policy, backup)?;
    println!(
        "landed: {} written, {} skipped, {} backed up",
        report.written, report.skipped, report.backed_up
    );
    if let Some(dir) = &report.backup_dir {
        println!("backup: {}", dir.display());
    }

    if verify {
        let violations = land::verify(&config.tree.canonical_root)?;
        if !violations.is_empty() {
            for violation in &violations {
                println!("{violation}");
            }
            println!("verify: {} violation(s)", violations.len());
            return Ok(ExitCode::from(1));
        }
        println!("verify: clean");
    }

    Ok(ExitCode::SUCCESS)
}

fn print_plan(plan: &SyncPlan) {
    for provider in &plan.providers {
        println!(
            "{}: +{} ~{} -{}",
            provider.name,
            provider.diff.create.len(),
            provider.diff.update.len(),
            provider.diff.delete.len()
        );
        for path in provider.diff.create.keys() {
            println!("  + {path}");
        }
        for path in provider.diff.update.keys() {
            println!("  ~ {path}");
        }
        for path in &provider.diff.delete {
            println!("  - {path}");
        }
    }
    println!("selection: {} skill(s)", plan.selection.len());
}

fn print_report(report: &SyncReport) {
    for provider in &report.providers {
        println!(
            "{}: created {}, updated {}, deleted {}",
            provider.name, provider.created, provider.updated, provider.deleted
        );
    }
    println!("selection: {} skill(s)", report.selection_size);
}

/// Destructive operations need `--yes` or an interactive confirmation;
/// refusing (or a non-interactive stdin) aborts with no writes.
fn confirm(prompt: &str, yes: bool) -> bool {
    if yes {
        return true;
    }
    if !std::io::stdin().is_terminal() {
        eprintln!("sower: refusing destructive apply without --yes on a non-interactive stdin");
        return false;
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

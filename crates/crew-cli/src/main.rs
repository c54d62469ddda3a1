//! crew CLI - a roster of role agents developing a project
//!
//! Usage:
//!   crew init                      Write .crew/config.toml
//!   crew auto [--max N]            Iterate autonomously on the project
//!   crew run [--requirement TEXT]  One pass over a requirement
//!   crew check                     Report deployment readiness

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crew_agent::{
    AnthropicRuntime, ClaudeCliRuntime, ExecutionRuntime, Role, Roster, AUTH_ENV_VARS,
};
use crew_core::config::CREW_DIR;
use crew_core::{CrewConfig, IterationStatus, RunConfig, RunSettings, RuntimeKind};
use crew_orchestrator::{
    ActivityLogger, GitCommand, GitPersistence, IterationEngine, ProjectRun, RunController,
    StartOutcome, DEFAULT_REQUIREMENT,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "crew")]
#[command(author, version, about = "A roster of role agents that develops your project")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .crew/config.toml
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Iterate autonomously: analyse, design, implement, validate, commit
    Auto {
        /// Seconds between iterations
        #[arg(long, allow_negative_numbers = true)]
        interval: Option<i64>,

        /// Maximum iterations (0 = unlimited)
        #[arg(long)]
        max: Option<u64>,

        /// Do not push after committing
        #[arg(long)]
        no_push: bool,

        /// Do not commit (implies --no-push)
        #[arg(long)]
        no_commit: bool,

        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Write the iteration history as JSON when the run ends
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,
    },

    /// Run every stage once for a requirement
    Run {
        /// Requirement text
        #[arg(short, long, conflicts_with = "file")]
        requirement: Option<String>,

        /// Read the requirement from a file
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Write the report as JSON
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Check credentials, tools and configuration
    Check,
}

#[derive(clap::Args, Debug, Clone, Default)]
struct RuntimeArgs {
    /// Execution runtime (cli or api)
    #[arg(long)]
    runtime: Option<RuntimeKind>,

    /// Model override
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { force } => cmd_init(&cli.project, force).await,
        Commands::Auto {
            interval,
            max,
            no_push,
            no_commit,
            runtime,
            history,
        } => {
            cmd_auto(
                &cli.project,
                AutoArgs {
                    interval,
                    max,
                    no_push,
                    no_commit,
                },
                runtime,
                history,
            )
            .await
        }
        Commands::Run {
            requirement,
            file,
            runtime,
            output,
        } => cmd_run(&cli.project, requirement, file, runtime, output).await,
        Commands::Check => cmd_check(&cli.project).await,
    }
}

/// Command-line overrides for a continuous run
#[derive(Debug, Clone, Copy, Default)]
struct AutoArgs {
    interval: Option<i64>,
    max: Option<u64>,
    no_push: bool,
    no_commit: bool,
}

/// Merge flags over the repository configuration and validate
fn run_config(config: &CrewConfig, project: &Path, args: AutoArgs) -> Result<RunConfig> {
    let mut settings = RunSettings::from_config(config, project);
    if let Some(interval) = args.interval {
        settings.interval_secs = interval;
    }
    if let Some(max) = args.max {
        settings.max_iterations = max;
    }
    if args.no_push || args.no_commit {
        settings.auto_push = false;
    }
    if args.no_commit {
        settings.auto_commit = false;
    }
    Ok(settings.validate()?)
}

fn build_runtime(
    config: &CrewConfig,
    project: &Path,
    args: RuntimeArgs,
) -> Arc<dyn ExecutionRuntime> {
    let model = args.model.or_else(|| config.runtime.model.clone());
    match args.runtime.unwrap_or(config.runtime.kind) {
        RuntimeKind::Cli => Arc::new(
            ClaudeCliRuntime::new(project)
                .with_binary(config.runtime.claude_binary.clone())
                .with_model(model),
        ),
        RuntimeKind::Api => Arc::new(
            AnthropicRuntime::new()
                .with_model(model)
                .with_max_tokens(config.runtime.max_tokens),
        ),
    }
}

async fn cmd_init(project: &Path, force: bool) -> Result<()> {
    let path = CrewConfig::path(project);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let written = CrewConfig::write_default(project)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Initialized crew in {}", project.display());
    println!("Created:");
    println!("  {}", written.display());
    Ok(())
}

async fn cmd_auto(
    project: &Path,
    args: AutoArgs,
    runtime_args: RuntimeArgs,
    history_path: Option<PathBuf>,
) -> Result<()> {
    let config = CrewConfig::load_or_default(project)?;
    let run_config = run_config(&config, project, args)?;

    let runtime = build_runtime(&config, run_config.project_path(), runtime_args);
    info!("Using {} runtime", runtime.name());

    let roster = Roster::standard(
        runtime,
        run_config.permission_level(),
        run_config.reasoning(),
    );
    let mut engine = IterationEngine::new(roster, run_config.project_path());
    if run_config.auto_commit() {
        engine = engine.with_persistence(Arc::new(GitPersistence::new(
            GitCommand::new(run_config.project_path()),
            run_config.auto_push(),
        )));
    }

    let logger = ActivityLogger::for_project(run_config.project_path());
    let controller =
        Arc::new(RunController::new(run_config, engine).with_activity_logging(logger));

    let signal_controller = Arc::clone(&controller);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current iteration (Ctrl-C again to exit now)");
            signal_controller.stop();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        }
    });

    let outcome = controller.start().await;
    let history = controller.history();

    if let StartOutcome::Finished(reason) = outcome {
        let failed = history
            .iter()
            .filter(|r| r.status == IterationStatus::Failed)
            .count();
        println!(
            "Run {} stopped ({}): {} iterations, {} failed",
            controller.run_id(),
            reason,
            history.len(),
            failed
        );
    }

    if let Some(path) = history_path {
        let json = serde_json::to_string_pretty(&history)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write history to {}", path.display()))?;
        info!("History written to {}", path.display());
    }

    Ok(())
}

async fn read_requirement(
    requirement: Option<String>,
    file: Option<PathBuf>,
) -> Result<String> {
    if let Some(path) = file {
        return tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read requirement file {}", path.display()));
    }
    Ok(requirement.unwrap_or_else(|| DEFAULT_REQUIREMENT.to_string()))
}

async fn cmd_run(
    project: &Path,
    requirement: Option<String>,
    file: Option<PathBuf>,
    runtime_args: RuntimeArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    let requirement = read_requirement(requirement, file).await?;
    if requirement.trim().is_empty() {
        bail!("Requirement is empty");
    }

    let config = CrewConfig::load_or_default(project)?;
    let runtime = build_runtime(&config, project, runtime_args);
    let roster = Roster::standard(
        runtime,
        config.agents.permission_level,
        config.agents.reasoning,
    );

    info!(
        "Project run: {} chars of requirement",
        requirement.chars().count()
    );
    let report = ProjectRun::new(roster)
        .with_activity_logging(ActivityLogger::for_project(project))
        .run(&requirement)
        .await?;

    println!("Project run complete");
    for (section, text) in [
        ("product analysis", &report.product_analysis),
        ("architecture", &report.architecture),
        ("ui", &report.ui),
        ("backend", &report.backend),
        ("database", &report.database),
        ("frontend", &report.frontend),
        ("assets", &report.assets),
        ("testing", &report.testing),
        ("security", &report.security),
        ("documentation", &report.documentation),
    ] {
        println!("  {:<18} {} chars", section, text.chars().count());
    }

    if let Some(path) = output {
        tokio::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

/// Whether `binary` resolves to a file on PATH (or is a path itself)
fn on_path(binary: &str) -> bool {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}

async fn cmd_check(project: &Path) -> Result<()> {
    println!("crew deployment check");
    println!("=====================");

    println!("\nCredentials:");
    for var in AUTH_ENV_VARS {
        let set = std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false);
        println!("  {} {}", mark(set), var);
    }

    println!("\nProject:");
    println!("  {} {}", mark(project.is_dir()), project.display());
    println!("  {} git repository", mark(project.join(".git").exists()));
    let config_path = CrewConfig::path(project);
    println!(
        "  {} {}/config.toml",
        mark(config_path.is_file()),
        CREW_DIR
    );

    let config = CrewConfig::load_or_default(project)?;
    println!("\nRuntime: {:?}", config.runtime.kind);
    println!(
        "  {} {} on PATH",
        mark(on_path(&config.runtime.claude_binary)),
        config.runtime.claude_binary
    );

    println!("\nRoster:");
    for role in Role::ALL {
        let profile = role.profile();
        println!("  {:<16} {}", role.name(), profile.capabilities().join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_auto() {
        let cli = Cli::try_parse_from([
            "crew", "auto", "--interval", "120", "--max", "5", "--no-push", "--runtime", "api",
            "--history", "h.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Auto {
                interval,
                max,
                no_push,
                no_commit,
                runtime,
                history,
            } => {
                assert_eq!(interval, Some(120));
                assert_eq!(max, Some(5));
                assert!(no_push);
                assert!(!no_commit);
                assert_eq!(runtime.runtime, Some(RuntimeKind::Api));
                assert_eq!(history, Some(PathBuf::from("h.json")));
            }
            _ => panic!("expected auto"),
        }
    }

    #[test]
    fn test_requirement_conflicts_with_file() {
        assert!(Cli::try_parse_from(["crew", "run", "-r", "blog", "-f", "req.md"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let dir = TempDir::new().unwrap();
        let config = CrewConfig::default();

        let run = run_config(
            &config,
            dir.path(),
            AutoArgs {
                interval: Some(5),
                max: Some(2),
                no_push: true,
                no_commit: false,
            },
        )
        .unwrap();

        assert_eq!(run.interval().as_secs(), 5);
        assert_eq!(run.max_iterations(), 2);
        assert!(run.auto_commit());
        assert!(!run.auto_push());
    }

    #[test]
    fn test_negative_interval_rejected() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from(["crew", "auto", "--interval", "-5"]).unwrap();
        let Commands::Auto { interval, .. } = cli.command else {
            panic!("expected auto");
        };

        let err = run_config(
            &CrewConfig::default(),
            dir.path(),
            AutoArgs {
                interval,
                ..AutoArgs::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_no_commit_implies_no_push() {
        let dir = TempDir::new().unwrap();
        let run = run_config(
            &CrewConfig::default(),
            dir.path(),
            AutoArgs {
                no_commit: true,
                ..AutoArgs::default()
            },
        )
        .unwrap();
        assert!(!run.auto_commit());
        assert!(!run.auto_push());
    }

    #[tokio::test]
    async fn test_read_requirement_sources() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("req.md");
        std::fs::write(&file, "Build a blog").unwrap();

        assert_eq!(
            read_requirement(None, Some(file)).await.unwrap(),
            "Build a blog"
        );
        assert_eq!(
            read_requirement(Some("CLI".into()), None).await.unwrap(),
            "CLI"
        );
        assert_eq!(
            read_requirement(None, None).await.unwrap(),
            DEFAULT_REQUIREMENT
        );
        assert!(read_requirement(None, Some(dir.path().join("missing.md")))
            .await
            .is_err());
    }
}

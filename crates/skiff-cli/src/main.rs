//! Skiff - skill installer for coding agents
//!
//! Usage:
//!   skiff agents                     # Known agents and whether they are present
//!   skiff list                       # Installed skills per agent
//!   skiff install <catalog> [skill]  # Install skills from a catalog directory
//!   skiff check-update               # Environment snapshot

mod spinner;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skiff_core::prelude::*;

use crate::spinner::Spinner;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Install skills into coding agents", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported agents
    Agents {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show installed skills and the agents that have them
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Install skills from a catalog directory
    Install(InstallArgs),

    /// Reinstall skills that are already present
    Update(InstallArgs),

    /// Remove installed skills
    #[command(alias = "rm")]
    Uninstall(UninstallArgs),

    /// Check for a newer release
    CheckUpdate {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct TargetArgs {
    /// Target agent id (repeatable); defaults to configured or detected agents
    #[arg(long = "agent", short = 'a', value_name = "AGENT")]
    agents: Vec<String>,
    /// Install scope (local or global)
    #[arg(long)]
    scope: Option<String>,
    /// Shorthand for --scope global
    #[arg(short = 'g', long, conflicts_with = "scope")]
    global: bool,
}

#[derive(Args)]
struct InstallArgs {
    /// Directory holding one folder per skill
    catalog: PathBuf,
    /// Skills to install; all catalog skills when omitted
    skills: Vec<String>,
    #[command(flatten)]
    target: TargetArgs,
    /// Install method (copy or symlink)
    #[arg(long, short)]
    method: Option<String>,
    /// Overwrite existing installs with different content
    #[arg(long, short)]
    force: bool,
    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct UninstallArgs {
    /// Skills to remove
    #[arg(required = true)]
    skills: Vec<String>,
    #[command(flatten)]
    target: TargetArgs,
    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skiff=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::from_env()?;
    tracing::debug!(
        project_root = %ctx.project_root().display(),
        config_dir = %ctx.config_dir().display(),
        "resolved context"
    );

    match cli.command {
        Commands::Agents { format } => run_agents(&ctx, format)?,
        Commands::List { format } => run_list(&ctx, format).await?,
        Commands::Install(args) => return run_install(&ctx, args, false).await,
        Commands::Update(args) => return run_install(&ctx, args, true).await,
        Commands::Uninstall(args) => return run_uninstall(&ctx, args).await,
        Commands::CheckUpdate { format } => run_check_update(&ctx, format).await?,
    }
    Ok(ExitCode::SUCCESS)
}

fn run_agents(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let registry = ctx.agent_registry();
    let rows: Vec<_> = registry
        .list_agents()
        .iter()
        .map(|agent| (agent, registry.detect(agent)))
        .collect();

    match format {
        OutputFormat::Table => {
            for (agent, detected) in rows {
                let marker = if detected {
                    style("●").green()
                } else {
                    style("○").dim()
                };
                println!(
                    "{} {:<16} {:<16} {}",
                    marker,
                    agent.id,
                    agent.display_name,
                    style(agent.local_root).dim()
                );
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = rows
                .into_iter()
                .map(|(agent, detected)| {
                    serde_json::json!({
                        "id": agent.id,
                        "displayName": agent.display_name,
                        "localRoot": agent.local_root,
                        "globalRoot": agent.global_root,
                        "detected": detected,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

async fn run_list(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let spinner = Spinner::start("Scanning agent directories");
    let installed = ctx.skill_scanner().fetch_installed_skills().await;
    spinner.stop();

    match format {
        OutputFormat::Table => {
            if installed.is_empty() {
                println!("No skills installed.");
            }
            for (skill, agents) in installed.iter() {
                println!("{:<24} {}", style(skill).bold(), agents.join(", "));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&installed)?),
    }
    Ok(())
}

/// Agents named on the command line, else configured defaults, else detected.
fn target_agents(ctx: &AppContext, args: &TargetArgs) -> Vec<String> {
    if !args.agents.is_empty() {
        return args.agents.clone();
    }
    if !ctx.settings().default_agents.is_empty() {
        return ctx.settings().default_agents.clone();
    }
    ctx.agent_registry()
        .detect_installed_agents()
        .into_iter()
        .map(|agent| agent.id.to_string())
        .collect()
}

fn target_scope(args: &TargetArgs) -> Result<InstallScope> {
    if args.global {
        return Ok(InstallScope::Global);
    }
    match &args.scope {
        Some(scope) => Ok(scope.parse()?),
        None => Ok(InstallScope::default()),
    }
}

async fn run_install(ctx: &AppContext, args: InstallArgs, update: bool) -> Result<ExitCode> {
    let catalog = load_catalog(&args.catalog)?;
    let agents = target_agents(ctx, &args.target);
    if agents.is_empty() {
        anyhow::bail!("No agents detected; pass --agent <id> (see `skiff agents`)");
    }
    let method = match &args.method {
        Some(method) => method.parse()?,
        None => ctx.settings().default_method,
    };
    let request = InstallRequest::new(agents, method, target_scope(&args.target)?)
        .with_skills(args.skills.clone())
        .with_force(args.force);

    let installer = ctx.skill_installer();
    let spinner = Spinner::start(if update { "Updating skills" } else { "Installing skills" });
    let outcome = if update {
        installer.update_skills(&catalog, &request).await
    } else {
        installer.install_skills(&catalog, &request).await
    };
    let results = match outcome {
        Ok(results) => results,
        Err(err) => {
            spinner.fail(err.to_string());
            return Err(err.into());
        }
    };
    spinner.set_message("Recording audit log");
    installer.flush_audit().await;

    let failed = results.iter().filter(|r| !r.success).count();
    if failed == 0 {
        spinner.succeed(format!("{} pair(s) processed", results.len()));
    } else {
        spinner.fail(format!("{} of {} pair(s) failed", failed, results.len()));
    }

    match args.format {
        OutputFormat::Table => {
            for result in &results {
                print_row(result.success, &result.agent, &result.skill, &result.status());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    Ok(exit_code(failed == 0))
}

async fn run_uninstall(ctx: &AppContext, args: UninstallArgs) -> Result<ExitCode> {
    let agents = if args.target.agents.is_empty() {
        // Removal targets every agent, detected or not.
        ctx.agent_registry()
            .list_agents()
            .iter()
            .map(|agent| agent.id.to_string())
            .collect()
    } else {
        args.target.agents.clone()
    };
    let request = UninstallRequest {
        skills: args.skills.clone(),
        agents,
        scope: target_scope(&args.target)?,
    };

    let installer = ctx.skill_installer();
    let results = installer.uninstall_skills(&request).await?;
    installer.flush_audit().await;
    match args.format {
        OutputFormat::Table => {
            for result in results.iter().filter(|r| r.reason != Some(FailureReason::NotInstalled)) {
                print_row(result.success, &result.agent, &result.skill, &result.status());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    Ok(exit_code(results.iter().all(|r| r.success)))
}

async fn run_check_update(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let monitor = ctx.environment_monitor("skiff")?;
    let snapshot = monitor.refresh().await;
    if snapshot.check_state == CheckState::Resolved {
        // The resolver's own cache write is detached and may not run before exit.
        let latest = snapshot
            .update_available
            .clone()
            .unwrap_or_else(|| snapshot.current_version.clone());
        ctx.version_cache().set_cached_update(Some(latest)).await;
    }

    match format {
        OutputFormat::Table => {
            println!("skiff {}", snapshot.current_version);
            match snapshot.notice() {
                Some(Notice::UpdateAvailable {
                    current,
                    latest,
                    is_global,
                }) => {
                    println!(
                        "{} Update available: {} → {}",
                        style("⚠").yellow(),
                        current,
                        style(&latest).green()
                    );
                    let hint = if is_global {
                        "cargo install skiff-cli --force"
                    } else {
                        "cargo install skiff-cli"
                    };
                    println!("{} Run {}", style("ℹ").blue(), style(hint).bold());
                }
                Some(Notice::InstallGlobally) => {
                    println!(
                        "{} Install globally for quicker access: {}",
                        style("ℹ").blue(),
                        style("cargo install skiff-cli").bold()
                    );
                }
                None => println!("{} Up to date", style("✓").green()),
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    Ok(())
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn print_row(success: bool, agent: &str, skill: &str, status: &str) {
    let mark = if success {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!("{} {:<16} {:<24} {}", mark, agent, skill, status);
}

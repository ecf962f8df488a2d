#![deny(unsafe_code)]

//! ScriptDesk CLI: inspect and exercise the runner registry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scriptdesk_config::AppConfig;
use scriptdesk_core::engine::builtin_factories;
use scriptdesk_core::registry::RegistryBuilder;
use scriptdesk_core::transfer::transfer_script;
use scriptdesk_core::{EngineHandle, EngineRegistry};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// ScriptDesk: script runner registry and automation tooling.
#[derive(Parser)]
#[command(name = "scriptdesk", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "scriptdesk.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered script runners.
    Runners {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show which runner handles a file.
    Resolve {
        /// Script file to look up by extension.
        file: PathBuf,
    },

    /// Warm up every runner and report the outcome.
    Warmup {
        /// Give up waiting after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Copy a script bundle, leaving out runner-owned files.
    Transfer {
        /// Source bundle directory.
        src: PathBuf,

        /// Destination directory.
        dest: PathBuf,

        /// Runner kind whose files are excluded (defaults to the default runner).
        #[arg(long)]
        engine: Option<String>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    if !cli.config.exists() {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Runners { json } => cmd_runners(&config, json)?,
        Commands::Resolve { file } => cmd_resolve(&config, &file)?,
        Commands::Warmup { timeout } => cmd_warmup(&config, timeout).await?,
        Commands::Transfer { src, dest, engine } => {
            cmd_transfer(&config, src, dest, engine.as_deref()).await?
        }
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

fn registry(config: &AppConfig) -> Result<EngineRegistry> {
    RegistryBuilder::from_config(&config.registry)
        .factories(builtin_factories())
        .build()
        .map_err(|e| anyhow::anyhow!(e))
}

fn cmd_runners(config: &AppConfig, json: bool) -> Result<()> {
    let registry = registry(config)?;
    let runners = registry.runners()?;
    let default = registry.default_runner()?;

    if json {
        let list: Vec<_> = runners
            .iter()
            .map(|runner| {
                serde_json::json!({
                    "position": runner.position(),
                    "kind": runner.kind(),
                    "extensions": runner.extensions(),
                    "state": runner.state(),
                    "default": runner == &default,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        for runner in &runners {
            let marker = if runner == &default { "*" } else { " " };
            println!(
                "{marker} {:<8} {:<12} {}",
                runner.kind(),
                runner.state(),
                runner.extensions().join(", ")
            );
        }
    }
    registry.shutdown();
    Ok(())
}

fn cmd_resolve(config: &AppConfig, file: &Path) -> Result<()> {
    let registry = registry(config)?;
    let runner = registry
        .resolve_path(file)
        .with_context(|| format!("no runner for '{}'", file.display()))?;
    println!("{}", runner.kind());
    registry.shutdown();
    Ok(())
}

async fn cmd_warmup(config: &AppConfig, timeout: Option<u64>) -> Result<()> {
    let registry = registry(config)?;
    let coordinator = registry.coordinator()?;
    info!(runners = coordinator.total(), "Waiting for runner warm-up");

    let result = match timeout {
        Some(secs) => {
            coordinator
                .wait_all_settled_timeout(Duration::from_secs(secs))
                .await
        }
        None => coordinator.wait_all_settled().await,
    };
    if let Err(e) = &result {
        warn!(error = %e, "Warm-up incomplete");
        registry.shutdown();
    }

    for runner in registry.runners()? {
        match runner.failure() {
            Some(failure) => println!("{:<8} {} ({failure})", runner.kind(), runner.state()),
            None => println!("{:<8} {}", runner.kind(), runner.state()),
        }
    }
    let summary = coordinator.summary();
    println!(
        "{}/{} ready, {} failed, {} abandoned",
        summary.ready, summary.total, summary.failed, summary.abandoned
    );
    Ok(())
}

async fn cmd_transfer(
    config: &AppConfig,
    src: PathBuf,
    dest: PathBuf,
    engine: Option<&str>,
) -> Result<()> {
    let registry = registry(config)?;
    let runner = select_runner(&registry, engine)?;
    info!(
        src = %src.display(),
        dest = %dest.display(),
        engine = %runner.kind(),
        "Transferring script"
    );

    let report =
        tokio::task::spawn_blocking(move || transfer_script(&src, &dest, runner.engine().as_ref()))
            .await??;
    println!("Copied {} files, skipped {}.", report.copied, report.skipped);
    registry.shutdown();
    Ok(())
}

fn select_runner(registry: &EngineRegistry, kind: Option<&str>) -> Result<EngineHandle> {
    let runners = registry.runners()?;
    match kind {
        Some(kind) => runners
            .into_iter()
            .find(|runner| runner.kind() == kind)
            .with_context(|| format!("runner '{kind}' is not available")),
        None => Ok(registry.default_runner()?),
    }
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(AppConfig::default())
    }
}

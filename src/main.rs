// SmartCode - Main Entry Point
//
// Command-line front end for the command catalog:
// - list / add / remove catalog entries
// - resolve a command to its final text for a platform
// - run a command locally (audited)
// - serve the HTTP API

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smartcode::audit::{AuditRecorder, FileAuditLog};
use smartcode::catalog::{CommandCatalog, CommandDefinition, ParamKind, ParameterSpec, YamlCatalog};
use smartcode::config::Config;
use smartcode::runner::{prepare_definition, CommandRunner};
use smartcode::tools::Platform;
use smartcode::{logging, metrics, server};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// SmartCode: named shell commands with per-platform templates
#[derive(Parser, Debug)]
#[command(name = "smartcode")]
#[command(version)]
#[command(about = "Run named shell commands across Windows and POSIX", long_about = None)]
struct Args {
    /// Configuration file (default: XDG config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List catalog commands
    List,
    /// Run a catalog command
    Run {
        /// Command name
        name: String,

        /// Parameter value (key=value), repeatable
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Principal recorded in the audit log (default: current user)
        #[arg(long)]
        principal: Option<String>,

        /// Print the full execution result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the final command text without running it
    Resolve {
        /// Command name
        name: String,

        /// Parameter value (key=value), repeatable
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Platform to resolve for (default: configured platform)
        #[arg(long)]
        platform: Option<Platform>,
    },
    /// Add a command to the catalog
    Add {
        #[arg(long)]
        name: String,

        /// Command template, may contain {{placeholders}}
        #[arg(long)]
        command: String,

        /// Parameter as name[:type[:required]], repeatable
        #[arg(long = "param", value_parser = parse_param_spec)]
        params: Vec<ParameterSpec>,

        #[arg(long)]
        icon: Option<String>,

        #[arg(long)]
        emoji: Option<String>,
    },
    /// Remove a command from the catalog
    Remove {
        name: String,
    },
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (default: configured port)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value pair: no '=' found in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("invalid key=value pair: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_param_spec(s: &str) -> Result<ParameterSpec, String> {
    let mut parts = s.split(':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(format!("invalid parameter '{}': empty name", s));
    }
    let kind = match parts.next() {
        Some(kind) if !kind.is_empty() => kind.parse::<ParamKind>()?,
        _ => ParamKind::default(),
    };
    let required = match parts.next() {
        None | Some("") | Some("optional") | Some("false") => false,
        Some("required") | Some("true") => true,
        Some(other) => {
            return Err(format!(
                "invalid parameter '{}': expected 'required' or 'optional', got '{}'",
                s, other
            ))
        }
    };
    if parts.next().is_some() {
        return Err(format!("invalid parameter '{}': too many ':' sections", s));
    }
    Ok(ParameterSpec::new(name, kind, required))
}

fn default_principal() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "cli".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    logging::init(&config.logging, args.verbose)?;
    metrics::init();

    debug!("SmartCode v{} starting", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::List => list_commands(&config).await?,
        Commands::Run {
            name,
            params,
            principal,
            json,
        } => {
            let principal = principal.unwrap_or_else(default_principal);
            run_command(&config, &name, params.into_iter().collect(), &principal, json).await?;
        }
        Commands::Resolve {
            name,
            params,
            platform,
        } => resolve_command(&config, &name, params.into_iter().collect(), platform).await?,
        Commands::Add {
            name,
            command,
            params,
            icon,
            emoji,
        } => {
            let mut definition = CommandDefinition::new(name, command);
            definition.parameters = params;
            definition.icon = icon;
            definition.emoji = emoji;
            add_command(&config, definition).await?;
        }
        Commands::Remove { name } => remove_command(&config, &name).await?,
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config).await?;
        }
    }

    Ok(())
}

async fn open_catalog(config: &Config) -> Result<Arc<YamlCatalog>> {
    let catalog = YamlCatalog::open(&config.catalog.path)
        .await
        .with_context(|| format!("Failed to open catalog {:?}", config.catalog.path))?;
    Ok(Arc::new(catalog))
}

fn build_runner(config: &Config, catalog: Arc<YamlCatalog>) -> Result<CommandRunner> {
    let executor = config.execution.executor()?;
    let recorder = AuditRecorder::new(Arc::new(FileAuditLog::new(&config.audit.path)));
    Ok(CommandRunner::new(catalog, executor, recorder)
        .with_strict_placeholders(config.execution.strict_placeholders))
}

async fn list_commands(config: &Config) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let commands = catalog.list().await;
    if commands.is_empty() {
        println!("No commands in {:?}", config.catalog.path);
        return Ok(());
    }

    for command in commands {
        let marker = command.emoji.as_deref().unwrap_or("•");
        println!("{} {}: {}", marker, command.name, command.raw_template);
        for param in &command.parameters {
            let required = if param.required { ", required" } else { "" };
            println!("    {{{{{}}}}} ({}{})", param.name, param.kind, required);
        }
    }
    Ok(())
}

async fn run_command(
    config: &Config,
    name: &str,
    values: HashMap<String, String>,
    principal: &str,
    json: bool,
) -> Result<()> {
    let runner = build_runner(config, open_catalog(config).await?)?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping command");
                cancel.cancel();
            }
        })
    };

    let outcome = runner
        .execute_with_cancel(name, &values, principal, &cancel)
        .await;
    watcher.abort();
    let result = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.exit_succeeded {
        if !result.stdout.is_empty() {
            println!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            eprintln!("{}", result.stderr);
        }
    }

    if !result.exit_succeeded {
        let message = result
            .error_message
            .clone()
            .unwrap_or_else(|| result.summary());
        anyhow::bail!("{}", message);
    }
    Ok(())
}

async fn resolve_command(
    config: &Config,
    name: &str,
    values: HashMap<String, String>,
    platform: Option<Platform>,
) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let definition = catalog
        .resolve(name)
        .await
        .with_context(|| format!("Command '{}' not found", name))?;
    let platform = match platform {
        Some(platform) => platform,
        None => config.execution.platform()?,
    };
    let prepared = prepare_definition(
        &definition,
        platform,
        &values,
        config.execution.strict_placeholders,
    )?;
    println!("{}", prepared.text);
    Ok(())
}

async fn add_command(config: &Config, definition: CommandDefinition) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let name = definition.name.clone();
    catalog.add(definition).await?;
    info!("Added command '{}'", name);
    println!("Added '{}'", name);
    Ok(())
}

async fn remove_command(config: &Config, name: &str) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let runner = build_runner(config, Arc::clone(&catalog))?;
    catalog.remove(name).await?;
    runner.command_removed(name);
    println!("Removed '{}'", name);
    Ok(())
}

async fn serve(config: &Config) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let runner = Arc::new(build_runner(config, catalog)?);
    server::start_server(&config.server, runner).await
}

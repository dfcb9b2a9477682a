//! EagleTunnel node binary
//!
//! Runs an ET node, or puts a single ASK/DNS request to the configured
//! next hop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use eagletunnel_core::{EtType, NetArg};
use eagletunnel_daemon::{NodeConfig, NodeService};
use eagletunnel_logging::LogLevel;
use eagletunnel_settings::{default_settings_path, Settings};

/// EagleTunnel - chained ET protocol proxy node
#[derive(Parser)]
#[command(name = "eagletunnel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    listen: Option<String>,

    /// Override the next hop (`host:port`)
    #[arg(long)]
    relayer: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node (default)
    Run,

    /// Ask the next hop a control question (PING, VERSION)
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Resolve a name through the next hop
    Dns { domain: String },

    /// Write default settings to the settings file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(default_settings_path);
    let mut settings = Settings::load_from(&path)
        .with_context(|| format!("Failed to load settings from {:?}", path))?;
    if let Some(listen) = cli.listen.clone() {
        settings.listen = listen;
    }
    if let Some(relayer) = cli.relayer.clone() {
        settings.relayer = Some(relayer);
    }

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        settings
            .log_level
            .parse()
            .context("Invalid log_level in settings")?
    };
    eagletunnel_logging::init(level);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_node(&settings).await?,
        Commands::Ask { question } => ask(&settings, question).await?,
        Commands::Dns { domain } => resolve(&settings, &domain).await?,
        Commands::InitConfig { force } => init_config(&settings, &path, force)?,
    }

    Ok(())
}

fn build_service(settings: &Settings) -> Result<NodeService> {
    let config = NodeConfig::from_settings(settings).context("Invalid settings")?;
    Ok(NodeService::new(config))
}

async fn run_node(settings: &Settings) -> Result<()> {
    let service = build_service(settings)?;
    let shutdown = CancellationToken::new();

    info!("Starting EagleTunnel node...");

    tokio::select! {
        result = service.run(shutdown.clone()) => {
            result.context("Node stopped with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            shutdown.cancel();
        }
    }

    info!("Node stopped");
    Ok(())
}

async fn ask(settings: &Settings, question: Vec<String>) -> Result<()> {
    let service = build_service(settings)?;
    let mut arg = NetArg::new(EtType::Ask).with_args(question);
    service
        .engine()
        .send(&mut arg)
        .await
        .context("ASK failed")?;
    println!("{}", arg.reply);
    Ok(())
}

async fn resolve(settings: &Settings, domain: &str) -> Result<()> {
    let service = build_service(settings)?;
    let mut arg = NetArg::new(EtType::Dns).with_domain(domain);
    service
        .engine()
        .send(&mut arg)
        .await
        .with_context(|| format!("DNS lookup of {} failed", domain))?;
    match arg.ip {
        Some(ip) => println!("{}", ip),
        None => println!("{}", arg.reply),
    }
    Ok(())
}

fn init_config(settings: &Settings, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }
    settings
        .save_to(path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote settings to {:?}", path);
    Ok(())
}

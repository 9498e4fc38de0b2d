//! tenantseed CLI - Main Entry Point
//!
//! Provisions the tenants and users an E2E suite logs in with, reports
//! drift, and tears the fixtures down again.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tenantseed::config::env;
use tenantseed::ProvisionConfig;
use tenantseed_cli::commands::{config, plan, provision, teardown, verify};
use tenantseed_cli::output::{self, OutputFormat};

/// tenantseed - E2E tenant and user fixtures
#[derive(Parser)]
#[command(name = "tenantseed")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = env::CONFIG_FILE, global = true)]
    config: Option<PathBuf>,

    /// Identity API base URL (overrides config and environment)
    #[arg(long, global = true)]
    identity_url: Option<String>,

    /// Manifest file (overrides config and environment)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or repair the catalog tenants and users
    Provision(provision::ProvisionArgs),

    /// Delete everything recorded in the manifest
    Teardown,

    /// Show what provisioning would change
    Plan(plan::PlanArgs),

    /// Wait until every catalog user is visible
    Verify(verify::VerifyArgs),

    /// Inspect or create configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

impl Cli {
    /// File, then environment, then flags
    fn load_config(&self) -> anyhow::Result<ProvisionConfig> {
        let mut config = match &self.config {
            Some(path) => ProvisionConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => ProvisionConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());

        if let Some(url) = &self.identity_url {
            config.services.identity = url.clone();
        }
        if let Some(path) = &self.state_file {
            config.manifest_path = path.clone();
        }
        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    tracing::debug!("Identity API at {}", config.services.identity);

    match cli.command {
        Commands::Provision(args) => provision::execute(args, &config, cli.format).await,
        Commands::Teardown => teardown::execute(&config, cli.format).await,
        Commands::Plan(args) => plan::execute(args, &config, cli.format).await,
        Commands::Verify(args) => verify::execute(args, &config, cli.format).await,
        Commands::Config(cmd) => config::execute(cmd, &config, cli.format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

//! Config Commands

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;

use tenantseed::ProvisionConfig;

use crate::output::{print_list, print_structured, print_success, OutputFormat, TableDisplay};

const REDACTED: &str = "********";

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Destination path
        #[arg(default_value = "tenantseed.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
pub struct SettingDisplay {
    pub key: String,
    pub value: String,
}

impl SettingDisplay {
    fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl TableDisplay for SettingDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Setting", "Value"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.key.clone(), self.value.clone()]
    }
}

/// A copy of `config` safe to print
pub fn redacted(config: &ProvisionConfig) -> ProvisionConfig {
    let mut config = config.clone();
    if let Some(creds) = config.credentials.as_mut() {
        creds.password = REDACTED.to_string();
    }
    config
}

pub fn settings(config: &ProvisionConfig) -> Vec<SettingDisplay> {
    let mut rows: Vec<SettingDisplay> = config
        .services
        .configured()
        .into_iter()
        .map(|(name, url)| SettingDisplay::new(&format!("services.{name}"), url))
        .collect();

    let user = config
        .credentials
        .as_ref()
        .map(|c| c.username.clone())
        .unwrap_or_else(|| "<not set>".to_string());
    rows.push(SettingDisplay::new("credentials.username", user));
    if config.credentials.is_some() {
        rows.push(SettingDisplay::new("credentials.password", REDACTED));
    }

    rows.push(SettingDisplay::new("manifest_path", config.manifest_path.display()));
    rows.push(SettingDisplay::new(
        "catalog_path",
        config
            .catalog_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<built-in>".to_string()),
    ));
    rows.push(SettingDisplay::new("request_timeout_secs", config.request_timeout_secs));
    rows.push(SettingDisplay::new("reconcile.user_concurrency", config.reconcile.user_concurrency));
    rows.push(SettingDisplay::new("reconcile.create_attempts", config.reconcile.create_attempts));
    rows.push(SettingDisplay::new("reconcile.create_backoff_ms", config.reconcile.create_backoff_ms));
    rows.push(SettingDisplay::new("teardown.user_concurrency", config.teardown.user_concurrency));
    rows.push(SettingDisplay::new("teardown.tenant_concurrency", config.teardown.tenant_concurrency));
    rows.push(SettingDisplay::new("verify.timeout_secs", config.verify.timeout_secs));
    rows.push(SettingDisplay::new("verify.poll_interval_ms", config.verify.poll_interval_ms));
    rows
}

pub async fn execute(cmd: ConfigCommands, config: &ProvisionConfig, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            if format.is_structured() {
                print_structured(&redacted(config), format)?;
            } else {
                print_list(&settings(config), format)?;
            }
        }

        ConfigCommands::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ProvisionConfig::default()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            print_success(&format!("Wrote default configuration to {}", path.display()));
        }
    }
    Ok(())
}

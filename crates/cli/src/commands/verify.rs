//! Verify Command

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use tenantseed::provision::{self, resolve_catalog};
use tenantseed::verify::VerifyReport;
use tenantseed::ProvisionConfig;

use crate::output::{print_item, print_success, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct VerifyArgs {
    /// YAML catalog to verify instead of the built-in one
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Serialize)]
pub struct VerifyDisplay(VerifyReport);

impl TableDisplay for VerifyDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Users", "Polls", "Elapsed"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.0.verified_users.to_string(),
            self.0.attempts.to_string(),
            format!("{}ms", self.0.elapsed_ms),
        ]
    }
}

pub async fn execute(args: VerifyArgs, config: &ProvisionConfig, format: OutputFormat) -> Result<()> {
    let catalog_path = args.catalog.or_else(|| config.catalog_path.clone());
    let catalog = resolve_catalog(catalog_path.as_deref()).context("loading catalog")?;

    let mut config = config.clone();
    if let Some(secs) = args.timeout {
        config.verify.timeout_secs = secs;
    }

    let report = provision::verify(&config, &catalog)
        .await
        .context("verification failed")?;

    print_item(&VerifyDisplay(report), format)?;
    if !format.is_structured() {
        print_success("Every catalog user is visible with the expected roles");
    }
    Ok(())
}

//! Plan Command

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use tenantseed::provision::{self, resolve_catalog};
use tenantseed::reconciler::{DriftKind, DriftReport};
use tenantseed::ProvisionConfig;

use crate::output::{print_list, print_structured, print_success, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// YAML catalog to compare against instead of the built-in one
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct DriftDisplay {
    pub resource_type: String,
    pub name: String,
    pub action: String,
    pub detail: String,
}

impl From<DriftReport> for DriftDisplay {
    fn from(d: DriftReport) -> Self {
        let action = match d.kind {
            DriftKind::TenantMissing | DriftKind::UserMissing => "create",
            DriftKind::TenantDisabled => "re-enable",
            DriftKind::UserMismatch => "recreate",
        };
        Self {
            resource_type: d.resource_type,
            name: d.name,
            action: action.to_string(),
            detail: d.message,
        }
    }
}

impl TableDisplay for DriftDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Type", "Name", "Action", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.resource_type.clone(),
            self.name.clone(),
            self.action.clone(),
            self.detail.clone(),
        ]
    }
}

pub async fn execute(args: PlanArgs, config: &ProvisionConfig, format: OutputFormat) -> Result<()> {
    let catalog_path = args.catalog.or_else(|| config.catalog_path.clone());
    let catalog = resolve_catalog(catalog_path.as_deref()).context("loading catalog")?;

    let drift = provision::plan(config, &catalog)
        .await
        .context("computing plan failed")?;
    let displays: Vec<DriftDisplay> = drift.into_iter().map(DriftDisplay::from).collect();

    if format.is_structured() {
        return print_structured(&displays, format);
    }
    if displays.is_empty() {
        print_success("Identity service already matches the catalog");
        return Ok(());
    }
    print_list(&displays, format)?;
    println!("{} change(s) pending", displays.len());
    Ok(())
}

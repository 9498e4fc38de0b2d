//! Provision Command

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use tenantseed::provision::{self, resolve_catalog, ProvisionOutcome};
use tenantseed::ProvisionConfig;

use super::ChangeRow;
use crate::output::{print_info, print_list, print_structured, print_success, print_warning, OutputFormat};

#[derive(Args, Debug, Default)]
pub struct ProvisionArgs {
    /// YAML catalog to provision instead of the built-in one
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Skip polling for the users to become visible
    #[arg(long)]
    pub no_verify: bool,
}

/// Summary rows for a provisioning run
pub fn change_rows(outcome: &ProvisionOutcome) -> Vec<ChangeRow> {
    let r = &outcome.reconcile;
    ChangeRow::many("tenant", &r.tenants_created, "created")
        .chain(ChangeRow::many("tenant", &r.tenants_enabled, "re-enabled"))
        .chain(ChangeRow::many("user", &r.users_created, "created"))
        .chain(ChangeRow::many("user", &r.users_recreated, "recreated"))
        .chain(ChangeRow::many("user", &r.users_converged, "unchanged"))
        .chain(r.failures.iter().map(ChangeRow::failed))
        .collect()
}

pub async fn execute(args: ProvisionArgs, config: &ProvisionConfig, format: OutputFormat) -> Result<()> {
    let catalog_path = args.catalog.or_else(|| config.catalog_path.clone());
    let catalog = resolve_catalog(catalog_path.as_deref()).context("loading catalog")?;

    if !format.is_structured() {
        print_info(&format!(
            "Provisioning {} tenant(s) and {} user(s) against {}",
            catalog.tenants.len(),
            catalog.users.len(),
            config.services.identity
        ));
    }

    let outcome = provision::run(config, &catalog, !args.no_verify)
        .await
        .context("provisioning failed")?;

    if format.is_structured() {
        return print_structured(&outcome, format);
    }

    print_list(&change_rows(&outcome), format)?;
    for failure in &outcome.reconcile.failures {
        print_warning(&format!("{} {}: {}", failure.resource_type, failure.name, failure.error));
    }
    if let Some(verify) = &outcome.verify {
        print_info(&format!(
            "{} user(s) visible after {} poll(s)",
            verify.verified_users, verify.attempts
        ));
    }
    print_success(&format!(
        "Provisioned in {} ms; manifest at {} lists {} tenant(s), {} user(s)",
        outcome.reconcile.duration_ms,
        config.manifest_path.display(),
        outcome.manifest.tenants.len(),
        outcome.manifest.users.len()
    ));
    Ok(())
}

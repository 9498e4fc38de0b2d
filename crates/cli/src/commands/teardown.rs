//! Teardown Command

use anyhow::{Context, Result};

use tenantseed::teardown::{self, SkipReason, TeardownReport};
use tenantseed::ProvisionConfig;

use super::ChangeRow;
use crate::output::{print_info, print_list, print_structured, print_success, print_warning, OutputFormat};

pub fn change_rows(report: &TeardownReport) -> Vec<ChangeRow> {
    ChangeRow::many("user", &report.users_deleted, "deleted")
        .chain(ChangeRow::many("tenant", &report.tenants_deleted, "deleted"))
        .chain(ChangeRow::many("-", &report.already_absent, "already absent"))
        .chain(report.failures.iter().map(ChangeRow::failed))
        .collect()
}

pub async fn execute(config: &ProvisionConfig, format: OutputFormat) -> Result<()> {
    let report = teardown::run(config).await.context("teardown failed")?;

    if format.is_structured() {
        return print_structured(&report, format);
    }

    match report.skipped {
        Some(SkipReason::NoCredentials) => {
            print_info("No provisioning credentials configured; nothing torn down");
            return Ok(());
        }
        Some(SkipReason::NoManifest) => {
            print_info(&format!(
                "No manifest at {}; nothing to tear down",
                config.manifest_path.display()
            ));
            return Ok(());
        }
        None => {}
    }

    print_list(&change_rows(&report), format)?;
    if !report.failures.is_empty() {
        print_warning(&format!(
            "{} entit(ies) could not be deleted",
            report.failures.len()
        ));
    }
    if !report.manifest_removed {
        print_warning(&format!(
            "Manifest {} was not removed",
            config.manifest_path.display()
        ));
    }
    print_success(&format!(
        "Teardown finished in {} ms",
        report.duration_ms
    ));
    Ok(())
}

//! Provisioning run: log in, reconcile, persist the manifest, verify.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::client::IdentityClient;
use crate::config::ProvisionConfig;
use crate::error::ProvisionResult;
use crate::manifest::Manifest;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::verify::{wait_for_convergence, VerifyReport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub reconcile: ReconcileReport,
    /// Manifest as persisted after merging this run
    pub manifest: Manifest,
    pub verify: Option<VerifyReport>,
}

/// The catalog at `path`, or the built-in one
pub fn resolve_catalog(path: Option<&Path>) -> ProvisionResult<Catalog> {
    match path {
        Some(path) => {
            info!("Loading catalog from {}", path.display());
            Catalog::from_file(path)
        }
        None => Ok(Catalog::default()),
    }
}

/// Converge the identity service onto `catalog` and record what was created.
///
/// Names created before a failure are still merged into the manifest so a
/// later teardown can remove them.
pub async fn run(
    config: &ProvisionConfig,
    catalog: &Catalog,
    verify: bool,
) -> ProvisionResult<ProvisionOutcome> {
    config.validate()?;
    catalog.validate()?;
    let credentials = config.require_credentials()?;

    let client = IdentityClient::login(
        &config.services.identity,
        credentials,
        config.request_timeout(),
    )
    .await
    .inspect_err(|e| error!("Aborting provisioning: {}", e))?;

    let mut created = Manifest::default();
    let reconciler = Reconciler::with_config(&client, catalog, config.reconciler_config());

    let reconcile = match reconciler.reconcile(&mut created).await {
        Ok(report) => report,
        Err(e) => {
            if !created.is_empty() {
                warn!("Provisioning failed; recording partially created entities");
                if let Err(save_err) = created.save_merged(&config.manifest_path) {
                    warn!("Failed to write manifest: {}", save_err);
                }
            }
            return Err(e);
        }
    };

    let manifest = created.save_merged(&config.manifest_path)?;

    let verify = if verify {
        Some(
            wait_for_convergence(
                &client,
                catalog,
                config.verify.timeout(),
                config.verify.poll_interval(),
            )
            .await?,
        )
    } else {
        None
    };

    Ok(ProvisionOutcome {
        reconcile,
        manifest,
        verify,
    })
}

/// Log in and compute drift without changing anything
pub async fn plan(
    config: &ProvisionConfig,
    catalog: &Catalog,
) -> ProvisionResult<Vec<crate::reconciler::DriftReport>> {
    config.validate()?;
    catalog.validate()?;
    let client = IdentityClient::login(
        &config.services.identity,
        config.require_credentials()?,
        config.request_timeout(),
    )
    .await?;
    Reconciler::new(&client, catalog).plan().await
}

/// Log in and poll until the catalog is visible
pub async fn verify(config: &ProvisionConfig, catalog: &Catalog) -> ProvisionResult<VerifyReport> {
    config.validate()?;
    catalog.validate()?;
    let client = IdentityClient::login(
        &config.services.identity,
        config.require_credentials()?,
        config.request_timeout(),
    )
    .await?;
    wait_for_convergence(
        &client,
        catalog,
        config.verify.timeout(),
        config.verify.poll_interval(),
    )
    .await
}

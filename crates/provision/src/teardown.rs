//! Teardown sweep
//!
//! Deletes the users and tenants named in the manifest written by a
//! provisioning run. Safe to run unconditionally: without credentials or
//! without a manifest it does nothing. Individual deletion failures are
//! logged and skipped; only structural problems (unreadable manifest, failed
//! login, failed listing) are returned as errors.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::batch::settle_in_batches;
use crate::client::{IdentityApi, IdentityClient};
use crate::config::{ProvisionConfig, TeardownSettings};
use crate::error::ProvisionResult;
use crate::index::{TenantIndex, UserIndex};
use crate::manifest::Manifest;
use crate::reconciler::EntityFailure;

/// Why the sweep did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoCredentials,
    NoManifest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeardownReport {
    pub skipped: Option<SkipReason>,
    pub users_deleted: Vec<String>,
    pub tenants_deleted: Vec<String>,
    /// Listed in the manifest but already gone
    pub already_absent: Vec<String>,
    pub failures: Vec<EntityFailure>,
    pub manifest_removed: bool,
    pub duration_ms: u64,
}

impl TeardownReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Full teardown: check preconditions, log in, sweep, remove the manifest
pub async fn run(config: &ProvisionConfig) -> ProvisionResult<TeardownReport> {
    let start = Instant::now();

    let Some(credentials) = config.credentials.as_ref() else {
        info!("No provisioning credentials configured, skipping teardown");
        return Ok(TeardownReport::skipped(SkipReason::NoCredentials));
    };

    let manifest = match Manifest::load(&config.manifest_path) {
        Ok(Some(manifest)) => manifest,
        Ok(None) => {
            info!(
                "No manifest at {}, nothing to tear down",
                config.manifest_path.display()
            );
            return Ok(TeardownReport::skipped(SkipReason::NoManifest));
        }
        Err(e) => {
            error!("Aborting teardown: {}", e);
            return Err(e);
        }
    };

    let client = IdentityClient::login(
        &config.services.identity,
        credentials,
        config.request_timeout(),
    )
    .await
    .inspect_err(|e| error!("Aborting teardown: {}", e))?;

    let mut report = sweep(&client, &manifest, &config.teardown).await?;
    report.manifest_removed = finish(&config.manifest_path);
    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

fn finish(manifest_path: &Path) -> bool {
    match Manifest::remove(manifest_path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to remove manifest {}: {}", manifest_path.display(), e);
            false
        }
    }
}

/// Delete manifest-listed users, then manifest-listed tenants.
///
/// Users go `settings.user_concurrency` at a time, tenants
/// `settings.tenant_concurrency` at a time. Names that no longer exist are
/// reported as already absent.
pub async fn sweep<A: IdentityApi>(
    api: &A,
    manifest: &Manifest,
    settings: &TeardownSettings,
) -> ProvisionResult<TeardownReport> {
    let start = Instant::now();
    let mut report = TeardownReport::default();

    info!(
        "Tearing down {} user(s) and {} tenant(s)",
        manifest.users.len(),
        manifest.tenants.len()
    );

    let tenants = TenantIndex::build(api.list_tenants().await?);
    let users = UserIndex::build(api.list_users(None).await?);

    let mut user_targets = Vec::new();
    for username in &manifest.users {
        match users.get(username) {
            Some(user) => user_targets.push((username.clone(), user.id.clone())),
            None => report.already_absent.push(username.clone()),
        }
    }

    let settled = settle_in_batches(user_targets, settings.user_concurrency, move |(_, id)| async move {
        api.delete_user(&id).await
    })
    .await;
    for s in settled {
        let (username, _) = s.item;
        match s.result {
            Ok(()) => {
                info!("Deleted user {}", username);
                report.users_deleted.push(username);
            }
            Err(e) => {
                warn!("Failed to delete user {}: {}", username, e);
                report.failures.push(EntityFailure {
                    resource_type: "user".to_string(),
                    name: username,
                    error: e.to_string(),
                });
            }
        }
    }

    let mut tenant_targets = Vec::new();
    for name in &manifest.tenants {
        match tenants.get(name) {
            Some(tenant) => tenant_targets.push((name.clone(), tenant.id.clone())),
            None => report.already_absent.push(name.clone()),
        }
    }

    let settled =
        settle_in_batches(tenant_targets, settings.tenant_concurrency, move |(_, id)| async move {
            api.delete_tenant(&id).await
        })
        .await;
    for s in settled {
        let (name, _) = s.item;
        match s.result {
            Ok(()) => {
                info!("Deleted tenant {}", name);
                report.tenants_deleted.push(name);
            }
            Err(e) => {
                warn!("Failed to delete tenant {}: {}", name, e);
                report.failures.push(EntityFailure {
                    resource_type: "tenant".to_string(),
                    name,
                    error: e.to_string(),
                });
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Teardown done: {} user(s), {} tenant(s) deleted, {} absent, {} failure(s)",
        report.users_deleted.len(),
        report.tenants_deleted.len(),
        report.already_absent.len(),
        report.failures.len()
    );
    Ok(report)
}

//! Convergence verification.
//!
//! The identity service invalidates its caches asynchronously, so a user
//! created a moment ago may not yet show up in the tenant-filtered listing
//! the UI reads from. `wait_for_convergence` polls that listing until every
//! catalog user appears exactly once, enabled, with the catalog role set.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::client::IdentityApi;
use crate::error::{ProvisionError, ProvisionResult};
use crate::index::{same_name, TenantIndex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub verified_users: usize,
}

/// One pass: usernames from the catalog that are not yet visible as
/// desired in `GET /users?tenantId=`.
pub async fn pending_users<A: IdentityApi>(
    api: &A,
    catalog: &Catalog,
) -> ProvisionResult<Vec<String>> {
    let tenants = TenantIndex::build(api.list_tenants().await?);
    let mut pending = Vec::new();

    for desired_tenant in &catalog.tenants {
        let members: Vec<_> = catalog.users_in(&desired_tenant.name).collect();
        if members.is_empty() {
            continue;
        }

        let Some(tenant_id) = tenants.id_of(&desired_tenant.name) else {
            pending.extend(members.iter().map(|u| u.username.clone()));
            continue;
        };

        let listed = api.list_users(Some(tenant_id)).await?;
        for desired in members {
            let matches: Vec<_> = listed
                .iter()
                .filter(|u| same_name(&u.username, &desired.username))
                .collect();
            let ok = matches.len() == 1
                && matches[0].enabled
                && matches[0].role_set() == desired.role_set();
            if !ok {
                debug!(
                    "User {} not converged yet ({} listing(s))",
                    desired.username,
                    matches.len()
                );
                pending.push(desired.username.clone());
            }
        }
    }

    Ok(pending)
}

/// Poll until [`pending_users`] is empty or `timeout` elapses
pub async fn wait_for_convergence<A: IdentityApi>(
    api: &A,
    catalog: &Catalog,
    timeout: Duration,
    interval: Duration,
) -> ProvisionResult<VerifyReport> {
    let start = Instant::now();
    let mut attempts = 0;
    let mut last_pending = Vec::new();

    loop {
        attempts += 1;

        match pending_users(api, catalog).await {
            Ok(pending) if pending.is_empty() => {
                let report = VerifyReport {
                    attempts,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    verified_users: catalog.users.len(),
                };
                info!(
                    "All {} user(s) visible after {} poll(s) ({} ms)",
                    report.verified_users, report.attempts, report.elapsed_ms
                );
                return Ok(report);
            }
            Ok(pending) => {
                if attempts == 1 {
                    info!("Waiting for {} user(s) to become visible...", pending.len());
                }
                last_pending = pending;
            }
            Err(e) => {
                warn!("Verification listing failed: {}", e);
            }
        }

        if start.elapsed() >= timeout {
            break;
        }
        sleep(interval).await;
    }

    Err(ProvisionError::Timeout(format!(
        "users to converge after {} poll(s): {}",
        attempts,
        last_pending.join(", ")
    )))
}

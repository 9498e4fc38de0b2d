//! Tenant/user reconciliation
//!
//! Converges the identity service onto a [`Catalog`]: creates missing
//! tenants, re-enables disabled ones, and creates or recreates users whose
//! (tenant, roles, enabled) triple differs from the catalog entry.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::batch::settle_in_batches;
use crate::catalog::{Catalog, DesiredUser};
use crate::client::IdentityApi;
use crate::error::{ProvisionError, ProvisionResult};
use crate::index::{TenantIndex, UserIndex};
use crate::manifest::Manifest;
use crate::retry::RetryPolicy;
use crate::types::{NewTenant, TenantStatus};

/// Why an existing user does not match its catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum Mismatch {
    Tenant {
        expected: Option<String>,
        actual: Option<String>,
    },
    Roles {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    Disabled,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::Tenant { expected, actual } => write!(
                f,
                "tenant {} != {}",
                actual.as_deref().unwrap_or("<none>"),
                expected.as_deref().unwrap_or("<missing>")
            ),
            Mismatch::Roles { expected, actual } => {
                write!(f, "roles [{}] != [{}]", actual.join(","), expected.join(","))
            }
            Mismatch::Disabled => write!(f, "user is disabled"),
        }
    }
}

/// What to do with one catalog user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDecision {
    /// Existing user already matches
    Converged,
    /// No user with this username
    NeedsCreate,
    /// Existing user differs; delete `existing_id` then create
    NeedsRecreate {
        existing_id: String,
        mismatches: Vec<Mismatch>,
    },
}

/// Compare an existing user against its catalog entry.
///
/// `tenant_id` is the resolved id of the desired tenant, `None` if the
/// tenant does not exist yet. Roles compare as sorted lowercase sets.
pub fn decide_user(
    desired: &DesiredUser,
    tenant_id: Option<&str>,
    existing: Option<&crate::types::User>,
) -> UserDecision {
    let Some(existing) = existing else {
        return UserDecision::NeedsCreate;
    };

    let mut mismatches = Vec::new();

    let actual_tenant = existing.tenant_id.as_deref();
    if tenant_id.is_none() || actual_tenant != tenant_id {
        mismatches.push(Mismatch::Tenant {
            expected: tenant_id.map(str::to_string),
            actual: actual_tenant.map(str::to_string),
        });
    }

    let expected_roles = desired.role_set();
    let actual_roles = existing.role_set();
    if expected_roles != actual_roles {
        mismatches.push(Mismatch::Roles {
            expected: expected_roles,
            actual: actual_roles,
        });
    }

    if !existing.enabled {
        mismatches.push(Mismatch::Disabled);
    }

    if mismatches.is_empty() {
        UserDecision::Converged
    } else {
        UserDecision::NeedsRecreate {
            existing_id: existing.id.clone(),
            mismatches,
        }
    }
}

/// A per-entity failure that did not abort reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFailure {
    pub resource_type: String,
    pub name: String,
    pub error: String,
}

/// Summary of one reconciliation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub tenants_created: Vec<String>,
    pub tenants_enabled: Vec<String>,
    pub users_created: Vec<String>,
    pub users_recreated: Vec<String>,
    pub users_converged: Vec<String>,
    pub failures: Vec<EntityFailure>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    /// Whether the run issued no mutating call
    pub fn is_noop(&self) -> bool {
        self.tenants_created.is_empty()
            && self.tenants_enabled.is_empty()
            && self.users_created.is_empty()
            && self.users_recreated.is_empty()
    }

    fn fail(&mut self, resource_type: &str, name: &str, error: &ProvisionError) {
        self.failures.push(EntityFailure {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            error: error.to_string(),
        });
    }
}

/// Kinds of drift between catalog and live state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    TenantMissing,
    TenantDisabled,
    UserMissing,
    UserMismatch,
}

/// One difference found by [`Reconciler::plan`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub resource_type: String,
    pub name: String,
    pub kind: DriftKind,
    pub message: String,
}

/// Tunables for [`Reconciler`]
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Users converged concurrently per batch
    pub user_concurrency: usize,
    /// Attempts and backoff for user creation
    pub create_retry: RetryPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            user_concurrency: 2,
            create_retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct UserOp<'c> {
    desired: &'c DesiredUser,
    tenant_id: String,
    decision: UserDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserOutcome {
    Converged,
    Created,
    Recreated,
}

/// Converges an identity service onto a catalog
pub struct Reconciler<'a, A: IdentityApi> {
    api: &'a A,
    catalog: &'a Catalog,
    config: ReconcilerConfig,
}

impl<'a, A: IdentityApi> Reconciler<'a, A> {
    pub fn new(api: &'a A, catalog: &'a Catalog) -> Self {
        Self::with_config(api, catalog, ReconcilerConfig::default())
    }

    pub fn with_config(api: &'a A, catalog: &'a Catalog, config: ReconcilerConfig) -> Self {
        Self {
            api,
            catalog,
            config,
        }
    }

    /// Converge tenants then users. Created names are recorded in `manifest`
    /// as they happen, so a caller can persist them even when this fails.
    pub async fn reconcile(&self, manifest: &mut Manifest) -> ProvisionResult<ReconcileReport> {
        let start = Instant::now();
        let mut report = ReconcileReport::default();

        info!(
            "Reconciling {} tenant(s) and {} user(s)",
            self.catalog.tenants.len(),
            self.catalog.users.len()
        );

        let tenants = self.reconcile_tenants(manifest, &mut report).await?;
        self.reconcile_users(&tenants, manifest, &mut report).await?;

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Reconciliation done: {} tenant(s) created, {} re-enabled, {} user(s) created, {} recreated, {} unchanged ({} ms)",
            report.tenants_created.len(),
            report.tenants_enabled.len(),
            report.users_created.len(),
            report.users_recreated.len(),
            report.users_converged.len(),
            report.duration_ms
        );
        Ok(report)
    }

    /// Create missing tenants, then re-enable any desired tenant that is not
    /// enabled. Returns the index from the post-creation listing.
    async fn reconcile_tenants(
        &self,
        manifest: &mut Manifest,
        report: &mut ReconcileReport,
    ) -> ProvisionResult<TenantIndex> {
        let existing = TenantIndex::build(self.api.list_tenants().await?);
        debug!("Found {} existing tenant(s)", existing.len());

        for desired in &self.catalog.tenants {
            if existing.get(&desired.name).is_some() {
                continue;
            }
            let body = NewTenant {
                name: desired.name.clone(),
                status: TenantStatus::Enabled,
                auth_config: desired.auth_config.clone(),
            };
            match self.api.create_tenant(&body).await {
                Ok(created) => {
                    let id = created.map(|t| t.id).unwrap_or_default();
                    info!("Created tenant {} (id: {})", desired.name, id);
                    manifest.record_tenant(&desired.name);
                    report.tenants_created.push(desired.name.clone());
                }
                Err(e) => {
                    warn!("Failed to create tenant {}: {}", desired.name, e);
                    report.fail("tenant", &desired.name, &e);
                }
            }
        }

        // Re-list for server-assigned ids and current status
        let tenants = TenantIndex::build(self.api.list_tenants().await?);

        for desired in &self.catalog.tenants {
            let Some(tenant) = tenants.get(&desired.name) else {
                continue;
            };
            if tenant.is_enabled() {
                continue;
            }
            info!(
                "Tenant {} is {}, re-enabling",
                tenant.name,
                tenant.status.as_str()
            );
            match self.enable_tenant(&tenant.id).await {
                Ok(()) => report.tenants_enabled.push(tenant.name.clone()),
                Err(e) => {
                    warn!("Failed to enable tenant {}: {}", tenant.name, e);
                    report.fail("tenant", &tenant.name, &e);
                }
            }
        }

        Ok(tenants)
    }

    /// Full-record update: fetch, force status, send everything back
    async fn enable_tenant(&self, id: &str) -> ProvisionResult<()> {
        let mut full = self.api.get_tenant(id).await?;
        full.status = TenantStatus::Enabled;
        self.api.update_tenant(&full).await
    }

    async fn reconcile_users(
        &self,
        tenants: &TenantIndex,
        manifest: &mut Manifest,
        report: &mut ReconcileReport,
    ) -> ProvisionResult<()> {
        let mut users = UserIndex::build(self.api.list_users(None).await?);
        debug!("Found {} existing user(s)", users.len());

        // Resolve every tenant before touching any user
        let catalog = self.catalog;
        let mut ops = Vec::with_capacity(catalog.users.len());
        for desired in &catalog.users {
            let tenant_id = tenants
                .id_of(&desired.tenant)
                .ok_or_else(|| ProvisionError::MissingTenant {
                    tenant: desired.tenant.clone(),
                    username: desired.username.clone(),
                })?;
            let decision = decide_user(desired, Some(tenant_id), users.get(&desired.username));
            ops.push(UserOp {
                desired,
                tenant_id: tenant_id.to_string(),
                decision,
            });
        }

        let this = self;
        let settled = settle_in_batches(ops, self.config.user_concurrency, move |op| {
            this.apply_user(op)
        })
        .await;

        let mut first_error = None;
        for s in settled {
            let username = &s.item.desired.username;
            match s.result {
                Ok(UserOutcome::Converged) => report.users_converged.push(username.clone()),
                Ok(UserOutcome::Created) => {
                    manifest.record_user(username);
                    report.users_created.push(username.clone());
                }
                Ok(UserOutcome::Recreated) => {
                    // The listed record is stale once deleted
                    users.remove(username);
                    manifest.record_user(username);
                    report.users_recreated.push(username.clone());
                }
                Err(e) => {
                    error!("Failed to converge user {}: {}", username, e);
                    report.fail("user", username, &e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn apply_user(&self, op: UserOp<'a>) -> ProvisionResult<UserOutcome> {
        match op.decision {
            UserDecision::Converged => {
                debug!("User {} already converged", op.desired.username);
                Ok(UserOutcome::Converged)
            }
            UserDecision::NeedsCreate => {
                self.create_user(op.desired, &op.tenant_id).await?;
                Ok(UserOutcome::Created)
            }
            UserDecision::NeedsRecreate {
                existing_id,
                mismatches,
            } => {
                let reasons: Vec<String> = mismatches.iter().map(ToString::to_string).collect();
                info!(
                    "Recreating user {} ({})",
                    op.desired.username,
                    reasons.join("; ")
                );
                self.api.delete_user(&existing_id).await?;
                self.create_user(op.desired, &op.tenant_id).await?;
                Ok(UserOutcome::Recreated)
            }
        }
    }

    /// Create a user, retrying uniformly on any failure. Between attempts
    /// the user list is re-read; a listed record counts as created only if
    /// it is already converged on tenant, enablement and roles.
    async fn create_user(&self, desired: &DesiredUser, tenant_id: &str) -> ProvisionResult<()> {
        let payload = desired.to_new_user(tenant_id);
        let policy = self.config.create_retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.api.create_user(&payload).await {
                Ok(_) => {
                    info!("Created user {} in tenant {}", desired.username, desired.tenant);
                    return Ok(());
                }
                Err(e) => e,
            };

            warn!(
                "Create user {} failed (attempt {}/{}): {}",
                desired.username, attempt, policy.max_attempts, err
            );
            tokio::time::sleep(policy.delay_after(attempt)).await;

            if self.user_converged(desired, tenant_id).await {
                info!("User {} present after failed create", desired.username);
                return Ok(());
            }

            if !policy.has_next(attempt) {
                return Err(ProvisionError::CreateUser {
                    username: desired.username.clone(),
                    attempts: attempt,
                    last_error: Box::new(err),
                });
            }
        }
    }

    async fn user_converged(&self, desired: &DesiredUser, tenant_id: &str) -> bool {
        match self.api.list_users(None).await {
            Ok(users) => {
                let users = UserIndex::build(users);
                let decision = decide_user(desired, Some(tenant_id), users.get(&desired.username));
                if let UserDecision::NeedsRecreate { mismatches, .. } = &decision {
                    debug!(
                        "Listed user {} does not match yet: {} mismatch(es)",
                        desired.username,
                        mismatches.len()
                    );
                }
                decision == UserDecision::Converged
            }
            Err(e) => {
                warn!("Re-listing users failed: {}", e);
                false
            }
        }
    }

    /// Compute the drift between catalog and live state without changing
    /// anything.
    pub async fn plan(&self) -> ProvisionResult<Vec<DriftReport>> {
        let tenants = TenantIndex::build(self.api.list_tenants().await?);
        let users = UserIndex::build(self.api.list_users(None).await?);
        let mut drift = Vec::new();

        for desired in &self.catalog.tenants {
            match tenants.get(&desired.name) {
                None => drift.push(DriftReport {
                    resource_type: "tenant".to_string(),
                    name: desired.name.clone(),
                    kind: DriftKind::TenantMissing,
                    message: "tenant does not exist".to_string(),
                }),
                Some(t) if !t.is_enabled() => drift.push(DriftReport {
                    resource_type: "tenant".to_string(),
                    name: desired.name.clone(),
                    kind: DriftKind::TenantDisabled,
                    message: format!("tenant is {}", t.status.as_str()),
                }),
                Some(_) => {}
            }
        }

        for desired in &self.catalog.users {
            let tenant_id = tenants.id_of(&desired.tenant);
            match decide_user(desired, tenant_id, users.get(&desired.username)) {
                UserDecision::Converged => {}
                UserDecision::NeedsCreate => drift.push(DriftReport {
                    resource_type: "user".to_string(),
                    name: desired.username.clone(),
                    kind: DriftKind::UserMissing,
                    message: format!("user does not exist in {}", desired.tenant),
                }),
                UserDecision::NeedsRecreate { mismatches, .. } => drift.push(DriftReport {
                    resource_type: "user".to_string(),
                    name: desired.username.clone(),
                    kind: DriftKind::UserMismatch,
                    message: mismatches
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; "),
                }),
            }
        }

        Ok(drift)
    }
}

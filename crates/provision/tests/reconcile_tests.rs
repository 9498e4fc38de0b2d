//! Reconciler behaviour against an in-memory identity service.

mod helpers;

use serde_json::{json, Map};
use std::time::Duration;

use helpers::fake_identity::FakeIdentity;
use helpers::fast_config;
use tenantseed::reconciler::{DriftKind, Reconciler};
use tenantseed::types::TenantStatus;
use tenantseed::verify::{pending_users, wait_for_convergence};
use tenantseed::{Catalog, IdentityApi, Manifest, ProvisionError};

fn tenant_a_catalog() -> Catalog {
    Catalog::from_yaml(
        r#"
tenants:
  - name: e2e-TenantA
users:
  - username: e2e-tenantA-admin
    email: e2e-tenanta-admin@example.test
    password: E2e-Passw0rd!
    first_name: TenantA
    last_name: Admin
    tenant: e2e-TenantA
    roles: [admin]
"#,
    )
    .unwrap()
}

#[tokio::test]
async fn empty_backend_gets_tenant_and_admin() {
    let api = FakeIdentity::new();
    let catalog = tenant_a_catalog();
    let mut manifest = Manifest::default();

    let report = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut manifest)
        .await
        .unwrap();

    let tenant = api.tenant_named("e2e-TenantA").expect("tenant created");
    assert_eq!(tenant.status, TenantStatus::Enabled);

    let members = api.list_users(Some(&tenant.id)).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].username, "e2e-tenantA-admin");
    assert_eq!(members[0].roles, vec!["admin"]);
    assert!(members[0].enabled);

    assert_eq!(report.tenants_created, vec!["e2e-TenantA"]);
    assert_eq!(report.users_created, vec!["e2e-tenantA-admin"]);
    assert_eq!(manifest.tenants, vec!["e2e-TenantA"]);
    assert_eq!(manifest.users, vec!["e2e-tenantA-admin"]);
}

#[tokio::test]
async fn second_run_issues_no_mutations() {
    let api = FakeIdentity::new();
    let catalog = Catalog::default();
    let reconciler = Reconciler::with_config(&api, &catalog, fast_config());

    reconciler.reconcile(&mut Manifest::default()).await.unwrap();
    let tenants_after_first = api.tenants().len();
    let users_after_first = api.users().len();
    api.reset_calls();

    let mut manifest = Manifest::default();
    let report = reconciler.reconcile(&mut manifest).await.unwrap();

    assert!(report.is_noop());
    assert!(api.mutating_calls().is_empty(), "{:?}", api.mutating_calls());
    assert_eq!(report.users_converged.len(), catalog.users.len());
    assert_eq!(api.tenants().len(), tenants_after_first);
    assert_eq!(api.users().len(), users_after_first);
    assert!(manifest.is_empty());
}

#[tokio::test]
async fn disabled_tenant_is_re_enabled_with_full_record() {
    let api = FakeIdentity::new();
    let mut extra = Map::new();
    extra.insert("plan".into(), json!("enterprise"));
    extra.insert("createdAt".into(), json!("2024-03-01T10:00:00Z"));
    let auth_config = json!({ "passwordLogin": true, "mfa": "required" });
    let id = api.seed_tenant_with(
        "e2e-TenantA",
        TenantStatus::Disabled,
        Some(auth_config.clone()),
        extra.clone(),
    );
    let catalog = tenant_a_catalog();
    let mut manifest = Manifest::default();

    let report = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut manifest)
        .await
        .unwrap();

    let tenant = api.tenant_named("e2e-TenantA").unwrap();
    assert_eq!(tenant.id, id);
    assert_eq!(tenant.name, "e2e-TenantA");
    assert_eq!(tenant.status, TenantStatus::Enabled);
    assert_eq!(tenant.auth_config, Some(auth_config));
    assert_eq!(tenant.extra, extra);

    assert_eq!(api.count_calls(&format!("GET /tenants/{id}")), 1);
    assert_eq!(api.count_calls("PUT /tenants"), 1);
    assert_eq!(api.count_calls("POST /tenants"), 0);
    assert_eq!(report.tenants_enabled, vec!["e2e-TenantA"]);
    assert!(manifest.tenants.is_empty(), "re-enabled tenants were not created");
}

#[tokio::test]
async fn user_in_wrong_tenant_is_recreated() {
    let api = FakeIdentity::new();
    let tenant_a = api.seed_tenant("e2e-TenantA", TenantStatus::Enabled);
    let tenant_b = api.seed_tenant("e2e-Other", TenantStatus::Enabled);
    let stale_id = api.seed_user("e2e-tenantA-admin", &tenant_b, &["admin"], true);
    let catalog = tenant_a_catalog();
    let mut manifest = Manifest::default();

    let report = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut manifest)
        .await
        .unwrap();

    let user = api.user_named("e2e-tenantA-admin").unwrap();
    assert_ne!(user.id, stale_id);
    assert_eq!(user.tenant_id.as_deref(), Some(tenant_a.as_str()));
    assert_eq!(api.users().len(), 1);
    assert_eq!(api.count_calls(&format!("DELETE /users/{stale_id}")), 1);
    assert_eq!(report.users_recreated, vec!["e2e-tenantA-admin"]);
    assert_eq!(manifest.users, vec!["e2e-tenantA-admin"]);
}

#[tokio::test]
async fn disabled_or_mis_roled_user_is_recreated() {
    let api = FakeIdentity::new();
    let tenant_a = api.seed_tenant("e2e-TenantA", TenantStatus::Enabled);
    api.seed_user("e2e-tenantA-admin", &tenant_a, &["admin", "user"], false);
    let catalog = tenant_a_catalog();

    Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut Manifest::default())
        .await
        .unwrap();

    let user = api.user_named("e2e-tenantA-admin").unwrap();
    assert!(user.enabled);
    assert_eq!(user.roles, vec!["admin"]);
}

#[tokio::test]
async fn role_case_differences_count_as_converged() {
    let api = FakeIdentity::new();
    let tenant_a = api.seed_tenant("E2E-TENANTA", TenantStatus::Enabled);
    api.seed_user("E2E-TenantA-Admin", &tenant_a, &["ADMIN"], true);
    let catalog = tenant_a_catalog();

    let report = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut Manifest::default())
        .await
        .unwrap();

    assert!(report.is_noop());
    assert!(api.mutating_calls().is_empty());
}

#[tokio::test]
async fn missing_tenant_fails_before_any_user_call() {
    let api = FakeIdentity::new();
    api.fail_tenant_create("e2e-TenantA");
    let catalog = tenant_a_catalog();

    let err = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut Manifest::default())
        .await
        .unwrap_err();

    match err {
        ProvisionError::MissingTenant { tenant, username } => {
            assert_eq!(tenant, "e2e-TenantA");
            assert_eq!(username, "e2e-tenantA-admin");
        }
        other => panic!("expected MissingTenant, got {other:?}"),
    }
    assert_eq!(api.count_calls("POST /users"), 0);
    assert_eq!(api.count_calls("DELETE /users"), 0);
}

#[tokio::test]
async fn transient_create_failures_are_retried() {
    let api = FakeIdentity::new();
    api.fail_user_creates("e2e-tenantA-admin", 2);
    let catalog = tenant_a_catalog();

    let report = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut Manifest::default())
        .await
        .unwrap();

    assert_eq!(api.count_calls("POST /users e2e-tenantA-admin"), 3);
    assert_eq!(report.users_created, vec!["e2e-tenantA-admin"]);
    assert!(api.user_named("e2e-tenantA-admin").is_some());
}

#[tokio::test]
async fn failed_create_that_landed_is_confirmed_by_relisting() {
    let api = FakeIdentity::new();
    api.phantom_user_create("e2e-tenantA-admin");
    let catalog = tenant_a_catalog();

    Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut Manifest::default())
        .await
        .unwrap();

    assert_eq!(api.count_calls("POST /users e2e-tenantA-admin"), 1);
    assert_eq!(api.users().len(), 1);
}

#[tokio::test]
async fn relisted_user_in_wrong_tenant_does_not_count_as_created() {
    let api = FakeIdentity::new();
    api.seed_tenant("e2e-TenantA", TenantStatus::Enabled);
    let other = api.seed_tenant("e2e-Other", TenantStatus::Enabled);
    let stale_id = api.seed_user("e2e-tenantA-admin", &other, &["admin"], true);
    api.linger_user_deletes();
    let catalog = tenant_a_catalog();
    let mut manifest = Manifest::default();

    let err = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut manifest)
        .await
        .unwrap_err();

    match &err {
        ProvisionError::CreateUser { attempts, .. } => assert_eq!(*attempts, 3),
        other => panic!("expected CreateUser, got {other:?}"),
    }
    assert_eq!(err.status(), Some(409));
    assert_eq!(api.count_calls("POST /users"), 3);

    let user = api.user_named("e2e-tenantA-admin").unwrap();
    assert_eq!(user.id, stale_id);
    assert_eq!(user.tenant_id.as_deref(), Some(other.as_str()));
    assert!(manifest.users.is_empty());
}

#[tokio::test]
async fn persistent_create_failure_surfaces_last_error() {
    let api = FakeIdentity::new();
    api.fail_user_creates("e2e-tenantA-admin", 10);
    let catalog = tenant_a_catalog();
    let mut manifest = Manifest::default();

    let err = Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut manifest)
        .await
        .unwrap_err();

    match &err {
        ProvisionError::CreateUser {
            username, attempts, ..
        } => {
            assert_eq!(username, "e2e-tenantA-admin");
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected CreateUser, got {other:?}"),
    }
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("identity provider busy"));
    assert_eq!(api.count_calls("POST /users"), 3);
    // The tenant was created before the failure and must still be recorded
    assert_eq!(manifest.tenants, vec!["e2e-TenantA"]);
}

#[tokio::test]
async fn users_converge_at_most_two_at_a_time() {
    let api = FakeIdentity::new().with_mutation_delay(Duration::from_millis(20));
    let catalog = Catalog::default();
    assert!(catalog.users.len() >= 4);

    Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut Manifest::default())
        .await
        .unwrap();

    assert_eq!(api.peak_in_flight(), 2);
    assert_eq!(api.users().len(), catalog.users.len());
}

#[tokio::test]
async fn plan_reports_drift_without_mutating() {
    let api = FakeIdentity::new();
    let tenant_b = api.seed_tenant("e2e-TenantB", TenantStatus::Disabled);
    api.seed_user("e2e-tenantB-admin", &tenant_b, &["user"], true);
    let catalog = Catalog::default();

    let drift = Reconciler::new(&api, &catalog).plan().await.unwrap();

    assert!(api.mutating_calls().is_empty());
    let kind_of = |name: &str| {
        drift
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.kind.clone())
    };
    assert_eq!(kind_of("e2e-TenantA"), Some(DriftKind::TenantMissing));
    assert_eq!(kind_of("e2e-TenantB"), Some(DriftKind::TenantDisabled));
    assert_eq!(kind_of("e2e-tenantA-admin"), Some(DriftKind::UserMissing));
    assert_eq!(kind_of("e2e-tenantB-admin"), Some(DriftKind::UserMismatch));
    let mismatch = drift.iter().find(|d| d.name == "e2e-tenantB-admin").unwrap();
    assert!(mismatch.message.contains("roles"));
}

#[tokio::test]
async fn verification_sees_every_user_after_reconcile() {
    let api = FakeIdentity::new();
    let catalog = Catalog::default();

    let before = pending_users(&api, &catalog).await.unwrap();
    assert_eq!(before.len(), catalog.users.len());

    Reconciler::with_config(&api, &catalog, fast_config())
        .reconcile(&mut Manifest::default())
        .await
        .unwrap();

    let report = wait_for_convergence(
        &api,
        &catalog,
        Duration::from_secs(1),
        Duration::from_millis(10),
    )
    .await
    .unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(report.verified_users, catalog.users.len());
}

#[tokio::test]
async fn verification_times_out_naming_pending_users() {
    let api = FakeIdentity::new();
    let catalog = tenant_a_catalog();

    let err = wait_for_convergence(
        &api,
        &catalog,
        Duration::from_millis(30),
        Duration::from_millis(10),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProvisionError::Timeout(_)));
    assert!(err.to_string().contains("e2e-tenantA-admin"));
}

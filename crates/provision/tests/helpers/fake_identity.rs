//! In-memory identity service for reconciler and teardown tests.
//!
//! Behaves like the real API for the endpoints the flow uses, records every
//! call, and can be told to fail specific operations.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use tenantseed::error::{ProvisionError, ProvisionResult};
use tenantseed::types::{NewTenant, NewUser, Tenant, TenantStatus, User};
use tenantseed::IdentityApi;

#[derive(Default)]
struct State {
    tenants: Vec<Tenant>,
    users: Vec<User>,
    calls: Vec<String>,
    /// username -> remaining create failures
    create_failures: HashMap<String, u32>,
    /// usernames whose failed create still stores the user
    phantom_creates: HashSet<String>,
    fail_tenant_create: HashSet<String>,
    fail_user_delete: HashSet<String>,
    fail_tenant_delete: HashSet<String>,
    /// user deletes succeed but the record stays listed
    linger_user_deletes: bool,
    in_flight: usize,
    peak_in_flight: usize,
}

pub struct FakeIdentity {
    state: Mutex<State>,
    mutation_delay: Duration,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            mutation_delay: Duration::ZERO,
        }
    }

    /// Hold every mutating call open for `delay` so overlap can be observed
    pub fn with_mutation_delay(mut self, delay: Duration) -> Self {
        self.mutation_delay = delay;
        self
    }

    fn next_id(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4())
    }

    // ── Seeding ──────────────────────────────────────────────────────

    pub fn seed_tenant(&self, name: &str, status: TenantStatus) -> String {
        self.seed_tenant_with(name, status, None, Map::new())
    }

    pub fn seed_tenant_with(
        &self,
        name: &str,
        status: TenantStatus,
        auth_config: Option<Value>,
        extra: Map<String, Value>,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id("tenant");
        state.tenants.push(Tenant {
            id: id.clone(),
            name: name.to_string(),
            status,
            auth_config,
            extra,
        });
        id
    }

    pub fn seed_user(&self, username: &str, tenant_id: &str, roles: &[&str], enabled: bool) -> String {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id("user");
        state.users.push(User {
            id: id.clone(),
            username: username.to_string(),
            email: format!("{username}@example.test"),
            first_name: String::new(),
            last_name: String::new(),
            enabled,
            tenant_id: Some(tenant_id.to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        });
        id
    }

    // ── Failure injection ────────────────────────────────────────────

    pub fn fail_user_creates(&self, username: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .create_failures
            .insert(username.to_lowercase(), times);
    }

    /// Create reports failure but the user is stored anyway
    pub fn phantom_user_create(&self, username: &str) {
        let mut state = self.state.lock().unwrap();
        state.create_failures.insert(username.to_lowercase(), 1);
        state.phantom_creates.insert(username.to_lowercase());
    }

    pub fn fail_tenant_create(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_tenant_create
            .insert(name.to_lowercase());
    }

    pub fn fail_user_delete(&self, id: &str) {
        self.state.lock().unwrap().fail_user_delete.insert(id.to_string());
    }

    /// Acknowledge user deletes without removing anything, like a backend
    /// whose listing lags behind its writes
    pub fn linger_user_deletes(&self) {
        self.state.lock().unwrap().linger_user_deletes = true;
    }

    pub fn fail_tenant_delete(&self, id: &str) {
        self.state.lock().unwrap().fail_tenant_delete.insert(id.to_string());
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn tenants(&self) -> Vec<Tenant> {
        self.state.lock().unwrap().tenants.clone()
    }

    pub fn users(&self) -> Vec<User> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn tenant_named(&self, name: &str) -> Option<Tenant> {
        self.tenants()
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn user_named(&self, username: &str) -> Option<User> {
        self.users()
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than GET
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("GET"))
            .collect()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.lock().unwrap().peak_in_flight
    }

    pub fn reset_calls(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.clear();
        state.peak_in_flight = 0;
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    async fn mutate<T>(&self, call: String, f: impl FnOnce(&mut State) -> T) -> T {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        }
        if !self.mutation_delay.is_zero() {
            tokio::time::sleep(self.mutation_delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        f(&mut state)
    }
}

fn not_found(method: &str, path: &str) -> ProvisionError {
    ProvisionError::api(method, path, 404, r#"{"error":"not found"}"#)
}

#[async_trait]
impl IdentityApi for FakeIdentity {
    async fn list_tenants(&self) -> ProvisionResult<Vec<Tenant>> {
        self.record("GET /tenants".to_string());
        Ok(self.tenants())
    }

    async fn get_tenant(&self, id: &str) -> ProvisionResult<Tenant> {
        self.record(format!("GET /tenants/{id}"));
        self.tenants()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("GET", &format!("/tenants/{id}")))
    }

    async fn create_tenant(&self, tenant: &NewTenant) -> ProvisionResult<Option<Tenant>> {
        let body = tenant.clone();
        self.mutate(format!("POST /tenants {}", tenant.name), move |state| {
            if state.fail_tenant_create.contains(&body.name.to_lowercase()) {
                return Err(ProvisionError::api("POST", "/tenants", 500, "tenant store unavailable"));
            }
            if state.tenants.iter().any(|t| t.name.eq_ignore_ascii_case(&body.name)) {
                return Err(ProvisionError::api("POST", "/tenants", 409, "duplicate tenant"));
            }
            let created = Tenant {
                id: FakeIdentity::next_id("tenant"),
                name: body.name,
                status: body.status,
                auth_config: body.auth_config,
                extra: Map::new(),
            };
            state.tenants.push(created.clone());
            Ok(Some(created))
        })
        .await
    }

    async fn update_tenant(&self, tenant: &Tenant) -> ProvisionResult<()> {
        let body = tenant.clone();
        self.mutate(format!("PUT /tenants {}", tenant.name), move |state| {
            match state.tenants.iter_mut().find(|t| t.id == body.id) {
                Some(existing) => {
                    *existing = body;
                    Ok(())
                }
                None => Err(not_found("PUT", "/tenants")),
            }
        })
        .await
    }

    async fn delete_tenant(&self, id: &str) -> ProvisionResult<()> {
        let id = id.to_string();
        self.mutate(format!("DELETE /tenants/{id}"), move |state| {
            if state.fail_tenant_delete.contains(&id) {
                return Err(ProvisionError::api("DELETE", &format!("/tenants/{id}"), 500, "locked"));
            }
            let before = state.tenants.len();
            state.tenants.retain(|t| t.id != id);
            if state.tenants.len() == before {
                Err(not_found("DELETE", &format!("/tenants/{id}")))
            } else {
                Ok(())
            }
        })
        .await
    }

    async fn list_users(&self, tenant_id: Option<&str>) -> ProvisionResult<Vec<User>> {
        match tenant_id {
            Some(tid) => {
                self.record(format!("GET /users?tenantId={tid}"));
                Ok(self
                    .users()
                    .into_iter()
                    .filter(|u| u.tenant_id.as_deref() == Some(tid))
                    .collect())
            }
            None => {
                self.record("GET /users".to_string());
                Ok(self.users())
            }
        }
    }

    async fn create_user(&self, user: &NewUser) -> ProvisionResult<Option<User>> {
        let body = user.clone();
        self.mutate(format!("POST /users {}", user.username), move |state| {
            let key = body.username.to_lowercase();
            let phantom = state.phantom_creates.contains(&key);
            if let Some(remaining) = state.create_failures.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    if !phantom {
                        return Err(ProvisionError::api("POST", "/users", 503, "identity provider busy"));
                    }
                }
            }
            if state.users.iter().any(|u| u.username.eq_ignore_ascii_case(&body.username)) {
                return Err(ProvisionError::api("POST", "/users", 409, "username taken"));
            }
            let created = User {
                id: FakeIdentity::next_id("user"),
                username: body.username,
                email: body.email,
                first_name: body.first_name,
                last_name: body.last_name,
                enabled: body.enabled,
                tenant_id: Some(body.tenant_id),
                roles: body.roles,
            };
            state.users.push(created.clone());
            if phantom {
                state.phantom_creates.remove(&key);
                return Err(ProvisionError::api("POST", "/users", 504, "gateway timeout"));
            }
            Ok(Some(created))
        })
        .await
    }

    async fn delete_user(&self, id: &str) -> ProvisionResult<()> {
        let id = id.to_string();
        self.mutate(format!("DELETE /users/{id}"), move |state| {
            if state.fail_user_delete.contains(&id) {
                return Err(ProvisionError::api("DELETE", &format!("/users/{id}"), 500, "locked"));
            }
            if state.linger_user_deletes && state.users.iter().any(|u| u.id == id) {
                return Ok(());
            }
            let before = state.users.len();
            state.users.retain(|u| u.id != id);
            if state.users.len() == before {
                Err(not_found("DELETE", &format!("/users/{id}")))
            } else {
                Ok(())
            }
        })
        .await
    }
}

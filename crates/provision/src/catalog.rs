//! Desired-state catalog: the tenants and users an E2E environment needs.
//!
//! The built-in catalog covers the fixtures the browser suites log in with.
//! A YAML file with the same shape can replace it:
//!
//! ```yaml
//! tenants:
//!   - name: e2e-TenantA
//! users:
//!   - username: e2e-tenantA-admin
//!     email: e2e-tenanta-admin@example.test
//!     password: E2e-Passw0rd!
//!     first_name: TenantA
//!     last_name: Admin
//!     tenant: e2e-TenantA
//!     roles: [admin]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ProvisionError, ProvisionResult};
use crate::index::{name_key, same_name};
use crate::types::{normalize_roles, NewUser};

/// A tenant that must exist and be enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredTenant {
    pub name: String,

    /// Passed through verbatim on creation
    #[serde(default)]
    pub auth_config: Option<serde_json::Value>,
}

/// A user that must exist, enabled, under `tenant` with exactly `roles`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Tenant display name, resolved to an id during reconciliation
    pub tenant: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl std::fmt::Debug for DesiredUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesiredUser")
            .field("username", &self.username)
            .field("tenant", &self.tenant)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

impl DesiredUser {
    pub fn role_set(&self) -> Vec<String> {
        normalize_roles(&self.roles)
    }

    /// Creation payload for this user under a resolved tenant id
    pub fn to_new_user(&self, tenant_id: &str) -> NewUser {
        NewUser {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            password: self.password.clone(),
            enabled: true,
            tenant_id: tenant_id.to_string(),
            roles: self.roles.clone(),
        }
    }
}

/// Immutable desired state handed to the reconciler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tenants: Vec<DesiredTenant>,
    #[serde(default)]
    pub users: Vec<DesiredUser>,
}

const DEFAULT_PASSWORD: &str = "E2e-Passw0rd!";

fn user(username: &str, tenant: &str, first: &str, last: &str, roles: &[&str]) -> DesiredUser {
    DesiredUser {
        username: username.to_string(),
        email: format!("{}@example.test", username.to_lowercase()),
        password: DEFAULT_PASSWORD.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        tenant: tenant.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let tenant = |name: &str| DesiredTenant {
            name: name.to_string(),
            auth_config: None,
        };
        Self {
            tenants: vec![tenant("e2e-TenantA"), tenant("e2e-TenantB")],
            users: vec![
                user("e2e-tenantA-admin", "e2e-TenantA", "TenantA", "Admin", &["admin"]),
                user("e2e-tenantA-user", "e2e-TenantA", "TenantA", "User", &["user"]),
                user("e2e-tenantB-admin", "e2e-TenantB", "TenantB", "Admin", &["admin"]),
                user(
                    "e2e-tenantB-editor",
                    "e2e-TenantB",
                    "TenantB",
                    "Editor",
                    &["user", "editor"],
                ),
            ],
        }
    }
}

impl Catalog {
    /// Parse a catalog from YAML and validate it
    pub fn from_yaml(yaml: &str) -> ProvisionResult<Self> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> ProvisionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Names must be unique (case-insensitively) and every user's tenant
    /// must be declared.
    pub fn validate(&self) -> ProvisionResult<()> {
        let mut tenants = HashSet::new();
        for t in &self.tenants {
            if t.name.trim().is_empty() {
                return Err(ProvisionError::Catalog("tenant with empty name".into()));
            }
            if !tenants.insert(name_key(&t.name)) {
                return Err(ProvisionError::Catalog(format!("duplicate tenant '{}'", t.name)));
            }
        }

        let mut users = HashSet::new();
        for u in &self.users {
            if u.username.trim().is_empty() {
                return Err(ProvisionError::Catalog("user with empty username".into()));
            }
            if !users.insert(name_key(&u.username)) {
                return Err(ProvisionError::Catalog(format!("duplicate user '{}'", u.username)));
            }
            if !tenants.contains(&name_key(&u.tenant)) {
                return Err(ProvisionError::Catalog(format!(
                    "user '{}' references undeclared tenant '{}'",
                    u.username, u.tenant
                )));
            }
        }
        Ok(())
    }

    pub fn tenant(&self, name: &str) -> Option<&DesiredTenant> {
        self.tenants.iter().find(|t| same_name(&t.name, name))
    }

    /// Users belonging to `tenant`
    pub fn users_in<'a>(&'a self, tenant: &'a str) -> impl Iterator<Item = &'a DesiredUser> + 'a {
        self.users
            .iter()
            .filter(move |u| same_name(&u.tenant, tenant))
    }
}

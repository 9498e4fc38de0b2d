//! Identity API resource types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tenant lifecycle status as reported by the identity API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TenantStatus {
    #[serde(alias = "enabled", alias = "ENABLED")]
    Enabled,
    #[serde(alias = "disabled", alias = "DISABLED")]
    Disabled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Enabled => "Enabled",
            TenantStatus::Disabled => "Disabled",
            TenantStatus::Unknown => "Unknown",
        }
    }
}

/// A tenant record.
///
/// Fields the reconciler does not interpret are kept in `extra` so that a
/// full-record `PUT /tenants` re-sends them unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: TenantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tenant {
    pub fn is_enabled(&self) -> bool {
        self.status == TenantStatus::Enabled
    }
}

/// Body of `POST /tenants`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub name: String,
    pub status: TenantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<Value>,
}

/// A user record as listed by `GET /users`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// Roles lowercased, sorted and deduplicated
    pub fn role_set(&self) -> Vec<String> {
        normalize_roles(&self.roles)
    }
}

/// Body of `POST /users`. Carries the password, so `Debug` redacts it.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub enabled: bool,
    pub tenant_id: String,
    pub roles: Vec<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .field("tenant_id", &self.tenant_id)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Lowercase, sort and dedupe a role list for comparison
pub fn normalize_roles(roles: &[String]) -> Vec<String> {
    let mut out: Vec<String> = roles.iter().map(|r| r.trim().to_lowercase()).collect();
    out.sort();
    out.dedup();
    out
}

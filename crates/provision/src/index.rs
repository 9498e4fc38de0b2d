//! Case-insensitive lookup tables over listed tenants and users

use std::collections::HashMap;

use crate::types::{Tenant, User};

/// Comparison key for tenant names and usernames: trimmed, lowercased
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// True when two names refer to the same tenant or user
pub fn same_name(a: &str, b: &str) -> bool {
    name_key(a) == name_key(b)
}

/// Tenants keyed by lowercased name
#[derive(Debug, Clone, Default)]
pub struct TenantIndex {
    by_name: HashMap<String, Tenant>,
}

impl TenantIndex {
    pub fn build(tenants: Vec<Tenant>) -> Self {
        let by_name = tenants.into_iter().map(|t| (name_key(&t.name), t)).collect();
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&Tenant> {
        self.by_name.get(&name_key(name))
    }

    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|t| t.id.as_str())
    }

    pub fn insert(&mut self, tenant: Tenant) {
        self.by_name.insert(name_key(&tenant.name), tenant);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Users keyed by lowercased username
#[derive(Debug, Clone, Default)]
pub struct UserIndex {
    by_username: HashMap<String, User>,
}

impl UserIndex {
    pub fn build(users: Vec<User>) -> Self {
        let by_username = users.into_iter().map(|u| (name_key(&u.username), u)).collect();
        Self { by_username }
    }

    pub fn get(&self, username: &str) -> Option<&User> {
        self.by_username.get(&name_key(username))
    }

    pub fn remove(&mut self, username: &str) -> Option<User> {
        self.by_username.remove(&name_key(username))
    }

    pub fn insert(&mut self, user: User) {
        self.by_username.insert(name_key(&user.username), user);
    }

    pub fn len(&self) -> usize {
        self.by_username.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty()
    }
}

//! Record of the tenants and users a provisioning run created.
//!
//! Written after provisioning, read by the teardown sweep, deleted once the
//! sweep has run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ProvisionError, ProvisionResult};
use crate::index::same_name;

/// Default manifest location, relative to the working directory
pub fn default_manifest_path() -> PathBuf {
    PathBuf::from(".auth").join("e2e-state.json")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub tenants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| same_name(n, name)) {
        list.push(name.to_string());
    }
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.tenants.is_empty()
    }

    pub fn record_tenant(&mut self, name: &str) {
        push_unique(&mut self.tenants, name);
    }

    pub fn record_user(&mut self, username: &str) {
        push_unique(&mut self.users, username);
    }

    /// Union `other` into `self`, keeping the earliest timestamp
    pub fn merge(&mut self, other: &Manifest) {
        for t in &other.tenants {
            self.record_tenant(t);
        }
        for u in &other.users {
            self.record_user(u);
        }
        self.created_at = match (self.created_at, other.created_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    /// Read the manifest at `path`.
    ///
    /// `Ok(None)` when the file does not exist; a file that exists but
    /// cannot be read or parsed is a [`ProvisionError::Manifest`].
    pub fn load(path: &Path) -> ProvisionResult<Option<Self>> {
        if !path.exists() {
            debug!("No manifest at {}", path.display());
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Manifest(format!("cannot read {}: {e}", path.display()))
        })?;
        let manifest = serde_json::from_str(&content).map_err(|e| {
            ProvisionError::Manifest(format!("cannot parse {}: {e}", path.display()))
        })?;
        Ok(Some(manifest))
    }

    pub fn save(&self, path: &Path) -> ProvisionResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(
            "Manifest written to {} ({} tenant(s), {} user(s))",
            path.display(),
            self.tenants.len(),
            self.users.len()
        );
        Ok(())
    }

    /// Merge `self` into whatever is already recorded at `path` and save.
    ///
    /// An unparseable existing file is replaced.
    pub fn save_merged(&self, path: &Path) -> ProvisionResult<Manifest> {
        let mut merged = match Self::load(path) {
            Ok(Some(existing)) => existing,
            Ok(None) => Manifest::default(),
            Err(e) => {
                tracing::warn!("Replacing unreadable manifest: {}", e);
                Manifest::default()
            }
        };
        merged.merge(self);
        if merged.created_at.is_none() {
            merged.created_at = Some(Utc::now());
        }
        merged.save(path)?;
        Ok(merged)
    }

    /// Delete the manifest file if present
    pub fn remove(path: &Path) -> ProvisionResult<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!("Removed manifest {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

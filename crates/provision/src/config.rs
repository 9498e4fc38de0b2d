//! Provisioning configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML
//! file, environment variables. The CLI applies its flags on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Credentials;
use crate::error::{ProvisionError, ProvisionResult};
use crate::manifest::default_manifest_path;
use crate::reconciler::ReconcilerConfig;
use crate::retry::RetryPolicy;

/// Environment variable names
pub mod env {
    pub const CONFIG_FILE: &str = "TENANTSEED_CONFIG";
    pub const IDENTITY_API_URL: &str = "IDENTITY_API_URL";
    pub const QUESTIONER_API_URL: &str = "QUESTIONER_API_URL";
    pub const ONLINE_MENU_API_URL: &str = "ONLINE_MENU_API_URL";
    pub const NOTIFICATIONS_API_URL: &str = "NOTIFICATIONS_API_URL";
    pub const ADMIN_USERNAME: &str = "E2E_ADMIN_USERNAME";
    pub const ADMIN_PASSWORD: &str = "E2E_ADMIN_PASSWORD";
    pub const STATE_FILE: &str = "E2E_STATE_FILE";
    pub const CATALOG_FILE: &str = "E2E_CATALOG_FILE";
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Where the manifest of created entities is kept
    pub manifest_path: PathBuf,

    /// YAML catalog replacing the built-in one
    pub catalog_path: Option<PathBuf>,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Base URLs of the backing services
    pub services: ServiceUrls,

    /// Privileged account used for provisioning and teardown
    pub credentials: Option<Credentials>,

    pub reconcile: ReconcileSettings,

    pub teardown: TeardownSettings,

    pub verify: VerifySettings,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            catalog_path: None,
            request_timeout_secs: 30,
            services: ServiceUrls::default(),
            credentials: None,
            reconcile: ReconcileSettings::default(),
            teardown: TeardownSettings::default(),
            verify: VerifySettings::default(),
        }
    }
}

/// Base URLs of the platform services under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceUrls {
    pub identity: String,
    pub questioner: Option<String>,
    pub online_menu: Option<String>,
    pub notifications: Option<String>,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            identity: "http://localhost:8080".to_string(),
            questioner: None,
            online_menu: None,
            notifications: None,
        }
    }
}

impl ServiceUrls {
    /// (name, url) for every configured service
    pub fn configured(&self) -> Vec<(&'static str, &str)> {
        let mut out = vec![("identity", self.identity.as_str())];
        let optional = [
            ("questioner", &self.questioner),
            ("online_menu", &self.online_menu),
            ("notifications", &self.notifications),
        ];
        for (name, url) in optional {
            if let Some(url) = url {
                out.push((name, url.as_str()));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub user_concurrency: usize,
    pub create_attempts: u32,
    pub create_backoff_ms: u64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            user_concurrency: 2,
            create_attempts: 3,
            create_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeardownSettings {
    pub user_concurrency: usize,
    pub tenant_concurrency: usize,
}

impl Default for TeardownSettings {
    fn default() -> Self {
        Self {
            user_concurrency: 4,
            tenant_concurrency: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            poll_interval_ms: 500,
        }
    }
}

impl VerifySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ProvisionConfig {
    /// Load from a TOML file. A named file that does not exist is an
    /// error; callers without a file start from `default()`.
    pub fn load(path: &Path) -> ProvisionResult<Self> {
        if !path.is_file() {
            return Err(ProvisionError::InvalidConfig(format!(
                "config file {} not found",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Defaults, then `$TENANTSEED_CONFIG` if set, then the environment
    pub fn from_env() -> ProvisionResult<Self> {
        let mut config = match std::env::var(env::CONFIG_FILE) {
            Ok(path) if !path.is_empty() => Self::load(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(env::IDENTITY_API_URL) {
            self.services.identity = url;
        }
        if let Some(url) = get(env::QUESTIONER_API_URL) {
            self.services.questioner = Some(url);
        }
        if let Some(url) = get(env::ONLINE_MENU_API_URL) {
            self.services.online_menu = Some(url);
        }
        if let Some(url) = get(env::NOTIFICATIONS_API_URL) {
            self.services.notifications = Some(url);
        }
        if let Some(path) = get(env::STATE_FILE) {
            self.manifest_path = PathBuf::from(path);
        }
        if let Some(path) = get(env::CATALOG_FILE) {
            self.catalog_path = Some(PathBuf::from(path));
        }

        match (get(env::ADMIN_USERNAME), get(env::ADMIN_PASSWORD)) {
            (Some(username), Some(password)) => {
                self.credentials = Some(Credentials::new(username, password));
            }
            (Some(username), None) => {
                if let Some(creds) = self.credentials.as_mut() {
                    creds.username = username;
                }
            }
            (None, Some(password)) => {
                if let Some(creds) = self.credentials.as_mut() {
                    creds.password = password;
                }
            }
            (None, None) => {}
        }
    }

    pub fn validate(&self) -> ProvisionResult<()> {
        let identity = self.services.identity.trim();
        if !(identity.starts_with("http://") || identity.starts_with("https://")) {
            return Err(ProvisionError::InvalidConfig(format!(
                "identity API URL must be http(s), got '{identity}'"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ProvisionError::InvalidConfig(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.reconcile.user_concurrency == 0
            || self.teardown.user_concurrency == 0
            || self.teardown.tenant_concurrency == 0
        {
            return Err(ProvisionError::InvalidConfig(
                "concurrency settings must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Credentials, or `InvalidConfig` naming the variables to set
    pub fn require_credentials(&self) -> ProvisionResult<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            ProvisionError::InvalidConfig(format!(
                "no provisioning credentials; set {} and {}",
                env::ADMIN_USERNAME,
                env::ADMIN_PASSWORD
            ))
        })
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            user_concurrency: self.reconcile.user_concurrency,
            create_retry: RetryPolicy::new(
                self.reconcile.create_attempts,
                Duration::from_millis(self.reconcile.create_backoff_ms),
            ),
        }
    }

    /// Save as TOML
    pub fn save(&self, path: &Path) -> ProvisionResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProvisionError::InvalidConfig(format!("cannot encode config: {e}")))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

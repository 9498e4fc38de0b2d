//! Error types for provisioning and teardown

use thiserror::Error;

/// Longest response body kept in an error message.
pub const MAX_BODY_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Not authenticated: call login() first")]
    Unauthenticated,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{method} {path} returned {status}: {body}")]
    Api {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Tenant '{tenant}' for user '{username}' does not exist; tenant reconciliation did not complete")]
    MissingTenant { tenant: String, username: String },

    #[error("User '{username}' could not be confirmed after {attempts} attempt(s): {last_error}")]
    CreateUser {
        username: String,
        attempts: u32,
        last_error: Box<ProvisionError>,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProvisionError {
    /// HTTP status code if this error came from an API response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProvisionError::Api { status, .. } => Some(*status),
            ProvisionError::CreateUser { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Build an [`ProvisionError::Api`] with the body cut to [`MAX_BODY_CHARS`].
    pub fn api(method: &str, path: &str, status: u16, body: &str) -> Self {
        ProvisionError::Api {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: truncate_body(body),
        }
    }
}

/// Cut a response body down to [`MAX_BODY_CHARS`] characters.
pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

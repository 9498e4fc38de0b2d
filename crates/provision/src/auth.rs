//! Credential login against the identity API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ProvisionError, ProvisionResult};

/// Path of the login endpoint relative to the identity base URL
pub const LOGIN_PATH: &str = "/auth/login";

/// Username/password pair for the privileged provisioning account.
///
/// `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(alias = "access_token", alias = "token")]
    access_token: Option<String>,
}

/// Holds the access token obtained by [`Authenticator::login`].
///
/// The token lives as long as the helper; there is no refresh.
#[derive(Debug, Clone)]
pub struct Authenticator {
    base_url: String,
    http_client: Client,
    access_token: Option<String>,
}

impl Authenticator {
    pub fn new(base_url: &str, timeout: Duration) -> ProvisionResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tenantseed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProvisionError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(base_url, http_client))
    }

    /// Build with a pre-configured `reqwest::Client` (tests, shared pools)
    pub fn with_http_client(base_url: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            access_token: None,
        }
    }

    /// Log in and cache the access token
    pub async fn login(&mut self, credentials: &Credentials) -> ProvisionResult<()> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        debug!("Logging in as {} at {}", credentials.username, url);

        let response = self
            .http_client
            .post(&url)
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| ProvisionError::Auth(format!("Login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Auth(
                ProvisionError::api("POST", LOGIN_PATH, status.as_u16(), &body).to_string(),
            ));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ProvisionError::Auth(format!("Failed to parse login response: {e}")))?;

        match body.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                info!("Authenticated as {}", credentials.username);
                self.access_token = Some(token);
                Ok(())
            }
            None => Err(ProvisionError::Auth(
                "Login response carried no access token".to_string(),
            )),
        }
    }

    /// The cached access token; `Unauthenticated` before a successful login
    pub fn token(&self) -> ProvisionResult<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ProvisionError::Unauthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_ok()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.http_client
    }
}

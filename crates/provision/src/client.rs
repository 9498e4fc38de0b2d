//! Identity API HTTP client (reqwest-based).
//!
//! [`IdentityApi`] is the seam the reconciler and teardown sweep are written
//! against; [`IdentityClient`] is the bearer-authenticated implementation.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::auth::{Authenticator, Credentials};
use crate::error::{ProvisionError, ProvisionResult};
use crate::types::{NewTenant, NewUser, Tenant, User};

/// Operations the provisioning flow needs from the identity service
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// `GET /tenants`
    async fn list_tenants(&self) -> ProvisionResult<Vec<Tenant>>;

    /// `GET /tenants/{id}`
    async fn get_tenant(&self, id: &str) -> ProvisionResult<Tenant>;

    /// `POST /tenants`. `None` when the server answers without a body.
    async fn create_tenant(&self, tenant: &NewTenant) -> ProvisionResult<Option<Tenant>>;

    /// `PUT /tenants` with the full record
    async fn update_tenant(&self, tenant: &Tenant) -> ProvisionResult<()>;

    /// `DELETE /tenants/{id}`
    async fn delete_tenant(&self, id: &str) -> ProvisionResult<()>;

    /// `GET /users`, optionally `?tenantId=`
    async fn list_users(&self, tenant_id: Option<&str>) -> ProvisionResult<Vec<User>>;

    /// `POST /users`. `None` when the server answers without a body.
    async fn create_user(&self, user: &NewUser) -> ProvisionResult<Option<User>>;

    /// `DELETE /users/{id}`
    async fn delete_user(&self, id: &str) -> ProvisionResult<()>;
}

/// List endpoints answer either with a bare array or a wrapper object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "users", alias = "tenants", alias = "results")]
        items: Vec<T>,
    },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) | ListBody::Wrapped { items } => items,
        }
    }
}

/// Bearer-authenticated client bound to the identity base URL
#[derive(Debug, Clone)]
pub struct IdentityClient {
    base_url: String,
    token: String,
    http_client: Client,
}

impl IdentityClient {
    /// Build from a logged-in [`Authenticator`], sharing its connection pool
    pub fn from_auth(auth: &Authenticator) -> ProvisionResult<Self> {
        Ok(Self {
            base_url: auth.base_url().to_string(),
            token: auth.token()?.to_string(),
            http_client: auth.http_client().clone(),
        })
    }

    /// Log in with `credentials` and return a client carrying the token
    pub async fn login(
        base_url: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> ProvisionResult<Self> {
        let mut auth = Authenticator::new(base_url, timeout)?;
        auth.login(credentials).await?;
        Self::from_auth(&auth)
    }

    /// Build from parts (tests, pre-issued tokens)
    pub fn with_http_client(base_url: &str, token: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a request. Only `send_json` attaches a body, so GET and DELETE
    /// go out without a `Content-Type` header.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        self.http_client
            .request(method, url)
            .bearer_auth(&self.token)
    }

    async fn send(&self, method: Method, path: &str) -> ProvisionResult<Response> {
        let response = self.request(method.clone(), path).send().await?;
        check_status(method.as_str(), path, response).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ProvisionResult<Response> {
        let response = self.request(method.clone(), path).json(body).send().await?;
        check_status(method.as_str(), path, response).await
    }

    /// GET a listing; `query` pairs are percent-encoded onto the URL
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ProvisionResult<Vec<T>> {
        let mut request = self.request(Method::GET, path);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = check_status("GET", path, request.send().await?).await?;
        let body: ListBody<T> = response.json().await?;
        Ok(body.into_vec())
    }
}

/// Turn a non-2xx response into [`ProvisionError::Api`] with a truncated body
async fn check_status(method: &str, path: &str, response: Response) -> ProvisionResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(ProvisionError::api(method, path, status.as_u16(), &body))
}

/// Parse an optional JSON body; empty or non-JSON bodies yield `None`
async fn optional_body<T: DeserializeOwned>(response: Response) -> ProvisionResult<Option<T>> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(serde_json::from_slice(&bytes).ok())
}

#[async_trait]
impl IdentityApi for IdentityClient {
    async fn list_tenants(&self) -> ProvisionResult<Vec<Tenant>> {
        self.get_list("/tenants", &[]).await
    }

    async fn get_tenant(&self, id: &str) -> ProvisionResult<Tenant> {
        let response = self.send(Method::GET, &format!("/tenants/{id}")).await?;
        Ok(response.json().await?)
    }

    async fn create_tenant(&self, tenant: &NewTenant) -> ProvisionResult<Option<Tenant>> {
        let response = self.send_json(Method::POST, "/tenants", tenant).await?;
        optional_body(response).await
    }

    async fn update_tenant(&self, tenant: &Tenant) -> ProvisionResult<()> {
        self.send_json(Method::PUT, "/tenants", tenant).await?;
        Ok(())
    }

    async fn delete_tenant(&self, id: &str) -> ProvisionResult<()> {
        self.send(Method::DELETE, &format!("/tenants/{id}")).await?;
        Ok(())
    }

    async fn list_users(&self, tenant_id: Option<&str>) -> ProvisionResult<Vec<User>> {
        match tenant_id {
            Some(id) => self.get_list("/users", &[("tenantId", id)]).await,
            None => self.get_list("/users", &[]).await,
        }
    }

    async fn create_user(&self, user: &NewUser) -> ProvisionResult<Option<User>> {
        let response = self.send_json(Method::POST, "/users", user).await?;
        optional_body(response).await
    }

    async fn delete_user(&self, id: &str) -> ProvisionResult<()> {
        self.send(Method::DELETE, &format!("/users/{id}")).await?;
        Ok(())
    }
}

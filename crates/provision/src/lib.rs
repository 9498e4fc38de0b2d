//! tenantseed: E2E fixture provisioning for a multi-tenant platform
//!
//! Seeds the tenants and users a browser test suite logs in with, records
//! what it created, and removes those entities again afterwards.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tenantseed (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  provision::run(config, catalog)                            │
//! │    ├── IdentityClient::login() -> bearer token              │
//! │    ├── Reconciler::reconcile()                              │
//! │    │     ├── tenants: create missing, re-enable disabled    │
//! │    │     └── users:   decide_user() -> Converged |          │
//! │    │                  NeedsCreate | NeedsRecreate           │
//! │    ├── Manifest::save_merged()                              │
//! │    └── verify::wait_for_convergence()                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  teardown::run(config)                                      │
//! │    ├── Manifest::load()  (absent -> no-op)                  │
//! │    ├── delete users   (batches of 4, failures logged)       │
//! │    ├── delete tenants (batches of 3, failures logged)       │
//! │    └── Manifest::remove()                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod batch;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod manifest;
pub mod provision;
pub mod reconciler;
pub mod retry;
pub mod teardown;
pub mod types;
pub mod verify;

pub use auth::{Authenticator, Credentials};
pub use catalog::{Catalog, DesiredTenant, DesiredUser};
pub use client::{IdentityApi, IdentityClient};
pub use config::ProvisionConfig;
pub use error::{ProvisionError, ProvisionResult};
pub use manifest::Manifest;
pub use reconciler::{decide_user, Reconciler, ReconcileReport, UserDecision};
pub use teardown::TeardownReport;

//! tenantseed CLI
//!
//! Command-line front end for provisioning and tearing down the tenants
//! and users an end-to-end test suite runs against.

pub mod commands;
pub mod output;

//! CLI Commands

pub mod config;
pub mod plan;
pub mod provision;
pub mod teardown;
pub mod verify;

use serde::Serialize;
use tenantseed::reconciler::EntityFailure;

use crate::output::TableDisplay;

/// One line of a provisioning or teardown summary
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRow {
    pub resource_type: String,
    pub name: String,
    pub action: String,
}

impl ChangeRow {
    pub fn new(resource_type: &str, name: &str, action: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            action: action.to_string(),
        }
    }

    pub fn many<'a>(
        resource_type: &'a str,
        names: &'a [String],
        action: &'a str,
    ) -> impl Iterator<Item = ChangeRow> + 'a {
        names
            .iter()
            .map(move |name| ChangeRow::new(resource_type, name, action))
    }

    pub fn failed(failure: &EntityFailure) -> Self {
        Self::new(
            &failure.resource_type,
            &failure.name,
            &format!("failed: {}", failure.error),
        )
    }
}

impl TableDisplay for ChangeRow {
    fn headers() -> Vec<&'static str> {
        vec!["Type", "Name", "Action"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.resource_type.clone(),
            self.name.clone(),
            self.action.clone(),
        ]
    }
}

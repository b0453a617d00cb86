//! Built-in workflows and the inputs each one needs.

use crate::error::Result;
use crate::history::NewHistoryEntry;
use crate::invoker::ActionArgs;
use crate::output::BatchReport;
use crate::settings::WorkflowNames;
use crate::utils::validation;

pub const DEFAULT_JDK_VERSION: &str = "corretto11";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Build a new machine image for each selected service.
    CreateImage,
    /// Promote an existing image of one service to an environment.
    PromoteImage,
}

impl WorkflowKind {
    /// Label used for history entries.
    pub fn category(&self) -> &'static str {
        match self {
            WorkflowKind::CreateImage => "create-ami",
            WorkflowKind::PromoteImage => "promotion-ami",
        }
    }

    pub fn action_name<'a>(&self, names: &'a WorkflowNames) -> &'a str {
        match self {
            WorkflowKind::CreateImage => &names.create_image,
            WorkflowKind::PromoteImage => &names.promote_image,
        }
    }
}

/// Validated request to build images for several services.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateImageRequest {
    pub jdk_version: String,
    pub services: Vec<String>,
    pub version: String,
}

impl CreateImageRequest {
    pub fn new(jdk_version: &str, services: &[String], version: &str) -> Result<Self> {
        let version = validation::require_non_empty(version, "version", "Version is required")?;
        validation::require_non_empty_vec(services, "services", "Select at least one service")?;
        validation::require_no_blank_entries(services, "services")?;

        let jdk_version = match jdk_version.trim() {
            "" => DEFAULT_JDK_VERSION,
            other => other,
        };

        Ok(Self {
            jdk_version: jdk_version.to_string(),
            services: services.iter().map(|s| s.trim().to_string()).collect(),
            version: version.to_string(),
        })
    }

    /// Inputs shared by every service in the batch.
    pub fn shared_args(&self) -> ActionArgs {
        ActionArgs::new()
            .with("jdk_version", self.jdk_version.as_str())
            .with("version", self.version.as_str())
    }

    pub fn history_entry(&self, report: &BatchReport) -> NewHistoryEntry {
        NewHistoryEntry {
            category: WorkflowKind::CreateImage.category().to_string(),
            jdk_version: Some(self.jdk_version.clone()),
            environment: None,
            services: self.services.clone(),
            version: Some(self.version.clone()),
            succeeded: report.succeeded,
            failed: report.failed,
            total: report.total,
        }
    }
}

/// Validated request to promote one service's image.
#[derive(Debug, Clone, PartialEq)]
pub struct PromoteImageRequest {
    pub environment: String,
    pub service: String,
    pub version: String,
}

impl PromoteImageRequest {
    pub fn new(environment: &str, service: &str, version: &str) -> Result<Self> {
        let environment =
            validation::require_non_empty(environment, "environment", "Environment is required")?;
        let service = validation::require_non_empty(service, "service", "Select a service")?;
        let version = validation::require_non_empty(version, "version", "Version is required")?;

        Ok(Self {
            environment: environment.to_string(),
            service: service.to_string(),
            version: version.to_string(),
        })
    }

    pub fn shared_args(&self) -> ActionArgs {
        ActionArgs::new()
            .with("environment", self.environment.as_str())
            .with("version", self.version.as_str())
    }

    pub fn history_entry(&self, success: bool) -> NewHistoryEntry {
        NewHistoryEntry {
            category: WorkflowKind::PromoteImage.category().to_string(),
            jdk_version: None,
            environment: Some(self.environment.clone()),
            services: vec![self.service.clone()],
            version: Some(self.version.clone()),
            succeeded: usize::from(success),
            failed: usize::from(!success),
            total: 1,
        }
    }
}

//! Provisioning pipeline: policy declarations in, execution role out.
//!
//! [`provision`] declares the role for a deployment, refuses to continue if
//! the declarations fail the least-privilege lint, and hands the role to a
//! [`Provisioner`]. [`Template`] renders the same role as CloudFormation.

pub mod iam;
pub mod template;

use std::sync::Arc;

use async_trait::async_trait;
use foodclaw_policy::{lint, DeploymentParams, ExecutionRole};
use foodclaw_security::{AuditEvent, AuditLogger, AuditOutcome};
use serde::Serialize;
use tracing::{error, info};

pub use iam::{IamProvisioner, IamTransport, QueryApiTransport};
pub use template::Template;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProvisionError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("resource conflict: {0}")]
    Conflict(String),

    #[error("IAM API error {code} (status {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("policy serialization failed: {0}")]
    Serialization(String),

    #[error("declarations rejected: {0}")]
    InvalidDeclarations(String),
}

impl From<serde_json::Error> for ProvisionError {
    fn from(e: serde_json::Error) -> Self {
        ProvisionError::Serialization(e.to_string())
    }
}

/// What a run produced, consumed by the runtime deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionOutput {
    pub role_arn: String,
    pub role_name: String,
    pub grants: Vec<String>,
    /// False when an existing role was updated in place
    pub created: bool,
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, role: &ExecutionRole) -> Result<ProvisionOutput, ProvisionError>;
}

/// Reports what would be applied without calling out.
pub struct DryRunProvisioner {
    account_id: String,
    audit: Option<Arc<AuditLogger>>,
}

impl DryRunProvisioner {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }
}

#[async_trait]
impl Provisioner for DryRunProvisioner {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn apply(&self, role: &ExecutionRole) -> Result<ProvisionOutput, ProvisionError> {
        if let Some(audit) = &self.audit {
            audit.log(AuditEvent::RoleCreated, "dry-run", &role.name, AuditOutcome::Success, None);
            for grant in &role.grants {
                audit.log(
                    AuditEvent::GrantApplied {
                        grant: grant.name.clone(),
                    },
                    "dry-run",
                    &role.name,
                    AuditOutcome::Success,
                    None,
                );
            }
        }
        Ok(ProvisionOutput {
            role_arn: format!("arn:aws:iam::{}:role/{}", self.account_id, role.name),
            role_name: role.name.clone(),
            grants: role.grant_names(),
            created: true,
        })
    }
}

/// Declare, lint, and apply the execution role for `params`.
pub async fn provision(
    params: &DeploymentParams,
    provisioner: &dyn Provisioner,
) -> Result<ProvisionOutput, ProvisionError> {
    let role = ExecutionRole::declare(params);
    let report = lint(&role);
    if !report.is_clean() {
        for finding in &report.findings {
            error!(%finding, "Policy lint finding");
        }
        return Err(ProvisionError::InvalidDeclarations(format!(
            "{} lint finding(s)",
            report.findings.len()
        )));
    }

    info!(
        provisioner = provisioner.name(),
        role = %role.name,
        grants = role.grants.len(),
        "Applying execution role"
    );
    let output = provisioner.apply(&role).await?;
    info!(role_arn = %output.role_arn, "Provisioning complete");
    Ok(output)
}

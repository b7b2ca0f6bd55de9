//! Policy declarations for the FoodClaw execution role.
//!
//! The role, its trust policy, and its three permission grants are plain
//! data built from [`DeploymentParams`]. [`lint`] checks them against the
//! action surface in [`catalog`] before anything is provisioned.

pub mod catalog;
pub mod declarations;
pub mod document;
pub mod lint;

pub use declarations::{DeploymentParams, ExecutionRole, GrantKind, PermissionGrant, AGENTCORE_PRINCIPAL};
pub use document::{Effect, PolicyDocument, Principal, Statement};
pub use lint::{lint, Finding, LintReport, Rule};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("aws.account_id is required to declare policies (set it in config or AWS_ACCOUNT_ID)")]
    MissingAccountId,

    #[error("invalid deployment parameters: {0}")]
    InvalidParams(String),
}

//! Security layer for FoodClaw: AWS credentials, SigV4 signing, and the
//! audit trail of account changes.
//!
//! Provides:
//! - **Credentials**: environment and container-endpoint credential sources
//! - **SigV4**: request signing for Bedrock, AgentCore, and IAM
//! - **Audit logging**: structured record of IAM and memory-resource changes

pub mod audit;
pub mod credentials;
pub mod sigv4;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use credentials::{
    default_provider, ContainerCredentials, Credentials, CredentialsProvider,
    EnvironmentCredentials, StaticCredentials,
};
pub use sigv4::{SigV4Signer, SignatureOutput};

/// Failures while resolving credentials or signing a request.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("no AWS credentials found (set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or run under a container role)")]
    MissingCredentials,

    #[error("failed to fetch credentials: {0}")]
    CredentialFetch(String),

    #[error("request cannot be signed: {0}")]
    InvalidRequest(String),
}

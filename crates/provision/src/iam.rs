//! IAM Query API provisioning.
//!
//! `CreateRole`, then `PutRolePolicy` per grant. An existing role is either a
//! conflict or, with `update_existing`, gets its trust policy refreshed and
//! every grant re-put.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use foodclaw_policy::ExecutionRole;
use foodclaw_security::{AuditEvent, AuditLogger, AuditOutcome, CredentialsProvider, SigV4Signer};
use tracing::{debug, info, warn};

use crate::{ProvisionError, ProvisionOutput, Provisioner};

pub const IAM_ENDPOINT: &str = "https://iam.amazonaws.com/";
pub const IAM_API_VERSION: &str = "2010-05-08";
/// IAM is global; requests are signed for us-east-1.
pub const IAM_SIGNING_REGION: &str = "us-east-1";

/// One IAM Query API call: action name plus parameters, XML body back.
#[async_trait]
pub trait IamTransport: Send + Sync {
    async fn call(&self, action: &str, params: &[(&str, String)]) -> Result<String, ProvisionError>;
}

/// SigV4-signed form POSTs against the IAM endpoint.
pub struct QueryApiTransport {
    client: reqwest::Client,
    signer: SigV4Signer,
    endpoint: String,
}

impl QueryApiTransport {
    pub fn new(credentials: Arc<dyn CredentialsProvider>, timeout: Duration) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisionError::Network(e.to_string()))?;
        Ok(Self {
            client,
            signer: SigV4Signer::new(IAM_SIGNING_REGION, "iam", credentials),
            endpoint: IAM_ENDPOINT.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// `Action` and `Version` followed by the call's own parameters.
pub fn form_params(action: &str, params: &[(&str, String)]) -> Vec<(String, String)> {
    let mut form = vec![
        ("Action".to_string(), action.to_string()),
        ("Version".to_string(), IAM_API_VERSION.to_string()),
    ];
    form.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));
    form
}

#[async_trait]
impl IamTransport for QueryApiTransport {
    async fn call(&self, action: &str, params: &[(&str, String)]) -> Result<String, ProvisionError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .form(&form_params(action, params))
            .build()
            .map_err(|e| ProvisionError::Network(e.to_string()))?;
        self.signer
            .sign(&mut request)
            .await
            .map_err(|e| ProvisionError::Signing(e.to_string()))?;

        debug!(action, "IAM request");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(parse_error(status, &body))
        }
    }
}

/// Text of the first `<tag>` element, unescaped.
pub fn xml_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = start + body[start..].find(&close)?;
    Some(
        body[start..end]
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

/// Map an IAM `ErrorResponse` to a provisioning error.
pub fn parse_error(status: u16, body: &str) -> ProvisionError {
    let code = xml_tag(body, "Code").unwrap_or_else(|| format!("HTTP{status}"));
    let message = xml_tag(body, "Message").unwrap_or_else(|| body.trim().to_string());
    match code.as_str() {
        "EntityAlreadyExists" => ProvisionError::Conflict(message),
        "AccessDenied" | "AccessDeniedException" | "UnauthorizedOperation" => {
            ProvisionError::PermissionDenied(message)
        }
        _ if status == 403 => ProvisionError::PermissionDenied(message),
        _ => ProvisionError::Api {
            status,
            code,
            message,
        },
    }
}

pub struct IamProvisioner {
    transport: Box<dyn IamTransport>,
    account_id: String,
    update_existing: bool,
    audit: Arc<AuditLogger>,
    actor: String,
}

impl IamProvisioner {
    pub fn new(transport: Box<dyn IamTransport>, account_id: impl Into<String>) -> Self {
        Self {
            transport,
            account_id: account_id.into(),
            update_existing: false,
            audit: Arc::new(AuditLogger::new()),
            actor: "unknown".into(),
        }
    }

    pub fn with_update_existing(mut self, update: bool) -> Self {
        self.update_existing = update;
        self
    }

    /// Record every mutation in `audit`, attributed to `actor`.
    pub fn with_audit(mut self, audit: Arc<AuditLogger>, actor: impl Into<String>) -> Self {
        self.audit = audit;
        self.actor = actor.into();
        self
    }

    fn record(&self, event: AuditEvent, target: &str, result: &Result<String, ProvisionError>) {
        let (outcome, details) = match result {
            Ok(_) => (AuditOutcome::Success, None),
            Err(ProvisionError::PermissionDenied(m)) => (AuditOutcome::Denied, Some(m.clone())),
            Err(e) => (AuditOutcome::Failure, Some(e.to_string())),
        };
        self.audit.log(event, &self.actor, target, outcome, details);
    }

    /// Returns the role ARN and whether the role was created by this call.
    async fn ensure_role(&self, role: &ExecutionRole) -> Result<(String, bool), ProvisionError> {
        let trust = role.trust_policy.to_json_string()?;
        let created = self
            .transport
            .call(
                "CreateRole",
                &[
                    ("RoleName", role.name.clone()),
                    ("AssumeRolePolicyDocument", trust.clone()),
                    ("Description", format!("Execution role for {}", role.name)),
                ],
            )
            .await;

        match created {
            Ok(body) => {
                self.record(AuditEvent::RoleCreated, &role.name, &Ok(String::new()));
                let arn = xml_tag(&body, "Arn").unwrap_or_else(|| self.role_arn(&role.name));
                info!(role = %role.name, arn = %arn, "Created execution role");
                Ok((arn, true))
            }
            Err(ProvisionError::Conflict(message)) if self.update_existing => {
                warn!(role = %role.name, "Role exists; refreshing trust policy");
                let updated = self
                    .transport
                    .call(
                        "UpdateAssumeRolePolicy",
                        &[("RoleName", role.name.clone()), ("PolicyDocument", trust)],
                    )
                    .await;
                self.record(AuditEvent::TrustPolicyUpdated, &role.name, &updated);
                updated?;
                debug!(detail = %message, "CreateRole conflict resolved by update");
                Ok((self.role_arn(&role.name), false))
            }
            Err(e) => {
                self.record(AuditEvent::RoleCreated, &role.name, &Err(e.clone()));
                Err(e)
            }
        }
    }

    fn role_arn(&self, role_name: &str) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, role_name)
    }
}

#[async_trait]
impl Provisioner for IamProvisioner {
    fn name(&self) -> &str {
        "iam"
    }

    async fn apply(&self, role: &ExecutionRole) -> Result<ProvisionOutput, ProvisionError> {
        let (role_arn, created) = self.ensure_role(role).await?;

        let mut grants = Vec::with_capacity(role.grants.len());
        for grant in &role.grants {
            let result = self
                .transport
                .call(
                    "PutRolePolicy",
                    &[
                        ("RoleName", role.name.clone()),
                        ("PolicyName", grant.name.clone()),
                        ("PolicyDocument", grant.document.to_json_string()?),
                    ],
                )
                .await;
            self.record(
                AuditEvent::GrantApplied {
                    grant: grant.name.clone(),
                },
                &role.name,
                &result,
            );
            result?;
            info!(role = %role.name, grant = %grant.name, "Applied permission grant");
            grants.push(grant.name.clone());
        }

        Ok(ProvisionOutput {
            role_arn,
            role_name: role.name.clone(),
            grants,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::role;
    use std::sync::Mutex;

    /// Replies per action; records every call.
    #[derive(Default)]
    struct ScriptedIam {
        create: Option<ProvisionError>,
        update: Option<ProvisionError>,
        calls: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>,
    }

    #[async_trait]
    impl IamTransport for ScriptedIam {
        async fn call(&self, action: &str, params: &[(&str, String)]) -> Result<String, ProvisionError> {
            self.calls.lock().unwrap().push((
                action.to_string(),
                params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            ));
            let scripted = match action {
                "CreateRole" => self.create.clone(),
                "UpdateAssumeRolePolicy" => self.update.clone(),
                _ => None,
            };
            match scripted {
                Some(e) => Err(e),
                None if action == "CreateRole" => Ok(
                    "<CreateRoleResponse><CreateRoleResult><Role>\
                     <Arn>arn:aws:iam::123456789012:role/food-agent-dev-execution-role</Arn>\
                     </Role></CreateRoleResult></CreateRoleResponse>"
                        .into(),
                ),
                None => Ok(String::new()),
            }
        }
    }

    fn actions(calls: &Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>) -> Vec<String> {
        calls.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
    }

    #[tokio::test]
    async fn creates_role_then_puts_each_grant() {
        let iam = ScriptedIam::default();
        let calls = iam.calls.clone();
        let audit = Arc::new(AuditLogger::new());
        let provisioner = IamProvisioner::new(Box::new(iam), "123456789012").with_audit(audit.clone(), "AKIDEXAMPLE");

        let out = provisioner.apply(&role()).await.unwrap();
        assert!(out.created);
        assert_eq!(out.role_arn, "arn:aws:iam::123456789012:role/food-agent-dev-execution-role");
        assert_eq!(out.grants.len(), 3);
        assert_eq!(
            actions(&calls),
            vec!["CreateRole", "PutRolePolicy", "PutRolePolicy", "PutRolePolicy"]
        );

        let recorded = calls.lock().unwrap();
        let trust = &recorded[0].1.iter().find(|(k, _)| k == "AssumeRolePolicyDocument").unwrap().1;
        assert!(trust.contains("bedrock-agentcore.amazonaws.com"));
        assert_eq!(recorded[1].1[1], ("PolicyName".to_string(), "food-agent-dev-model-invoke".to_string()));

        assert_eq!(audit.count(), 4);
        assert_eq!(audit.entries_by_outcome(&AuditOutcome::Success).len(), 4);
    }

    #[tokio::test]
    async fn existing_role_is_a_conflict_by_default() {
        let iam = ScriptedIam {
            create: Some(ProvisionError::Conflict("Role with name food-agent-dev-execution-role already exists.".into())),
            ..Default::default()
        };
        let calls = iam.calls.clone();
        let audit = Arc::new(AuditLogger::new());
        let provisioner = IamProvisioner::new(Box::new(iam), "123456789012").with_audit(audit.clone(), "AKID");

        let err = provisioner.apply(&role()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Conflict(_)));
        assert_eq!(actions(&calls), vec!["CreateRole"]);
        assert_eq!(audit.entries_by_outcome(&AuditOutcome::Failure).len(), 1);
    }

    #[tokio::test]
    async fn existing_role_is_updated_when_allowed() {
        let iam = ScriptedIam {
            create: Some(ProvisionError::Conflict("exists".into())),
            ..Default::default()
        };
        let calls = iam.calls.clone();
        let provisioner = IamProvisioner::new(Box::new(iam), "123456789012").with_update_existing(true);

        let out = provisioner.apply(&role()).await.unwrap();
        assert!(!out.created);
        assert_eq!(out.role_arn, "arn:aws:iam::123456789012:role/food-agent-dev-execution-role");
        assert_eq!(
            actions(&calls),
            vec!["CreateRole", "UpdateAssumeRolePolicy", "PutRolePolicy", "PutRolePolicy", "PutRolePolicy"]
        );
    }

    #[tokio::test]
    async fn access_denied_is_fatal_and_audited() {
        let iam = ScriptedIam {
            create: Some(ProvisionError::PermissionDenied("not authorized to perform: iam:CreateRole".into())),
            ..Default::default()
        };
        let audit = Arc::new(AuditLogger::new());
        let provisioner = IamProvisioner::new(Box::new(iam), "123456789012").with_audit(audit.clone(), "AKID");

        let err = provisioner.apply(&role()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::PermissionDenied(_)));
        let denied = audit.entries_by_outcome(&AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].event, AuditEvent::RoleCreated);
    }

    #[test]
    fn error_responses_are_classified() {
        let body = "<ErrorResponse xmlns=\"https://iam.amazonaws.com/doc/2010-05-08/\">\
            <Error><Type>Sender</Type><Code>EntityAlreadyExists</Code>\
            <Message>Role with name food-agent-dev-execution-role already exists.</Message></Error>\
            <RequestId>abc</RequestId></ErrorResponse>";
        match parse_error(409, body) {
            ProvisionError::Conflict(m) => assert!(m.contains("already exists")),
            other => panic!("unexpected: {other:?}"),
        }

        let denied = "<ErrorResponse><Error><Code>AccessDenied</Code>\
            <Message>User: arn:aws:iam::1:user/ci is not authorized &amp; denied</Message></Error></ErrorResponse>";
        match parse_error(403, denied) {
            ProvisionError::PermissionDenied(m) => assert!(m.ends_with("authorized & denied")),
            other => panic!("unexpected: {other:?}"),
        }

        match parse_error(400, "<ErrorResponse><Error><Code>MalformedPolicyDocument</Code><Message>bad</Message></Error></ErrorResponse>") {
            ProvisionError::Api { status, code, message } => {
                assert_eq!((status, code.as_str(), message.as_str()), (400, "MalformedPolicyDocument", "bad"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn form_starts_with_action_and_version() {
        let form = form_params("CreateRole", &[("RoleName", "r".into())]);
        assert_eq!(form[0], ("Action".into(), "CreateRole".into()));
        assert_eq!(form[1], ("Version".into(), "2010-05-08".into()));
        assert_eq!(form[2], ("RoleName".into(), "r".into()));
    }
}

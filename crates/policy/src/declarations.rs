//! The execution role and its three permission grants.

use foodclaw_config::AppConfig;
use serde::Serialize;

use crate::document::{PolicyDocument, Principal, Statement};
use crate::PolicyError;

/// Service principal allowed to assume the execution role.
pub const AGENTCORE_PRINCIPAL: &str = "bedrock-agentcore.amazonaws.com";

const MODEL_ACTIONS: [&str; 2] = ["bedrock:InvokeModel", "bedrock:InvokeModelWithResponseStream"];

const MEMORY_ACTIONS: [&str; 7] = [
    "bedrock-agentcore:CreateEvent",
    "bedrock-agentcore:GetEvent",
    "bedrock-agentcore:ListEvents",
    "bedrock-agentcore:RetrieveMemoryRecords",
    "bedrock-agentcore:ListMemoryRecords",
    "bedrock-agentcore:GetMemoryRecord",
    "bedrock-agentcore:GetMemory",
];

const TOKEN_ACTIONS: [&str; 3] = [
    "bedrock-agentcore:GetWorkloadAccessToken",
    "bedrock-agentcore:GetWorkloadAccessTokenForJWT",
    "bedrock-agentcore:GetWorkloadAccessTokenForUserId",
];

/// Inputs that vary per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentParams {
    pub app_name: String,
    pub environment: String,
    pub region: String,
    pub account_id: String,
    /// Model ids the role may invoke, primary first
    pub models: Vec<String>,
}

impl DeploymentParams {
    pub fn from_config(config: &AppConfig) -> Result<Self, PolicyError> {
        let account_id = config
            .aws
            .account_id
            .clone()
            .ok_or(PolicyError::MissingAccountId)?;
        let params = Self {
            app_name: config.deploy.app_name.clone(),
            environment: config.deploy.environment.clone(),
            region: config.aws.region.clone(),
            account_id,
            models: config.model.allowed_models().iter().map(|m| m.to_string()).collect(),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.account_id.len() != 12 || !self.account_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(PolicyError::InvalidParams(format!(
                "account id must be 12 digits (got '{}')",
                self.account_id
            )));
        }
        for (field, value) in [
            ("app_name", &self.app_name),
            ("environment", &self.environment),
            ("region", &self.region),
        ] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(PolicyError::InvalidParams(format!(
                    "{field} may only contain letters, digits, and '-' (got '{value}')"
                )));
            }
        }
        if self.models.is_empty() {
            return Err(PolicyError::InvalidParams("at least one model id is required".into()));
        }
        Ok(())
    }

    /// `{app_name}-{environment}`
    pub fn prefix(&self) -> String {
        format!("{}-{}", self.app_name, self.environment)
    }

    pub fn role_name(&self) -> String {
        format!("{}-execution-role", self.prefix())
    }

    pub fn role_arn(&self) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, self.role_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GrantKind {
    ModelInvoke,
    MemoryManage,
    TokenFederation,
}

impl GrantKind {
    pub const ALL: [GrantKind; 3] = [
        GrantKind::ModelInvoke,
        GrantKind::MemoryManage,
        GrantKind::TokenFederation,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            GrantKind::ModelInvoke => "model-invoke",
            GrantKind::MemoryManage => "memory-manage",
            GrantKind::TokenFederation => "token-federation",
        }
    }
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionGrant {
    pub name: String,
    pub kind: GrantKind,
    pub document: PolicyDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRole {
    pub name: String,
    pub trust_policy: PolicyDocument,
    pub grants: Vec<PermissionGrant>,
}

impl ExecutionRole {
    /// Declare the role and exactly the grants the agent runtime needs.
    pub fn declare(params: &DeploymentParams) -> Self {
        let grants = GrantKind::ALL
            .iter()
            .map(|&kind| PermissionGrant {
                name: format!("{}-{}", params.prefix(), kind.slug()),
                kind,
                document: grant_document(kind, params),
            })
            .collect();

        Self {
            name: params.role_name(),
            trust_policy: trust_policy(params),
            grants,
        }
    }

    pub fn grant(&self, kind: GrantKind) -> Option<&PermissionGrant> {
        self.grants.iter().find(|g| g.kind == kind)
    }

    pub fn grant_names(&self) -> Vec<String> {
        self.grants.iter().map(|g| g.name.clone()).collect()
    }
}

fn trust_policy(params: &DeploymentParams) -> PolicyDocument {
    PolicyDocument::new(vec![Statement::allow("AssumeRolePolicy")
        .principal(Principal::service(AGENTCORE_PRINCIPAL))
        .actions(["sts:AssumeRole"])
        .condition("StringEquals", "aws:SourceAccount", &params.account_id)
        .condition(
            "ArnLike",
            "aws:SourceArn",
            format!("arn:aws:bedrock-agentcore:{}:{}:*", params.region, params.account_id),
        )])
}

fn grant_document(kind: GrantKind, params: &DeploymentParams) -> PolicyDocument {
    match kind {
        GrantKind::ModelInvoke => {
            let resources: Vec<String> = params
                .models
                .iter()
                .flat_map(|m| model_resources(m, &params.region, &params.account_id))
                .collect();
            PolicyDocument::new(vec![Statement::allow("BedrockModelInvocation")
                .actions(MODEL_ACTIONS)
                .resources(resources)])
        }
        GrantKind::MemoryManage => PolicyDocument::new(vec![Statement::allow("AgentCoreMemory")
            .actions(MEMORY_ACTIONS)
            .resources([format!(
                "arn:aws:bedrock-agentcore:{}:{}:memory/*",
                params.region, params.account_id
            )])]),
        GrantKind::TokenFederation => {
            let directory = format!(
                "arn:aws:bedrock-agentcore:{}:{}:workload-identity-directory/default",
                params.region, params.account_id
            );
            PolicyDocument::new(vec![Statement::allow("GetAgentAccessToken")
                .actions(TOKEN_ACTIONS)
                .resources([format!("{directory}/workload-identity/*"), directory])])
        }
    }
}

const GEO_PREFIXES: [&str; 3] = ["us", "eu", "apac"];

/// Foundation-model and cross-region inference-profile ARNs for a model id.
///
/// `us.anthropic.claude...` is already a profile id; a bare id gets the
/// profile of the region's geography. Foundation models are matched in every
/// region because profiles route across regions.
pub fn model_resources(model_id: &str, region: &str, account_id: &str) -> Vec<String> {
    let (geo, base) = match model_id.split_once('.') {
        Some((prefix, rest)) if GEO_PREFIXES.contains(&prefix) => (prefix.to_string(), rest),
        _ => (region_geo(region).to_string(), model_id),
    };
    vec![
        format!("arn:aws:bedrock:*::foundation-model/{base}"),
        format!("arn:aws:bedrock:{region}:{account_id}:inference-profile/{geo}.{base}"),
    ]
}

fn region_geo(region: &str) -> &'static str {
    if region.starts_with("eu-") {
        "eu"
    } else if region.starts_with("ap-") {
        "apac"
    } else {
        "us"
    }
}

#[cfg(test)]
pub(crate) fn sample_params() -> DeploymentParams {
    DeploymentParams {
        app_name: "food-agent".into(),
        environment: "dev".into(),
        region: "us-east-1".into(),
        account_id: "123456789012".into(),
        models: vec![
            "us.anthropic.claude-3-5-haiku-20241022-v1:0".into(),
            "amazon.nova-pro-v1:0".into(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::sample_params as params;

    #[test]
    fn names_follow_prefix() {
        let role = ExecutionRole::declare(&params());
        assert_eq!(role.name, "food-agent-dev-execution-role");
        assert_eq!(
            role.grant_names(),
            vec![
                "food-agent-dev-model-invoke",
                "food-agent-dev-memory-manage",
                "food-agent-dev-token-federation"
            ]
        );
        assert_eq!(params().role_arn(), "arn:aws:iam::123456789012:role/food-agent-dev-execution-role");
    }

    #[test]
    fn trust_policy_is_conditioned() {
        let role = ExecutionRole::declare(&params());
        let stmt = &role.trust_policy.statements[0];
        assert_eq!(stmt.principal, Some(Principal::service(AGENTCORE_PRINCIPAL)));
        assert_eq!(stmt.actions, vec!["sts:AssumeRole"]);
        assert_eq!(
            stmt.condition_value("aws:SourceAccount"),
            Some(("StringEquals", "123456789012"))
        );
        assert_eq!(
            stmt.condition_value("aws:SourceArn"),
            Some(("ArnLike", "arn:aws:bedrock-agentcore:us-east-1:123456789012:*"))
        );
    }

    #[test]
    fn model_grant_covers_both_models() {
        let role = ExecutionRole::declare(&params());
        let grant = role.grant(GrantKind::ModelInvoke).unwrap();
        let resources: Vec<&str> = grant.document.resources().collect();
        assert_eq!(
            resources,
            vec![
                "arn:aws:bedrock:*::foundation-model/anthropic.claude-3-5-haiku-20241022-v1:0",
                "arn:aws:bedrock:us-east-1:123456789012:inference-profile/us.anthropic.claude-3-5-haiku-20241022-v1:0",
                "arn:aws:bedrock:*::foundation-model/amazon.nova-pro-v1:0",
                "arn:aws:bedrock:us-east-1:123456789012:inference-profile/us.amazon.nova-pro-v1:0",
            ]
        );
        assert_eq!(grant.document.actions().count(), 2);
    }

    #[test]
    fn region_picks_profile_geography() {
        let arns = model_resources("amazon.nova-pro-v1:0", "eu-west-1", "123456789012");
        assert!(arns[1].ends_with("inference-profile/eu.amazon.nova-pro-v1:0"));
    }

    #[test]
    fn params_from_config() {
        let mut config = AppConfig::default();
        assert!(matches!(
            DeploymentParams::from_config(&config),
            Err(PolicyError::MissingAccountId)
        ));

        config.aws.account_id = Some("123456789012".into());
        let p = DeploymentParams::from_config(&config).unwrap();
        assert_eq!(p.prefix(), "food-agent-dev");
        assert_eq!(p.models.len(), 2);

        let mut bad = p.clone();
        bad.app_name = "food agent".into();
        assert!(matches!(bad.validate(), Err(PolicyError::InvalidParams(_))));
    }
}

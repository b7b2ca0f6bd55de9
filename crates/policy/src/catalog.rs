//! Action surface per service resource type.
//!
//! Only the resource types this deployment touches are listed. An action is
//! in scope for a resource when the service authorizes it against that
//! resource type.

/// A resource type and the actions that may target it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    pub service: &'static str,
    pub name: &'static str,
    pub actions: &'static [&'static str],
}

impl ResourceType {
    pub fn allows(&self, action: &str) -> bool {
        match action.split_once(':') {
            Some((service, name)) => service == self.service && self.actions.contains(&name),
            None => false,
        }
    }
}

const MODEL_ACTIONS: &[&str] = &[
    "InvokeModel",
    "InvokeModelWithResponseStream",
    "GetFoundationModel",
];

const PROFILE_ACTIONS: &[&str] = &[
    "InvokeModel",
    "InvokeModelWithResponseStream",
    "GetInferenceProfile",
];

const MEMORY_ACTIONS: &[&str] = &[
    "CreateEvent",
    "GetEvent",
    "ListEvents",
    "DeleteEvent",
    "ListActors",
    "ListSessions",
    "RetrieveMemoryRecords",
    "ListMemoryRecords",
    "GetMemoryRecord",
    "DeleteMemoryRecord",
    "GetMemory",
    "UpdateMemory",
    "DeleteMemory",
];

const WORKLOAD_TOKEN_ACTIONS: &[&str] = &[
    "GetWorkloadAccessToken",
    "GetWorkloadAccessTokenForJWT",
    "GetWorkloadAccessTokenForUserId",
    "CreateWorkloadIdentity",
    "GetWorkloadIdentity",
    "UpdateWorkloadIdentity",
    "DeleteWorkloadIdentity",
    "ListWorkloadIdentities",
];

pub const CATALOG: &[ResourceType] = &[
    ResourceType {
        service: "bedrock",
        name: "foundation-model",
        actions: MODEL_ACTIONS,
    },
    ResourceType {
        service: "bedrock",
        name: "inference-profile",
        actions: PROFILE_ACTIONS,
    },
    ResourceType {
        service: "bedrock-agentcore",
        name: "memory",
        actions: MEMORY_ACTIONS,
    },
    ResourceType {
        service: "bedrock-agentcore",
        name: "workload-identity-directory",
        actions: WORKLOAD_TOKEN_ACTIONS,
    },
];

/// Parsed `arn:partition:service:region:account:resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn<'a> {
    pub partition: &'a str,
    pub service: &'a str,
    pub region: &'a str,
    pub account: &'a str,
    pub resource: &'a str,
}

impl<'a> Arn<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {
        let mut parts = s.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let arn = Arn {
            partition: parts.next()?,
            service: parts.next()?,
            region: parts.next()?,
            account: parts.next()?,
            resource: parts.next()?,
        };
        (!arn.service.is_empty() && !arn.resource.is_empty()).then_some(arn)
    }

    /// Leading segment of the resource, e.g. `memory` in `memory/*`.
    pub fn resource_type(&self) -> &'a str {
        self.resource.split(['/', ':']).next().unwrap_or(self.resource)
    }
}

/// Catalog entry for a resource ARN.
///
/// Workload identities nested under a directory share the directory's
/// action surface.
pub fn resource_type_of(arn: &str) -> Option<&'static ResourceType> {
    let parsed = Arn::parse(arn)?;
    let kind = parsed.resource_type();
    CATALOG
        .iter()
        .find(|rt| rt.service == parsed.service && rt.name == kind)
}

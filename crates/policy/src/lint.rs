//! Least-privilege checks over declared policies.
//!
//! Every finding is an error: the declarations in this crate must lint clean,
//! and `provision apply` refuses to run when they don't.

use serde::Serialize;

use crate::catalog::resource_type_of;
use crate::declarations::{ExecutionRole, PermissionGrant, AGENTCORE_PRINCIPAL};
use crate::document::{Effect, PolicyDocument};

pub const TRUST_SUBJECT: &str = "trust-policy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Action containing a `*` or `?` glob, e.g. `*`, `service:*` or `service:Get*`
    WildcardAction,
    /// Bare `*` resource, or a resource with no ARN
    UnscopedResource,
    /// Resource type this deployment has no business touching
    UnknownResource,
    /// Action the resource type does not support
    ActionOutsideSurface,
    /// Statement grants every action the resource type supports
    FullSurface,
    /// Deny statement in a grant; grants only add permissions
    NonAdditive,
    /// Allow statement with no resources
    MissingResource,
    /// Trust policy principal is a wildcard or not the expected service
    UnexpectedPrincipal,
    /// Trust policy allows something other than `sts:AssumeRole`
    UnexpectedTrustAction,
    /// Trust policy lacks a confused-deputy condition
    MissingCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub subject: String,
    pub rule: Rule,
    pub message: String,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}: {}", self.subject, self.rule, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub findings: Vec<Finding>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn by_rule(&self, rule: Rule) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.rule == rule).collect()
    }
}

pub fn lint(role: &ExecutionRole) -> LintReport {
    let mut findings = lint_trust(&role.trust_policy, AGENTCORE_PRINCIPAL);
    for grant in &role.grants {
        findings.extend(lint_grant(grant));
    }
    LintReport { findings }
}

pub fn lint_grant(grant: &PermissionGrant) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut push = |rule, message: String| {
        findings.push(Finding {
            subject: grant.name.clone(),
            rule,
            message,
        })
    };

    for stmt in &grant.document.statements {
        if stmt.effect == Effect::Deny {
            push(Rule::NonAdditive, "grant contains a Deny statement".into());
            continue;
        }
        if stmt.resources.is_empty() {
            push(Rule::MissingResource, "statement has no Resource".into());
        }
        for action in stmt.actions.iter().filter(|a| is_glob(a)) {
            push(Rule::WildcardAction, format!("wildcard action '{action}'"));
        }
        for resource in &stmt.resources {
            if !resource.starts_with("arn:") {
                push(Rule::UnscopedResource, format!("resource '{resource}' is not a named ARN"));
                continue;
            }
            let Some(rt) = resource_type_of(resource) else {
                push(Rule::UnknownResource, format!("no known resource type for '{resource}'"));
                continue;
            };
            for action in stmt.actions.iter().filter(|a| !is_glob(a)) {
                if !rt.allows(action) {
                    push(
                        Rule::ActionOutsideSurface,
                        format!("'{action}' does not apply to {}:{} resources", rt.service, rt.name),
                    );
                }
            }
            let covered = rt
                .actions
                .iter()
                .all(|name| stmt.actions.iter().any(|a| a == &format!("{}:{name}", rt.service)));
            if covered {
                push(
                    Rule::FullSurface,
                    format!("'{resource}' is granted every {}:{} action", rt.service, rt.name),
                );
            }
        }
    }
    findings
}

fn is_glob(action: &str) -> bool {
    action.contains(['*', '?'])
}

/// Check a trust policy admits only `principal` via `sts:AssumeRole`, with
/// source account and source ARN conditions.
pub fn lint_trust(doc: &PolicyDocument, principal: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut push = |rule, message: String| {
        findings.push(Finding {
            subject: TRUST_SUBJECT.into(),
            rule,
            message,
        })
    };

    for stmt in doc.statements.iter().filter(|s| s.effect == Effect::Allow) {
        match &stmt.principal {
            None => push(Rule::UnexpectedPrincipal, "statement has no Principal".into()),
            Some(p) if p.is_wildcard() => push(Rule::UnexpectedPrincipal, "wildcard principal".into()),
            Some(p) if !p.aws.is_empty() || p.service != [principal] => push(
                Rule::UnexpectedPrincipal,
                format!("principal must be exactly service '{principal}'"),
            ),
            Some(_) => {}
        }
        for action in stmt.actions.iter().filter(|a| *a != "sts:AssumeRole") {
            push(Rule::UnexpectedTrustAction, format!("unexpected action '{action}'"));
        }
        for key in ["aws:SourceAccount", "aws:SourceArn"] {
            if stmt.condition_value(key).is_none() {
                push(Rule::MissingCondition, format!("missing condition on '{key}'"));
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarations::{sample_params, GrantKind};
    use crate::document::{Principal, Statement};

    #[test]
    fn declared_role_is_clean() {
        let report = lint(&ExecutionRole::declare(&sample_params()));
        assert!(report.is_clean(), "{:?}", report.findings);
    }

    #[test]
    fn every_grant_is_a_strict_subset_of_its_resource_surface() {
        let role = ExecutionRole::declare(&sample_params());
        for grant in &role.grants {
            for resource in grant.document.resources() {
                let rt = resource_type_of(resource).unwrap();
                let granted: Vec<&str> = grant.document.actions().filter(|a| rt.allows(a)).collect();
                assert_eq!(granted.len(), grant.document.actions().count(), "{} on {resource}", grant.name);
                assert!(
                    granted.len() < rt.actions.len(),
                    "{} grants the whole {}:{} surface",
                    grant.name,
                    rt.service,
                    rt.name
                );
            }
        }
    }

    #[test]
    fn flags_partial_wildcards() {
        let mut role = ExecutionRole::declare(&sample_params());
        let grant = role
            .grants
            .iter_mut()
            .find(|g| g.kind == GrantKind::MemoryManage)
            .unwrap();
        grant.document.statements[0].actions.extend([
            "bedrock-agentcore:Delete*".to_string(),
            "bedrock-agentcore:*Memory*".to_string(),
            "bedrock-agentcore:GetEven?".to_string(),
        ]);

        let report = lint(&role);
        let wildcards = report.by_rule(Rule::WildcardAction);
        assert_eq!(wildcards.len(), 3);
        assert!(wildcards[0].message.contains("Delete*"));
        assert!(report.by_rule(Rule::ActionOutsideSurface).is_empty());
        assert!(!report.is_clean());
    }

    #[test]
    fn flags_grant_covering_whole_surface() {
        let mut role = ExecutionRole::declare(&sample_params());
        let grant = role
            .grants
            .iter_mut()
            .find(|g| g.kind == GrantKind::TokenFederation)
            .unwrap();
        let rt = resource_type_of(grant.document.resources().next().unwrap()).unwrap();
        grant.document.statements[0].actions =
            rt.actions.iter().map(|a| format!("{}:{a}", rt.service)).collect();

        let report = lint(&role);
        let full = report.by_rule(Rule::FullSurface);
        assert!(!full.is_empty());
        assert!(full.iter().all(|f| f.subject == grant_name(&role, GrantKind::TokenFederation)));
        assert!(report.by_rule(Rule::ActionOutsideSurface).is_empty());
    }

    fn grant_name(role: &ExecutionRole, kind: GrantKind) -> String {
        role.grants.iter().find(|g| g.kind == kind).unwrap().name.clone()
    }

    #[test]
    fn flags_wildcards_and_foreign_actions() {
        let mut role = ExecutionRole::declare(&sample_params());
        let grant = role
            .grants
            .iter_mut()
            .find(|g| g.kind == GrantKind::MemoryManage)
            .unwrap();
        grant.document.statements[0]
            .actions
            .extend(["bedrock:InvokeModel".to_string(), "bedrock-agentcore:*".to_string()]);
        grant.document.statements[0].resources.push("*".into());

        let report = lint(&role);
        assert_eq!(report.by_rule(Rule::WildcardAction).len(), 1);
        assert_eq!(report.by_rule(Rule::UnscopedResource).len(), 1);
        let outside = report.by_rule(Rule::ActionOutsideSurface);
        assert_eq!(outside.len(), 1);
        assert!(outside[0].message.contains("bedrock:InvokeModel"));
        assert_eq!(outside[0].subject, "food-agent-dev-memory-manage");
    }

    #[test]
    fn flags_deny_and_unknown_resources() {
        let mut role = ExecutionRole::declare(&sample_params());
        role.grants[0].document.statements.push(Statement {
            effect: Effect::Deny,
            ..Statement::allow("Deny").actions(["bedrock:InvokeModel"])
        });
        role.grants[1].document.statements[0]
            .resources
            .push("arn:aws:s3:::food-bucket/*".into());

        let report = lint(&role);
        assert_eq!(report.by_rule(Rule::NonAdditive).len(), 1);
        assert_eq!(report.by_rule(Rule::UnknownResource).len(), 1);
    }

    #[test]
    fn trust_policy_rejects_wildcard_principal() {
        let doc = PolicyDocument::new(vec![Statement::allow("Open")
            .principal(Principal {
                service: vec![],
                aws: vec!["*".into()],
            })
            .actions(["sts:AssumeRole", "sts:TagSession"])]);

        let findings = lint_trust(&doc, AGENTCORE_PRINCIPAL);
        let rules: Vec<Rule> = findings.iter().map(|f| f.rule).collect();
        assert_eq!(
            rules,
            vec![
                Rule::UnexpectedPrincipal,
                Rule::UnexpectedTrustAction,
                Rule::MissingCondition,
                Rule::MissingCondition
            ]
        );
    }

    #[test]
    fn trust_policy_rejects_other_service() {
        let doc = PolicyDocument::new(vec![Statement::allow("Lambda")
            .principal(Principal::service("lambda.amazonaws.com"))
            .actions(["sts:AssumeRole"])
            .condition("StringEquals", "aws:SourceAccount", "123456789012")
            .condition("ArnLike", "aws:SourceArn", "arn:aws:lambda:us-east-1:123456789012:*")]);
        let findings = lint_trust(&doc, AGENTCORE_PRINCIPAL);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::UnexpectedPrincipal);
    }
}

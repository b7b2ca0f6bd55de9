//! IAM policy documents.
//!
//! Serializes to the JSON IAM expects (`Version`, `Statement`, `Effect`,
//! `Action`, `Resource`, `Principal`, `Condition`). Lists always serialize as
//! arrays; deserialization also accepts the single-string form.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// `Condition` block: operator → key → value.
pub type ConditionMap = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Principal {
    #[serde(
        rename = "Service",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub service: Vec<String>,

    #[serde(
        rename = "AWS",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub aws: Vec<String>,
}

impl Principal {
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            service: vec![name.into()],
            aws: Vec::new(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.service.iter().chain(self.aws.iter()).any(|p| p.contains('*'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(rename = "Effect")]
    pub effect: Effect,

    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    #[serde(rename = "Action", deserialize_with = "one_or_many")]
    pub actions: Vec<String>,

    #[serde(
        rename = "Resource",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub resources: Vec<String>,

    #[serde(rename = "Condition", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: ConditionMap,
}

impl Statement {
    pub fn allow(sid: impl Into<String>) -> Self {
        Self {
            sid: Some(sid.into()),
            effect: Effect::Allow,
            principal: None,
            actions: Vec::new(),
            resources: Vec::new(),
            condition: BTreeMap::new(),
        }
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.condition
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Look up a condition value by key under any operator.
    pub fn condition_value(&self, key: &str) -> Option<(&str, &str)> {
        self.condition
            .iter()
            .find_map(|(op, kv)| kv.get(key).map(|v| (op.as_str(), v.as_str())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.into(),
            statements,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Only strings and maps of strings: cannot fail
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Compact JSON, as passed to IAM API parameters.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|s| s.actions.iter().map(String::as_str))
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|s| s.resources.iter().map(String::as_str))
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_iam_shape() {
        let doc = PolicyDocument::new(vec![Statement::allow("Invoke")
            .actions(["bedrock:InvokeModel"])
            .resources(["arn:aws:bedrock:us-east-1::foundation-model/amazon.nova-pro-v1:0"])]);

        assert_eq!(
            doc.to_json(),
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Sid": "Invoke",
                    "Effect": "Allow",
                    "Action": ["bedrock:InvokeModel"],
                    "Resource": ["arn:aws:bedrock:us-east-1::foundation-model/amazon.nova-pro-v1:0"]
                }]
            })
        );
    }

    #[test]
    fn trust_statement_with_condition() {
        let stmt = Statement::allow("Trust")
            .principal(Principal::service("bedrock-agentcore.amazonaws.com"))
            .actions(["sts:AssumeRole"])
            .condition("StringEquals", "aws:SourceAccount", "123456789012");

        let value = serde_json::to_value(&stmt).unwrap();
        assert_eq!(value["Principal"], json!({"Service": ["bedrock-agentcore.amazonaws.com"]}));
        assert_eq!(value["Condition"]["StringEquals"]["aws:SourceAccount"], "123456789012");
        assert!(value.get("Resource").is_none());
        assert_eq!(
            stmt.condition_value("aws:SourceAccount"),
            Some(("StringEquals", "123456789012"))
        );
    }

    #[test]
    fn accepts_single_string_lists() {
        let doc: PolicyDocument = serde_json::from_value(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"AWS": "*"},
                "Action": "sts:AssumeRole"
            }]
        }))
        .unwrap();
        let stmt = &doc.statements[0];
        assert_eq!(stmt.actions, vec!["sts:AssumeRole"]);
        assert!(stmt.principal.as_ref().unwrap().is_wildcard());
        assert!(stmt.resources.is_empty());
    }
}

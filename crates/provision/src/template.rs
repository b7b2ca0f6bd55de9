//! CloudFormation rendering of the execution role.

use foodclaw_policy::ExecutionRole;
use serde_json::{json, Map, Value};

/// Logical id of the role resource in the rendered template.
pub const ROLE_LOGICAL_ID: &str = "ExecutionRole";

pub struct Template;

impl Template {
    /// One `AWS::IAM::Role` with the trust policy and an inline policy per
    /// grant, plus `ExecutionRoleArn` and `ExecutionRoleName` outputs.
    pub fn render(role: &ExecutionRole) -> Value {
        let policies: Vec<Value> = role
            .grants
            .iter()
            .map(|g| {
                json!({
                    "PolicyName": g.name,
                    "PolicyDocument": g.document.to_json(),
                })
            })
            .collect();

        let mut resources = Map::new();
        resources.insert(
            ROLE_LOGICAL_ID.into(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "RoleName": role.name,
                    "Description": format!("Execution role for {}", role.name),
                    "AssumeRolePolicyDocument": role.trust_policy.to_json(),
                    "Policies": policies,
                }
            }),
        );

        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": format!("FoodClaw agent runtime execution role ({})", role.name),
            "Resources": resources,
            "Outputs": {
                "ExecutionRoleArn": {
                    "Description": "ARN of the agent runtime execution role",
                    "Value": { "Fn::GetAtt": [ROLE_LOGICAL_ID, "Arn"] },
                    "Export": { "Name": { "Fn::Sub": "${AWS::StackName}-ExecutionRoleArn" } }
                },
                "ExecutionRoleName": {
                    "Description": "Name of the agent runtime execution role",
                    "Value": { "Ref": ROLE_LOGICAL_ID }
                }
            }
        })
    }

    pub fn render_pretty(role: &ExecutionRole) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::render(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::role;

    #[test]
    fn renders_role_with_inline_policies() {
        let template = Template::render(&role());
        let props = &template["Resources"]["ExecutionRole"]["Properties"];

        assert_eq!(template["Resources"]["ExecutionRole"]["Type"], "AWS::IAM::Role");
        assert_eq!(props["RoleName"], "food-agent-dev-execution-role");
        assert_eq!(
            props["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"][0],
            "bedrock-agentcore.amazonaws.com"
        );

        let names: Vec<&str> = props["Policies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["PolicyName"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "food-agent-dev-model-invoke",
                "food-agent-dev-memory-manage",
                "food-agent-dev-token-federation"
            ]
        );
        assert_eq!(props["Policies"][1]["PolicyDocument"]["Version"], "2012-10-17");
    }

    #[test]
    fn outputs_arn_and_name() {
        let template = Template::render(&role());
        assert_eq!(
            template["Outputs"]["ExecutionRoleArn"]["Value"],
            json!({"Fn::GetAtt": ["ExecutionRole", "Arn"]})
        );
        assert_eq!(template["Outputs"]["ExecutionRoleName"]["Value"], json!({"Ref": "ExecutionRole"}));
        assert!(Template::render_pretty(&role()).unwrap().contains("AWSTemplateFormatVersion"));
    }
}

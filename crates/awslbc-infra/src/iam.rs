//! IAM documents for IRSA
//!
//! The controller's permissions come from the embedded `iam_policy.json`. The
//! trust policy lets exactly one Kubernetes service account assume the role
//! through the cluster's OIDC provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use awslbc_common::{Error, Result};

const CONTROLLER_POLICY_JSON: &str = include_str!("../assets/iam_policy.json");

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action used by IRSA to exchange a projected token for role credentials
pub const ASSUME_ROLE_WITH_WEB_IDENTITY: &str = "sts:AssumeRoleWithWebIdentity";

/// Policy granting the controller its ELB, EC2, ACM, WAF and Shield permissions,
/// exactly as embedded
pub fn controller_policy_json() -> &'static str {
    CONTROLLER_POLICY_JSON
}

/// Subject of the projected service account token
pub fn service_account_subject(namespace: &str, service_account: &str) -> String {
    format!("system:serviceaccount:{namespace}:{service_account}")
}

/// Trust policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrustPolicy {
    /// Policy language version
    pub version: String,
    /// Statements
    pub statement: Vec<TrustStatement>,
}

/// One trust statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrustStatement {
    /// Allow or Deny
    pub effect: String,
    /// Who may assume the role
    pub principal: Principal,
    /// Assume action
    pub action: String,
    /// Operator -> (condition key -> value)
    pub condition: BTreeMap<String, BTreeMap<String, String>>,
}

/// Federated principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    /// OIDC provider identifier
    pub federated: String,
}

impl TrustPolicy {
    /// Trust policy for IRSA.
    ///
    /// `oidc_provider` becomes the federated principal; `<oidc_issuer>:sub`
    /// must equal `subject`.
    pub fn for_service_account(oidc_issuer: &str, oidc_provider: &str, subject: &str) -> Self {
        let condition = BTreeMap::from([(
            "StringEquals".to_string(),
            BTreeMap::from([(format!("{oidc_issuer}:sub"), subject.to_string())]),
        )]);

        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![TrustStatement {
                effect: "Allow".to_string(),
                principal: Principal {
                    federated: oidc_provider.to_string(),
                },
                action: ASSUME_ROLE_WITH_WEB_IDENTITY.to_string(),
                condition,
            }],
        }
    }

    /// Serialize to the JSON string IAM expects
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::serialization(e.to_string()))
    }
}

/// Inputs of an IAM role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleArgs {
    /// Trust policy JSON
    pub assume_role_policy: String,
}

/// Inputs of a managed IAM policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyArgs {
    /// Policy document JSON
    pub policy: String,
    /// Account the policy is created in, when it must match another resource's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

/// Inputs of a role/policy attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePolicyAttachmentArgs {
    /// Name of the role
    pub role: String,
    /// ARN of the policy
    pub policy_arn: String,
}

/// ARN of a role in `account_id`
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

/// ARN of a customer-managed policy in `account_id`
pub fn policy_arn(account_id: &str, policy_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:policy/{policy_name}")
}

/// Account ID embedded in an IAM ARN such as
/// `arn:aws:iam::123456789012:oidc-provider/oidc.eks...`
pub fn account_id_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    let (Some("arn"), Some(_partition), Some("iam"), Some(""), Some(account)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };
    (account.len() == 12 && account.bytes().all(|b| b.is_ascii_digit())).then_some(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn trust_policy_matches_irsa_shape() {
        let subject = service_account_subject("lb-ns", "example-serviceaccount");
        let policy =
            TrustPolicy::for_service_account("oidc.example/id/ABC", "oidc.example/id/ABC", &subject);
        let value: Value = serde_json::from_str(&policy.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": {"Federated": "oidc.example/id/ABC"},
                    "Action": "sts:AssumeRoleWithWebIdentity",
                    "Condition": {
                        "StringEquals": {
                            "oidc.example/id/ABC:sub": "system:serviceaccount:lb-ns:example-serviceaccount"
                        }
                    }
                }]
            })
        );
    }

    #[test]
    fn issuer_and_provider_land_in_different_places() {
        let policy = TrustPolicy::for_service_account(
            "oidc.eks.us-west-2.amazonaws.com/id/6F5E",
            "arn:aws:iam::616138583583:oidc-provider/oidc.eks.us-west-2.amazonaws.com/id/6F5E",
            "system:serviceaccount:ns:sa",
        );
        let statement = &policy.statement[0];
        assert!(statement.principal.federated.starts_with("arn:aws:iam::"));
        assert!(statement.condition["StringEquals"]
            .contains_key("oidc.eks.us-west-2.amazonaws.com/id/6F5E:sub"));
    }

    #[test]
    fn controller_policy_is_a_valid_document() {
        let policy: Value = serde_json::from_str(controller_policy_json()).unwrap();
        assert_eq!(policy["Version"], POLICY_VERSION);
        let statements = policy["Statement"].as_array().unwrap();
        assert!(statements.iter().all(|s| s["Effect"] == "Allow"));
        assert!(statements.iter().any(|s| s["Action"]
            .as_array()
            .is_some_and(|a| a.iter().any(|x| x == "elasticloadbalancing:CreateLoadBalancer"))));
    }

    #[test]
    fn arns() {
        assert_eq!(
            role_arn("123456789012", "example-role-1a2b3c4"),
            "arn:aws:iam::123456789012:role/example-role-1a2b3c4"
        );
        assert_eq!(
            policy_arn("123456789012", "p"),
            "arn:aws:iam::123456789012:policy/p"
        );
    }

    #[test]
    fn account_from_oidc_provider_arn() {
        assert_eq!(
            account_id_from_arn(
                "arn:aws:iam::616138583583:oidc-provider/oidc.eks.us-west-2.amazonaws.com/id/X"
            ),
            Some("616138583583")
        );
        assert_eq!(account_id_from_arn("oidc.example/id/ABC"), None);
        assert_eq!(account_id_from_arn("arn:aws:s3:::bucket"), None);
    }
}

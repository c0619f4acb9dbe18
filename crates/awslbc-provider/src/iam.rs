//! IAM planning
//!
//! There is no AWS API client in this workspace. The planner assigns each IAM
//! resource its physical name and ARN and records the documents, which end up
//! in the deployment report for the operator to apply out of band.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use awslbc_common::kube_utils::deterministic_hash;
use awslbc_infra::iam::{
    account_id_from_arn, policy_arn, role_arn, PolicyArgs, RoleArgs, RolePolicyAttachmentArgs,
    TrustPolicy,
};
use awslbc_resource::naming::{auto_name, IAM_POLICY_NAME_MAX, IAM_ROLE_NAME_MAX};
use awslbc_resource::{CreateRequest, ProviderError, ResourceProvider, ResourceType};

use crate::merge_outputs;

/// Account used in ARNs when no account is configured and none can be derived
pub const PLACEHOLDER_ACCOUNT_ID: &str = "000000000000";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedIdentity {
    name: String,
    arn: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedAttachment {
    id: String,
}

/// Provider for the `aws` package
#[derive(Debug, Clone, Default)]
pub struct IamPlanner {
    account_id: Option<String>,
}

impl IamPlanner {
    /// Planner that derives the account from each role's trust policy and
    /// takes each policy's account from its inputs
    pub fn new() -> Self {
        Self::default()
    }

    /// Planner that places every ARN in `account_id`
    pub fn with_account(account_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
        }
    }

    fn account_for_role(&self, args: &RoleArgs) -> String {
        if let Some(account) = &self.account_id {
            return account.clone();
        }
        let derived = serde_json::from_str::<TrustPolicy>(&args.assume_role_policy)
            .ok()
            .and_then(|policy| {
                policy.statement.iter().find_map(|s| {
                    account_id_from_arn(&s.principal.federated)
                        .or_else(|| {
                            // issuer given as the provider ARN
                            s.condition
                                .values()
                                .flat_map(|m| m.keys())
                                .find_map(|key| {
                                    account_id_from_arn(key.strip_suffix(":sub").unwrap_or(key))
                                })
                        })
                        .map(str::to_string)
                })
            });
        derived.unwrap_or_else(|| {
            warn!(
                account = PLACEHOLDER_ACCOUNT_ID,
                "no AWS account configured and the OIDC provider is not an ARN"
            );
            PLACEHOLDER_ACCOUNT_ID.to_string()
        })
    }

    fn account_for_policy(&self, args: &PolicyArgs) -> String {
        self.account_id
            .clone()
            .or_else(|| args.account_id.clone())
            .unwrap_or_else(|| PLACEHOLDER_ACCOUNT_ID.to_string())
    }

    fn plan(&self, request: &CreateRequest) -> Result<Value, ProviderError> {
        match request.resource_type {
            ResourceType::IamRole => {
                let args: RoleArgs = request.inputs_as()?;
                serde_json::from_str::<TrustPolicy>(&args.assume_role_policy).map_err(|e| {
                    ProviderError::InvalidInputs {
                        urn: request.urn.clone(),
                        message: format!("assumeRolePolicy is not a trust policy: {e}"),
                    }
                })?;
                let name = explicit_name(request)
                    .unwrap_or_else(|| auto_name(&request.urn, IAM_ROLE_NAME_MAX));
                let arn = role_arn(&self.account_for_role(&args), &name);
                info!(role = %name, arn = %arn, "planned IAM role");
                merge_outputs(request, PlannedIdentity { name, arn })
            }
            ResourceType::IamPolicy => {
                let args: PolicyArgs = request.inputs_as()?;
                serde_json::from_str::<Value>(&args.policy).map_err(|e| {
                    ProviderError::InvalidInputs {
                        urn: request.urn.clone(),
                        message: format!("policy is not valid JSON: {e}"),
                    }
                })?;
                let name = explicit_name(request)
                    .unwrap_or_else(|| auto_name(&request.urn, IAM_POLICY_NAME_MAX));
                let arn = policy_arn(&self.account_for_policy(&args), &name);
                info!(policy = %name, arn = %arn, "planned IAM policy");
                merge_outputs(request, PlannedIdentity { name, arn })
            }
            ResourceType::IamRolePolicyAttachment => {
                let args: RolePolicyAttachmentArgs = request.inputs_as()?;
                let id = format!(
                    "{}-{}",
                    args.role,
                    &deterministic_hash(&args.policy_arn)[..8]
                );
                merge_outputs(request, PlannedAttachment { id })
            }
            _ => Err(ProviderError::unsupported("aws", request)),
        }
    }
}

fn explicit_name(request: &CreateRequest) -> Option<String> {
    request
        .inputs
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ResourceProvider for IamPlanner {
    async fn create(&self, request: &CreateRequest) -> Result<Value, ProviderError> {
        self.plan(request)
    }
}

//! IAM role, policy and attachment for IRSA

use awslbc_common::Result;
use awslbc_infra::iam::{
    account_id_from_arn, controller_policy_json, service_account_subject, PolicyArgs, RoleArgs,
    RolePolicyAttachmentArgs, TrustPolicy,
};
use awslbc_resource::{ComponentResource, CustomResource, Output, ResourceOptions, ResourceType, Stack};

use crate::args::ComponentArgs;
use crate::objects::declare_args;

/// Name of the controller's service account
pub fn service_account_name(name: &str) -> String {
    format!("{name}-serviceaccount")
}

pub(crate) struct IamResources {
    pub role: CustomResource,
    pub policy: CustomResource,
    pub attachment: CustomResource,
}

/// Trust policy JSON for the service account in the namespace `namespace` resolves to
pub(crate) fn trust_policy(
    name: &str,
    args: &ComponentArgs,
    namespace: &Output<String>,
) -> Output<String> {
    let issuer = args.oidc_issuer.clone();
    let provider = args.oidc_provider.clone();
    let service_account = service_account_name(name);
    namespace.try_apply(move |ns| {
        let subject = service_account_subject(&ns, &service_account);
        TrustPolicy::for_service_account(&issuer, &provider, &subject).to_json()
    })
}

pub(crate) fn declare(
    stack: &mut Stack,
    name: &str,
    args: &ComponentArgs,
    component: &ComponentResource,
    namespace: &Output<String>,
) -> Result<IamResources> {
    let role_args = trust_policy(name, args, namespace).apply(|assume_role_policy| RoleArgs {
        assume_role_policy,
    });
    let role = declare_args(
        stack,
        "IAM role",
        ResourceType::IamRole,
        &format!("{name}-role"),
        role_args,
        ResourceOptions::child_of(component),
    )?;

    let policy_args = role.output::<String>("/arn").apply(|role_arn| PolicyArgs {
        policy: controller_policy_json().to_string(),
        account_id: account_id_from_arn(&role_arn).map(str::to_string),
    });
    let policy = declare_args(
        stack,
        "IAM policy",
        ResourceType::IamPolicy,
        &format!("{name}-policy"),
        policy_args,
        ResourceOptions::child_of(&role),
    )?;

    let attachment_args = role
        .output::<String>("/name")
        .zip(&policy.output::<String>("/arn"))
        .apply(|(role, policy_arn)| RolePolicyAttachmentArgs { role, policy_arn });
    let attachment = declare_args(
        stack,
        "IAM policy attachment",
        ResourceType::IamRolePolicyAttachment,
        &format!("{name}-policy-attachment"),
        attachment_args,
        ResourceOptions::child_of(&policy),
    )?;

    Ok(IamResources {
        role,
        policy,
        attachment,
    })
}

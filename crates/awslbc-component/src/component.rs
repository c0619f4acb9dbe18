//! The `awslbc:index:Deployment` component

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info};

use awslbc_common::{Error, Result, ROLE_ARN_ANNOTATION};
use awslbc_infra::crds::ConfigFileArgs;
use awslbc_resource::{
    ComponentResource, CustomResource, Output, Resource, ResourceOptions, ResourceType, Stack, Urn,
};

use crate::args::ComponentArgs;
use crate::iam::service_account_name;
use crate::objects::{declare, declare_args, labels, metadata, object_name};
use crate::{certs, deployment, iam, rbac, webhook};

/// Type token of the component
pub const COMPONENT_TYPE: &str = "awslbc:index:Deployment";

/// Handles to the resources of one controller installation
#[derive(Debug, Clone)]
pub struct AwsLbControllerDeployment {
    /// The component itself; parent of the top-level children
    pub component: ComponentResource,
    /// Namespace the controller runs in
    pub namespace: CustomResource,
    /// IAM role assumed by the controller
    pub iam_role: CustomResource,
    /// Controller IAM policy
    pub iam_policy: CustomResource,
    /// Attachment of the policy to the role
    pub iam_policy_attachment: CustomResource,
    /// Service account annotated with the role ARN
    pub service_account: CustomResource,
    /// Cluster-wide permissions
    pub cluster_role: CustomResource,
    /// Binding of the cluster role to the service account
    pub cluster_role_binding: CustomResource,
    /// Leader-election permissions in the controller namespace
    pub role: CustomResource,
    /// Binding of the role to the service account
    pub role_binding: CustomResource,
    /// Self-signed webhook CA
    pub ca_cert: CustomResource,
    /// Service fronting the webhook server
    pub webhook_service: CustomResource,
    /// CA-signed serving certificate
    pub webhook_cert: CustomResource,
    /// Secret mounted by the controller pod
    pub tls_secret: CustomResource,
    /// Controller Deployment
    pub deployment: CustomResource,
    /// Mutating admission webhooks
    pub mutating_webhook: CustomResource,
    /// Validating admission webhooks
    pub validating_webhook: CustomResource,
    /// TargetGroupBinding CRD, when requested
    pub crds: Option<CustomResource>,
}

impl Resource for AwsLbControllerDeployment {
    fn urn(&self) -> &Urn {
        self.component.urn()
    }
}

impl AwsLbControllerDeployment {
    /// Declare every child resource of the component on `stack`.
    ///
    /// Nothing is created here; the declarations are realised by
    /// [`Stack::deploy`]. Fails on the first declaration that is rejected.
    pub fn new(
        stack: &mut Stack,
        name: &str,
        args: &ComponentArgs,
        opts: ResourceOptions,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::validation_for_field(
                "name",
                "component name must not be empty",
            ));
        }
        args.validate()?;

        let component = stack.register_component(COMPONENT_TYPE, name, opts)?;
        let labels = labels(name);

        let namespace = declare(
            stack,
            "namespace",
            &format!("{name}-ns"),
            Output::known(Namespace {
                metadata: ObjectMeta {
                    name: Some(args.namespace.clone()),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ResourceOptions::child_of(&component),
        )?;
        let ns_name = object_name(&namespace);

        let iam = iam::declare(stack, name, args, &component, &ns_name)?;

        let service_account =
            declare_service_account(stack, name, &labels, &namespace, &iam.role)?;

        let rbac = rbac::declare_all(
            stack,
            name,
            &labels,
            &component,
            &namespace,
            &service_account,
        )?;

        let ca = certs::declare_ca(stack, name, &component)?;
        let webhook_service = webhook::declare_service(stack, name, &labels, &namespace)?;
        let serving = certs::declare_serving(
            stack,
            name,
            &labels,
            &component,
            &namespace,
            &ca,
            &webhook_service,
        )?;

        let deployment = deployment::declare_deployment(
            stack,
            name,
            &args.cluster_name,
            &labels,
            &namespace,
            &service_account,
            &serving.secret,
        )?;

        let webhooks = webhook::declare_configurations(
            stack,
            name,
            &labels,
            &component,
            &webhook_service,
            &namespace,
            &ca.cert_pem(),
        )?;

        let crds = if args.install_crds {
            debug!(source = ?args.crd_source, "declaring CRDs");
            Some(declare_args(
                stack,
                "CRDs",
                ResourceType::ConfigFile,
                &format!("{name}-crds"),
                Output::known(ConfigFileArgs::target_group_bindings(args.crd_source)),
                ResourceOptions::child_of(&component),
            )?)
        } else {
            None
        };

        info!(component = %name, resources = stack.len(), "declared AWS Load Balancer Controller");

        Ok(Self {
            component,
            namespace,
            iam_role: iam.role,
            iam_policy: iam.policy,
            iam_policy_attachment: iam.attachment,
            service_account,
            cluster_role: rbac.cluster_role,
            cluster_role_binding: rbac.cluster_role_binding,
            role: rbac.role,
            role_binding: rbac.role_binding,
            ca_cert: ca.cert,
            webhook_service,
            webhook_cert: serving.cert,
            tls_secret: serving.secret,
            deployment,
            mutating_webhook: webhooks.mutating,
            validating_webhook: webhooks.validating,
            crds,
        })
    }

    /// Name the namespace resolves to
    pub fn namespace_name(&self) -> Output<String> {
        object_name(&self.namespace)
    }

    /// ARN of the controller role
    pub fn role_arn(&self) -> Output<String> {
        self.iam_role.output("/arn")
    }
}

fn declare_service_account(
    stack: &mut Stack,
    name: &str,
    labels: &BTreeMap<String, String>,
    namespace: &CustomResource,
    role: &CustomResource,
) -> Result<CustomResource> {
    let account_name = service_account_name(name);
    let labels = labels.clone();
    let body = object_name(namespace)
        .zip(&role.output::<String>("/arn"))
        .apply(move |(ns, role_arn)| {
            let mut meta = metadata(Some(account_name), Some(ns), &labels);
            meta.annotations = Some(BTreeMap::from([(ROLE_ARN_ANNOTATION.to_string(), role_arn)]));
            ServiceAccount {
                metadata: meta,
                ..Default::default()
            }
        });

    declare(
        stack,
        "service account",
        &service_account_name(name),
        body,
        ResourceOptions::child_of(namespace),
    )
}

//! Admission webhook Service and configurations

use std::collections::BTreeMap;

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;

use awslbc_common::{Result, SKIP_AWAIT_ANNOTATION};
use awslbc_resource::{ComponentResource, CustomResource, Output, ResourceOptions, Stack};

use crate::objects::{declare, metadata, object_name};

/// Port the Service exposes
pub const SERVICE_PORT: i32 = 443;

/// Port the controller's webhook server listens on
pub const WEBHOOK_PORT: i32 = 9443;

/// Namespace label that opts pods into readiness gate injection
pub const POD_READINESS_GATE_LABEL: &str = "elbv2.k8s.aws/pod-readiness-gate-inject";

const FAILURE_POLICY: &str = "Fail";
const SIDE_EFFECTS: &str = "None";
const ADMISSION_REVIEW_VERSION: &str = "v1beta1";

/// Where a webhook is served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEndpoint {
    /// Service name
    pub service: String,
    /// Service namespace
    pub namespace: String,
    /// PEM of the CA that signed the serving certificate
    pub ca_pem: String,
}

impl WebhookEndpoint {
    fn client_config(&self, path: &str) -> WebhookClientConfig {
        WebhookClientConfig {
            ca_bundle: Some(ByteString(self.ca_pem.as_bytes().to_vec())),
            service: Some(ServiceReference {
                name: self.service.clone(),
                namespace: self.namespace.clone(),
                path: Some(path.to_string()),
                port: None,
            }),
            url: None,
        }
    }
}

fn rule(group: &str, version: &str, operations: &[&str], resource: &str) -> RuleWithOperations {
    RuleWithOperations {
        api_groups: Some(vec![group.to_string()]),
        api_versions: Some(vec![version.to_string()]),
        operations: Some(operations.iter().map(|o| o.to_string()).collect()),
        resources: Some(vec![resource.to_string()]),
        scope: None,
    }
}

fn target_group_binding_rule() -> RuleWithOperations {
    rule("elbv2.k8s.aws", "v1beta1", &["CREATE", "UPDATE"], "targetgroupbindings")
}

/// The Service fronting the webhook server
pub fn webhook_service(namespace: String, labels: &BTreeMap<String, String>) -> Service {
    let mut meta = metadata(None, Some(namespace), labels);
    meta.annotations = Some(BTreeMap::from([(
        SKIP_AWAIT_ANNOTATION.to_string(),
        "true".to_string(),
    )]));

    Service {
        metadata: meta,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(vec![ServicePort {
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(WEBHOOK_PORT)),
                ..Default::default()
            }]),
            selector: Some(labels.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Mutating hooks for TargetGroupBindings and pod readiness gates
pub fn mutating_configuration(
    endpoint: &WebhookEndpoint,
    labels: &BTreeMap<String, String>,
) -> MutatingWebhookConfiguration {
    let hook = |name: &str, path: &str, rule: RuleWithOperations| MutatingWebhook {
        name: name.to_string(),
        client_config: endpoint.client_config(path),
        failure_policy: Some(FAILURE_POLICY.to_string()),
        side_effects: SIDE_EFFECTS.to_string(),
        admission_review_versions: vec![ADMISSION_REVIEW_VERSION.to_string()],
        rules: Some(vec![rule]),
        ..Default::default()
    };

    let target_group_binding = hook(
        "mtargetgroupbinding.elbv2.k8s.aws",
        "/mutate-elbv2-k8s-aws-v1beta1-targetgroupbinding",
        target_group_binding_rule(),
    );
    let pod = MutatingWebhook {
        namespace_selector: Some(LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: POD_READINESS_GATE_LABEL.to_string(),
                operator: "In".to_string(),
                values: Some(vec!["enabled".to_string()]),
            }]),
            match_labels: None,
        }),
        ..hook("mpod.elbv2.k8s.aws", "/mutate-v1-pod", rule("", "v1", &["CREATE"], "pods"))
    };

    MutatingWebhookConfiguration {
        metadata: metadata(None, None, labels),
        webhooks: Some(vec![target_group_binding, pod]),
    }
}

/// Validating hook for TargetGroupBindings
pub fn validating_configuration(
    endpoint: &WebhookEndpoint,
    labels: &BTreeMap<String, String>,
) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: metadata(None, None, labels),
        webhooks: Some(vec![ValidatingWebhook {
            name: "vtargetgroupbinding.elbv2.k8s.aws".to_string(),
            client_config: endpoint
                .client_config("/validate-elbv2-k8s-aws-v1beta1-targetgroupbinding"),
            failure_policy: Some(FAILURE_POLICY.to_string()),
            side_effects: SIDE_EFFECTS.to_string(),
            admission_review_versions: vec![ADMISSION_REVIEW_VERSION.to_string()],
            rules: Some(vec![target_group_binding_rule()]),
            ..Default::default()
        }]),
    }
}

pub(crate) fn declare_service(
    stack: &mut Stack,
    name: &str,
    labels: &BTreeMap<String, String>,
    namespace: &CustomResource,
) -> Result<CustomResource> {
    let labels = labels.clone();
    declare(
        stack,
        "Webhook Service",
        &format!("{name}-webhook-service"),
        object_name(namespace).apply(move |ns| webhook_service(ns, &labels)),
        ResourceOptions::child_of(namespace),
    )
}

pub(crate) struct WebhookConfigurations {
    pub mutating: CustomResource,
    pub validating: CustomResource,
}

pub(crate) fn declare_configurations(
    stack: &mut Stack,
    name: &str,
    labels: &BTreeMap<String, String>,
    component: &ComponentResource,
    service: &CustomResource,
    namespace: &CustomResource,
    ca_pem: &Output<String>,
) -> Result<WebhookConfigurations> {
    let endpoint = object_name(service)
        .zip(&object_name(namespace))
        .zip(ca_pem)
        .apply(|((service, namespace), ca_pem)| WebhookEndpoint {
            service,
            namespace,
            ca_pem,
        });

    let mutating_labels = labels.clone();
    let mutating = declare(
        stack,
        "mutating webhook",
        &format!("{name}-mutating-webhook"),
        endpoint.apply(move |e| mutating_configuration(&e, &mutating_labels)),
        ResourceOptions::child_of(component),
    )?;

    let validating_labels = labels.clone();
    let validating = declare(
        stack,
        "validating webhook",
        &format!("{name}-validating-webhook"),
        endpoint.apply(move |e| validating_configuration(&e, &validating_labels)),
        ResourceOptions::child_of(component),
    )?;

    Ok(WebhookConfigurations {
        mutating,
        validating,
    })
}

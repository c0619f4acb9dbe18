//! Controller Deployment

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, HTTPGetAction, PodSecurityContext, PodSpec, PodTemplateSpec, Probe,
    SecretVolumeSource, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use awslbc_common::Result;
use awslbc_infra::CONTROLLER_IMAGE;
use awslbc_resource::{CustomResource, ResourceOptions, Stack};

use crate::objects::{declare, metadata, object_name};
use crate::webhook::WEBHOOK_PORT;

/// Name of the controller container
pub const CONTAINER_NAME: &str = "aws-load-balancer-controller";

/// Region passed to the controller
pub const AWS_REGION: &str = "us-west-2";

/// IngressClass the controller reconciles
pub const INGRESS_CLASS: &str = "alb";

/// Where controller-runtime looks for serving certificates
pub const SERVING_CERT_DIR: &str = "/tmp/k8s-webhook-server/serving-certs";

/// Metrics port
pub const METRICS_PORT: i32 = 8080;

/// Health probe port
pub const HEALTH_PORT: i32 = 61779;

/// `nobody`
const FS_GROUP: i64 = 65534;

/// 0644
const SECRET_DEFAULT_MODE: i32 = 420;

const CERT_VOLUME: &str = "cert";

/// Command-line arguments of the controller
pub fn controller_args(cluster_name: &str) -> Vec<String> {
    vec![
        format!("--cluster-name={cluster_name}"),
        format!("--aws-region={AWS_REGION}"),
        format!("--ingress-class={INGRESS_CLASS}"),
    ]
}

/// Names the Deployment refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRefs {
    /// Namespace to run in
    pub namespace: String,
    /// Service account to run as
    pub service_account: String,
    /// Secret holding the serving certificate
    pub tls_secret: String,
}

fn port(name: &str, container_port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

fn controller_container(cluster_name: &str) -> Container {
    Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(CONTROLLER_IMAGE.to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec!["/controller".to_string()]),
        args: Some(controller_args(cluster_name)),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            read_only_root_filesystem: Some(true),
            run_as_non_root: Some(true),
            ..Default::default()
        }),
        volume_mounts: Some(vec![VolumeMount {
            name: CERT_VOLUME.to_string(),
            mount_path: SERVING_CERT_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        ports: Some(vec![
            port("webhook-server", WEBHOOK_PORT),
            port("metrics-server", METRICS_PORT),
        ]),
        liveness_probe: Some(Probe {
            failure_threshold: Some(2),
            http_get: Some(HTTPGetAction {
                path: Some("/healthz".to_string()),
                port: IntOrString::Int(HEALTH_PORT),
                scheme: Some("HTTP".to_string()),
                ..Default::default()
            }),
            initial_delay_seconds: Some(30),
            timeout_seconds: Some(10),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The single-replica controller Deployment
pub fn controller_deployment(
    cluster_name: &str,
    refs: DeploymentRefs,
    labels: &BTreeMap<String, String>,
) -> Deployment {
    Deployment {
        metadata: metadata(None, Some(refs.namespace), labels),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(refs.service_account),
                    volumes: Some(vec![Volume {
                        name: CERT_VOLUME.to_string(),
                        secret: Some(SecretVolumeSource {
                            default_mode: Some(SECRET_DEFAULT_MODE),
                            secret_name: Some(refs.tls_secret),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    security_context: Some(PodSecurityContext {
                        fs_group: Some(FS_GROUP),
                        ..Default::default()
                    }),
                    containers: vec![controller_container(cluster_name)],
                    termination_grace_period_seconds: Some(10),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn declare_deployment(
    stack: &mut Stack,
    name: &str,
    cluster_name: &str,
    labels: &BTreeMap<String, String>,
    namespace: &CustomResource,
    service_account: &CustomResource,
    tls_secret: &CustomResource,
) -> Result<CustomResource> {
    let cluster_name = cluster_name.to_string();
    let labels = labels.clone();
    let body = object_name(namespace)
        .zip(&object_name(service_account))
        .zip(&object_name(tls_secret))
        .apply(move |((namespace, service_account), tls_secret)| {
            controller_deployment(
                &cluster_name,
                DeploymentRefs {
                    namespace,
                    service_account,
                    tls_secret,
                },
                &labels,
            )
        });

    declare(
        stack,
        "Deployment",
        &format!("{name}-deployment"),
        body,
        ResourceOptions::child_of(namespace),
    )
}

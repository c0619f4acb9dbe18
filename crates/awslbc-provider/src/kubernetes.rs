//! Kubernetes objects applied to a live cluster
//!
//! Objects are server-side applied with the `awslbc` field manager. Deployments
//! are awaited until Available and Services until they have a ready endpoint,
//! unless the object carries the skip-await annotation.

use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use awslbc_common::kube_utils::{
    apply_manifests_with_discovery, apply_object, wait_for_deployment,
    wait_for_service_endpoints,
};
use awslbc_common::yaml::split_yaml_documents;
use awslbc_common::SKIP_AWAIT_ANNOTATION;
use awslbc_infra::crds::ConfigFileArgs;
use awslbc_resource::{CreateRequest, ProviderError, ResourceProvider, ResourceType};

use crate::manifest::ManifestFetcher;
use crate::{merge_outputs, named_object};

/// Settings for [`KubeProvider`]
#[derive(Debug, Clone)]
pub struct KubeProviderConfig {
    /// How long to wait for a Deployment or Service to become ready
    pub ready_timeout: Duration,
}

impl Default for KubeProviderConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(600),
        }
    }
}

/// Provider for the `kubernetes` package backed by a kube client
#[derive(Clone)]
pub struct KubeProvider {
    client: Client,
    fetcher: ManifestFetcher,
    config: KubeProviderConfig,
}

/// Whether readiness waiting was disabled on the object
pub fn skips_await(object: &Value) -> bool {
    object
        .pointer("/metadata/annotations")
        .and_then(|a| a.get(SKIP_AWAIT_ANNOTATION))
        .and_then(Value::as_str)
        == Some("true")
}

/// What to wait for after applying an object
#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    None,
    Deployment { name: String, namespace: String },
    ServiceEndpoints { name: String, namespace: String },
}

impl Readiness {
    fn of(kind: &str, object: &Value) -> Self {
        if skips_await(object) {
            return Self::None;
        }
        let field = |pointer: &str| object.pointer(pointer).and_then(Value::as_str);
        let (Some(name), Some(namespace)) = (field("/metadata/name"), field("/metadata/namespace"))
        else {
            return Self::None;
        };
        let (name, namespace) = (name.to_string(), namespace.to_string());
        match kind {
            "Deployment" => Self::Deployment { name, namespace },
            "Service" if field("/spec/type") != Some("ExternalName") => {
                Self::ServiceEndpoints { name, namespace }
            }
            _ => Self::None,
        }
    }
}

impl KubeProvider {
    /// Provider using `client`
    pub fn new(client: Client, config: KubeProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client,
            fetcher: ManifestFetcher::new()?,
            config,
        })
    }

    async fn apply(&self, request: &CreateRequest, kind: &str) -> Result<Value, ProviderError> {
        let object = named_object(request)?;
        let readiness = Readiness::of(kind, &object);

        let mut applied = apply_object(&self.client, object)
            .await
            .map_err(ProviderError::backend)?;
        if let Some(metadata) = applied
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
        {
            metadata.remove("managedFields");
        }

        let timeout = self.config.ready_timeout;
        match readiness {
            Readiness::Deployment { name, namespace } => {
                debug!(deployment = %name, namespace = %namespace, "waiting for availability");
                wait_for_deployment(&self.client, &name, &namespace, timeout)
                    .await
                    .map_err(ProviderError::backend)?;
            }
            Readiness::ServiceEndpoints { name, namespace } => {
                debug!(service = %name, namespace = %namespace, "waiting for endpoints");
                wait_for_service_endpoints(&self.client, &name, &namespace, timeout)
                    .await
                    .map_err(ProviderError::backend)?;
            }
            Readiness::None => {}
        }
        Ok(applied)
    }

    async fn apply_config_file(&self, request: &CreateRequest) -> Result<Value, ProviderError> {
        let args: ConfigFileArgs = request.inputs_as()?;
        let content = self.fetcher.load(&args.manifest).await?;
        let documents = split_yaml_documents(&content);

        let resources = apply_manifests_with_discovery(&self.client, &documents)
            .await
            .map_err(ProviderError::backend)?;
        info!(source = %args.describe(), count = resources.len(), "applied manifest file");
        merge_outputs(request, json!({ "resources": resources }))
    }
}

#[async_trait]
impl ResourceProvider for KubeProvider {
    async fn create(&self, request: &CreateRequest) -> Result<Value, ProviderError> {
        match &request.resource_type {
            ResourceType::Kubernetes { kind, .. } => self.apply(request, kind).await,
            ResourceType::ConfigFile => self.apply_config_file(request).await,
            _ => Err(ProviderError::unsupported("kubernetes", request)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_await_annotation_disables_waiting() {
        let service = json!({
            "metadata": {
                "name": "svc",
                "namespace": "ns",
                "annotations": {"awslbc.io/skip-await": "true"}
            },
            "spec": {"type": "ClusterIP"}
        });
        assert!(skips_await(&service));
        assert_eq!(Readiness::of("Service", &service), Readiness::None);
    }

    #[test]
    fn services_wait_for_endpoints() {
        let service = json!({"metadata": {"name": "svc", "namespace": "ns"}});
        assert_eq!(
            Readiness::of("Service", &service),
            Readiness::ServiceEndpoints {
                name: "svc".to_string(),
                namespace: "ns".to_string()
            }
        );
    }

    #[test]
    fn deployments_wait_for_availability() {
        let deployment = json!({"metadata": {"name": "d", "namespace": "ns"}});
        assert_eq!(
            Readiness::of("Deployment", &deployment),
            Readiness::Deployment {
                name: "d".to_string(),
                namespace: "ns".to_string()
            }
        );
    }

    #[test]
    fn other_kinds_and_cluster_scoped_objects_do_not_wait() {
        let secret = json!({"metadata": {"name": "s", "namespace": "ns"}});
        assert_eq!(Readiness::of("Secret", &secret), Readiness::None);

        let unscoped = json!({"metadata": {"name": "d"}});
        assert_eq!(Readiness::of("Deployment", &unscoped), Readiness::None);

        let annotated_false = json!({
            "metadata": {"name": "svc", "namespace": "ns", "annotations": {"awslbc.io/skip-await": "false"}}
        });
        assert!(!skips_await(&annotated_false));
    }
}

//! Helpers shared by the resource builders

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

use awslbc_common::{Error, Result, APP_INSTANCE_LABEL, APP_NAME_LABEL};
use awslbc_resource::{CustomResource, Output, ResourceOptions, ResourceType, Stack};

/// Value of `app.kubernetes.io/name` on every labelled object
pub const APP_NAME: &str = "aws-loadbalancer-controller";

/// Label set shared by every labelled object of one component instance
pub fn labels(instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_NAME_LABEL.to_string(), APP_NAME.to_string()),
        (APP_INSTANCE_LABEL.to_string(), instance.to_string()),
    ])
}

/// Metadata of a labelled object; `name` is left for the provider to assign when absent
pub(crate) fn metadata(
    name: Option<String>,
    namespace: Option<String>,
    labels: &BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name,
        namespace,
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

/// Register a typed Kubernetes object whose body is still pending.
///
/// `what` names the object in the error returned when registration fails.
pub(crate) fn declare<K>(
    stack: &mut Stack,
    what: &str,
    name: &str,
    object: Output<K>,
    opts: ResourceOptions,
) -> Result<CustomResource>
where
    K: k8s_openapi::Resource + Serialize + Clone + Send + Sync + 'static,
{
    let inputs = object.try_apply(serde_json::to_value);
    stack
        .register(ResourceType::kubernetes::<K>(), name, inputs, opts)
        .map_err(|e| Error::declaration(what, e))
}

/// Register a non-Kubernetes resource from a typed argument struct
pub(crate) fn declare_args<A>(
    stack: &mut Stack,
    what: &str,
    resource_type: ResourceType,
    name: &str,
    args: Output<A>,
    opts: ResourceOptions,
) -> Result<CustomResource>
where
    A: Serialize + Clone + Send + Sync + 'static,
{
    let inputs = args.try_apply(serde_json::to_value);
    stack
        .register(resource_type, name, inputs, opts)
        .map_err(|e| Error::declaration(what, e))
}

/// `metadata.name` as reported by the provider
pub(crate) fn object_name(resource: &CustomResource) -> Output<String> {
    resource.output("/metadata/name")
}

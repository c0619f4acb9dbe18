//! Providers for awslbc declarations
//!
//! Each provider handles one package of resource types:
//!
//! - [`tls`]: keys, certificate requests and certificates generated locally
//! - [`iam`]: IAM role and policy planning (names, ARNs, documents)
//! - [`preview`]: Kubernetes objects rendered without a cluster
//! - [`kubernetes`]: Kubernetes objects applied to a cluster with kube-rs
//! - [`composite`]: dispatch by package
//!
//! Providers return the resolved inputs merged with whatever they computed,
//! so downstream declarations can read either through an output property.

#![deny(missing_docs)]

pub mod composite;
pub mod iam;
pub mod kubernetes;
pub mod manifest;
pub mod preview;
pub mod tls;

pub use composite::ProviderSet;
pub use iam::IamPlanner;
pub use kubernetes::{KubeProvider, KubeProviderConfig};
pub use preview::PreviewKubernetes;
pub use tls::TlsProvider;

use serde::Serialize;
use serde_json::{Map, Value};

use awslbc_resource::naming::{auto_name, kubernetes_name_max, KUBERNETES_NAME_MAX};
use awslbc_resource::{CreateRequest, ProviderError};

/// Overlay `computed` on the request inputs.
///
/// Both must be JSON objects; computed keys win.
pub(crate) fn merge_outputs(
    request: &CreateRequest,
    computed: impl Serialize,
) -> Result<Value, ProviderError> {
    let computed = serde_json::to_value(computed).map_err(ProviderError::backend)?;
    let mut merged = match &request.inputs {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(ProviderError::InvalidInputs {
                urn: request.urn.clone(),
                message: format!("expected an object, got {other}"),
            })
        }
    };
    if let Value::Object(computed) = computed {
        merged.extend(computed);
    }
    Ok(Value::Object(merged))
}

/// The request's Kubernetes object, with `metadata.name` filled in from the
/// URN when the declaration did not set one
pub(crate) fn named_object(request: &CreateRequest) -> Result<Value, ProviderError> {
    let mut object = request.inputs.clone();
    let Some(map) = object.as_object_mut() else {
        return Err(ProviderError::InvalidInputs {
            urn: request.urn.clone(),
            message: "Kubernetes object must be a JSON object".to_string(),
        });
    };

    let metadata = map
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(metadata) = metadata.as_object_mut() else {
        return Err(ProviderError::InvalidInputs {
            urn: request.urn.clone(),
            message: "metadata must be an object".to_string(),
        });
    };
    if !metadata.get("name").is_some_and(|n| n.is_string()) {
        let max_len = request
            .resource_type
            .kind()
            .map_or(KUBERNETES_NAME_MAX, kubernetes_name_max);
        metadata.insert(
            "name".to_string(),
            Value::String(auto_name(&request.urn, max_len)),
        );
    }
    Ok(object)
}

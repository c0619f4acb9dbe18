//! Kubernetes objects rendered without a cluster
//!
//! Objects come back exactly as they would be submitted, with a physical name
//! assigned where the declaration left it out. ConfigFiles report the objects
//! they contain when the manifest is inline; remote manifests are not fetched.

use async_trait::async_trait;
use serde_json::{json, Value};

use awslbc_common::kube_utils::parse_manifest;
use awslbc_common::yaml::split_yaml_documents;
use awslbc_infra::crds::{ConfigFileArgs, ManifestSource};
use awslbc_resource::{CreateRequest, ProviderError, ResourceProvider, ResourceType};

use crate::{merge_outputs, named_object};

/// Provider for the `kubernetes` package that never contacts a cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewKubernetes;

impl PreviewKubernetes {
    /// New preview provider
    pub fn new() -> Self {
        Self
    }
}

/// `Kind/name` of every object in an inline manifest
pub(crate) fn inline_resources(
    request: &CreateRequest,
    content: &str,
) -> Result<Vec<String>, ProviderError> {
    split_yaml_documents(content)
        .iter()
        .map(|doc| {
            parse_manifest(doc)
                .map(|m| format!("{}/{}", m.api_resource.kind, m.name))
                .map_err(|e| ProviderError::InvalidInputs {
                    urn: request.urn.clone(),
                    message: e.to_string(),
                })
        })
        .collect()
}

#[async_trait]
impl ResourceProvider for PreviewKubernetes {
    async fn create(&self, request: &CreateRequest) -> Result<Value, ProviderError> {
        match &request.resource_type {
            ResourceType::Kubernetes { .. } => named_object(request),
            ResourceType::ConfigFile => {
                let args: ConfigFileArgs = request.inputs_as()?;
                let resources = match &args.manifest {
                    ManifestSource::Yaml { content } => inline_resources(request, content)?,
                    ManifestSource::File { .. } => Vec::new(),
                };
                merge_outputs(request, json!({ "resources": resources }))
            }
            _ => Err(ProviderError::unsupported("kubernetes-preview", request)),
        }
    }
}

//! Dispatch to one provider per package

use async_trait::async_trait;
use serde_json::Value;

use awslbc_resource::{CreateRequest, Package, ProviderError, ResourceProvider};

use crate::iam::IamPlanner;
use crate::kubernetes::KubeProvider;
use crate::preview::PreviewKubernetes;
use crate::tls::TlsProvider;

/// Routes each request to the provider for its package
pub struct ProviderSet {
    kubernetes: Box<dyn ResourceProvider>,
    aws: Box<dyn ResourceProvider>,
    tls: Box<dyn ResourceProvider>,
}

impl ProviderSet {
    /// Providers for an arbitrary combination of backends
    pub fn new(
        kubernetes: impl ResourceProvider + 'static,
        aws: impl ResourceProvider + 'static,
        tls: impl ResourceProvider + 'static,
    ) -> Self {
        Self {
            kubernetes: Box::new(kubernetes),
            aws: Box::new(aws),
            tls: Box::new(tls),
        }
    }

    /// Render everything locally: no cluster, no AWS
    pub fn preview(iam: IamPlanner) -> Self {
        Self::new(PreviewKubernetes::new(), iam, TlsProvider::new())
    }

    /// Apply Kubernetes objects to a cluster; IAM is still planned
    pub fn cluster(kube: KubeProvider, iam: IamPlanner) -> Self {
        Self::new(kube, iam, TlsProvider::new())
    }

    fn route(&self, package: Package) -> Option<&dyn ResourceProvider> {
        match package {
            Package::Kubernetes => Some(self.kubernetes.as_ref()),
            Package::Aws => Some(self.aws.as_ref()),
            Package::Tls => Some(self.tls.as_ref()),
            Package::Component => None,
        }
    }
}

#[async_trait]
impl ResourceProvider for ProviderSet {
    async fn create(&self, request: &CreateRequest) -> Result<Value, ProviderError> {
        match self.route(request.resource_type.package()) {
            Some(provider) => provider.create(request).await,
            None => Err(ProviderError::unsupported("composite", request)),
        }
    }
}

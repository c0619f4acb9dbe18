//! Provider seam
//!
//! A provider realises one declared resource from its resolved inputs and
//! returns the resource's outputs. Tests substitute mocks; production code
//! plugs in Kubernetes, IAM and TLS providers.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::types::ResourceType;
use crate::urn::Urn;

/// A resource whose inputs have all resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRequest {
    /// URN of the declaration
    pub urn: Urn,
    /// Declared type
    pub resource_type: ResourceType,
    /// Resolved input properties
    pub inputs: Value,
}

impl CreateRequest {
    /// Logical name of the declaration
    pub fn name(&self) -> &str {
        self.urn.name()
    }

    /// Deserialize the inputs into a typed argument struct
    pub fn inputs_as<T: DeserializeOwned>(&self) -> Result<T, ProviderError> {
        serde_json::from_value(self.inputs.clone()).map_err(|e| ProviderError::InvalidInputs {
            urn: self.urn.clone(),
            message: e.to_string(),
        })
    }
}

/// Provider failures
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not handle this resource type
    #[error("provider {provider} cannot create {resource_type}")]
    Unsupported {
        /// Name of the provider
        provider: &'static str,
        /// Token of the rejected type
        resource_type: String,
    },

    /// Inputs did not match what the resource type expects
    #[error("invalid inputs for {urn}: {message}")]
    InvalidInputs {
        /// The declaration
        urn: Urn,
        /// What was wrong
        message: String,
    },

    /// The backing platform rejected or failed the request
    #[error("{message}")]
    Backend {
        /// Platform message
        message: String,
    },
}

impl ProviderError {
    /// Create a backend error from any displayable cause
    pub fn backend(cause: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: cause.to_string(),
        }
    }

    /// Reject a request for a type this provider does not handle
    pub fn unsupported(provider: &'static str, request: &CreateRequest) -> Self {
        Self::Unsupported {
            provider,
            resource_type: request.resource_type.token(),
        }
    }
}

/// Realises declared resources
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Create (or converge) the resource and return its outputs
    async fn create(&self, request: &CreateRequest) -> Result<Value, ProviderError>;
}

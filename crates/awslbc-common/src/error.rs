//! Error types for awslbc
//!
//! Errors carry the resource or context they relate to so a failed
//! composition or deployment can be traced back to a single declaration.

use thiserror::Error;

/// Main error type for awslbc operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid component arguments or declaration inputs
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field (e.g., "namespace")
        field: Option<String>,
    },

    /// A child resource could not be declared
    #[error("error creating {resource}: {message}")]
    Declaration {
        /// Human-readable name of the failing declaration (e.g., "Webhook Service")
        resource: String,
        /// Underlying cause
        message: String,
    },

    /// A declared resource could not be realised by its provider
    #[error("deployment of {urn} failed: {message}")]
    Deployment {
        /// URN of the failing resource
        urn: String,
        /// Underlying cause
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "apply_manifest", "poll_until")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error pointing at a field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Wrap the cause of a failed child declaration
    pub fn declaration(resource: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Declaration {
            resource: resource.into(),
            message: cause.to_string(),
        }
    }

    /// Create a deployment error for a resource URN
    pub fn deployment(urn: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Deployment {
            urn: urn.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether retrying the failed operation could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube { source } => match source {
                kube::Error::Api(resp) => resp.code == 409 || resp.code == 429 || resp.code >= 500,
                _ => true,
            },
            Self::Internal { .. } => true,
            Self::Validation { .. }
            | Self::Declaration { .. }
            | Self::Deployment { .. }
            | Self::Serialization { .. } => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_error_names_the_resource() {
        let err = Error::declaration("Webhook Service", "name already registered");
        assert_eq!(
            err.to_string(),
            "error creating Webhook Service: name already registered"
        );
    }

    #[test]
    fn validation_error_keeps_field() {
        let err = Error::validation_for_field("namespace", "must not be empty");
        match err {
            Error::Validation { field, message } => {
                assert_eq!(field.as_deref(), Some("namespace"));
                assert_eq!(message, "must not be empty");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_operational_errors_are_retryable() {
        assert!(Error::internal_with_context("apply", "connection reset").is_retryable());
        assert!(!Error::validation("bad").is_retryable());
        assert!(!Error::deployment("urn:x", "rejected").is_retryable());
    }

    #[test]
    fn serde_errors_become_serialization_errors() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization { kind: None, .. }));
    }
}

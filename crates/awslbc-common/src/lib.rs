//! Common building blocks for awslbc: errors, YAML parsing, Kubernetes utilities,
//! retry with backoff, and telemetry setup.

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod retry;
pub mod telemetry;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for every server-side apply
pub const FIELD_MANAGER: &str = "awslbc";

/// Annotation that disables readiness waiting for a Kubernetes object
pub const SKIP_AWAIT_ANNOTATION: &str = "awslbc.io/skip-await";

/// Annotation carrying the IAM role assumed through IRSA
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

/// Label key naming the application
pub const APP_NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label key naming the component instance
pub const APP_INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

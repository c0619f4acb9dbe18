//! The AWS Load Balancer Controller as a single component
//!
//! [`AwsLbControllerDeployment::new`] declares, on a [`Stack`](awslbc_resource::Stack):
//!
//! - the controller namespace
//! - an IAM role trusted through the cluster's OIDC provider, with the controller policy attached
//! - a service account annotated with the role ARN, plus RBAC for it
//! - a self-signed CA and a CA-signed serving certificate for the webhook Service
//! - the controller Deployment
//! - mutating and validating webhook configurations trusting the CA
//! - optionally the TargetGroupBinding CRD
//!
//! Nothing is created until the stack is deployed through a provider.

#![deny(missing_docs)]

pub mod args;
pub mod certs;
pub mod component;
pub mod deployment;
pub mod iam;
pub mod objects;
pub mod rbac;
pub mod webhook;

pub use args::ComponentArgs;
pub use component::{AwsLbControllerDeployment, COMPONENT_TYPE};
pub use objects::labels;

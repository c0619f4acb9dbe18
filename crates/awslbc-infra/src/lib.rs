//! Static inputs for deploying the AWS Load Balancer Controller
//!
//! - [`pki`]: key, certificate request and certificate generation
//! - [`iam`]: the controller IAM policy and the IRSA trust policy
//! - [`rbac`]: ClusterRole and Role rule tables
//! - [`crds`]: CRD manifests and where to fetch them from
//!
//! Versions are pinned in the workspace `versions.toml` and baked in at build time.

#![deny(missing_docs)]

pub mod crds;
pub mod iam;
pub mod pki;
pub mod rbac;

/// Controller image, `repository:tag`
pub const CONTROLLER_IMAGE: &str = env!("CONTROLLER_IMAGE");

/// Controller release the image and CRDs belong to
pub const CONTROLLER_VERSION: &str = env!("CONTROLLER_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_pinned_to_release() {
        assert_eq!(
            CONTROLLER_IMAGE,
            format!("amazon/aws-alb-ingress-controller:{CONTROLLER_VERSION}")
        );
        assert!(CONTROLLER_VERSION.starts_with('v'));
    }
}

//! Component inputs

use serde::{Deserialize, Serialize};

use awslbc_common::{Error, Result};
use awslbc_infra::crds::CrdSource;

/// Longest DNS-1123 label
const DNS_LABEL_MAX: usize = 63;

/// Inputs of [`AwsLbControllerDeployment`](crate::AwsLbControllerDeployment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentArgs {
    /// Namespace to create and run the controller in
    pub namespace: String,
    /// EKS cluster name passed to the controller
    pub cluster_name: String,
    /// OIDC issuer; prefixes the `:sub` condition key of the trust policy
    pub oidc_issuer: String,
    /// OIDC provider; the federated principal of the trust policy
    pub oidc_provider: String,
    /// Whether to install the TargetGroupBinding CRD
    #[serde(default, rename = "installCRDs")]
    pub install_crds: bool,
    /// Where the CRD manifest comes from
    #[serde(default)]
    pub crd_source: CrdSource,
}

impl ComponentArgs {
    /// Check the arguments before anything is declared
    pub fn validate(&self) -> Result<()> {
        validate_dns_label("namespace", &self.namespace)?;
        for (field, value) in [
            ("clusterName", &self.cluster_name),
            ("oidcIssuer", &self.oidc_issuer),
            ("oidcProvider", &self.oidc_provider),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation_for_field(
                    field,
                    format!("{field} must not be empty"),
                ));
            }
        }
        Ok(())
    }
}

/// Lowercase alphanumerics and '-', starting and ending alphanumeric, at most 63 chars
pub fn validate_dns_label(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= DNS_LABEL_MAX
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !value.starts_with('-')
        && !value.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(Error::validation_for_field(
            field,
            format!("'{value}' is not a valid DNS-1123 label"),
        ))
    }
}

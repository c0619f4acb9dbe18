//! Resource type tokens

use std::fmt;

use serde::Serialize;

/// Which provider family realises a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Package {
    /// Component resources: logical grouping only
    Component,
    /// Kubernetes objects and manifest files
    Kubernetes,
    /// AWS IAM
    Aws,
    /// Locally generated keys and certificates
    Tls,
}

/// Type of a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "package", rename_all = "camelCase")]
pub enum ResourceType {
    /// A component grouping child resources, e.g. `awslbc:index:Deployment`
    Component {
        /// Full type token
        token: String,
    },
    /// A single Kubernetes object
    Kubernetes {
        /// apiVersion of the object
        api_version: String,
        /// kind of the object
        kind: String,
    },
    /// A multi-document manifest applied as a unit
    ConfigFile,
    /// `aws:iam/role:Role`
    IamRole,
    /// `aws:iam/policy:Policy`
    IamPolicy,
    /// `aws:iam/rolePolicyAttachment:RolePolicyAttachment`
    IamRolePolicyAttachment,
    /// `tls:index/privateKey:PrivateKey`
    TlsPrivateKey,
    /// `tls:index/selfSignedCert:SelfSignedCert`
    TlsSelfSignedCert,
    /// `tls:index/certRequest:CertRequest`
    TlsCertRequest,
    /// `tls:index/locallySignedCert:LocallySignedCert`
    TlsLocallySignedCert,
}

impl ResourceType {
    /// Component type with the given token
    pub fn component(token: impl Into<String>) -> Self {
        Self::Component {
            token: token.into(),
        }
    }

    /// Kubernetes type for a k8s-openapi resource
    pub fn kubernetes<K: k8s_openapi::Resource>() -> Self {
        Self::Kubernetes {
            api_version: K::API_VERSION.to_string(),
            kind: K::KIND.to_string(),
        }
    }

    /// Pulumi-style type token
    pub fn token(&self) -> String {
        match self {
            Self::Component { token } => token.clone(),
            Self::Kubernetes { api_version, kind } => {
                let api_version = if api_version.contains('/') {
                    api_version.clone()
                } else {
                    format!("core/{api_version}")
                };
                format!("kubernetes:{api_version}:{kind}")
            }
            Self::ConfigFile => "kubernetes:yaml:ConfigFile".to_string(),
            Self::IamRole => "aws:iam/role:Role".to_string(),
            Self::IamPolicy => "aws:iam/policy:Policy".to_string(),
            Self::IamRolePolicyAttachment => {
                "aws:iam/rolePolicyAttachment:RolePolicyAttachment".to_string()
            }
            Self::TlsPrivateKey => "tls:index/privateKey:PrivateKey".to_string(),
            Self::TlsSelfSignedCert => "tls:index/selfSignedCert:SelfSignedCert".to_string(),
            Self::TlsCertRequest => "tls:index/certRequest:CertRequest".to_string(),
            Self::TlsLocallySignedCert => {
                "tls:index/locallySignedCert:LocallySignedCert".to_string()
            }
        }
    }

    /// Provider family for this type
    pub fn package(&self) -> Package {
        match self {
            Self::Component { .. } => Package::Component,
            Self::Kubernetes { .. } | Self::ConfigFile => Package::Kubernetes,
            Self::IamRole | Self::IamPolicy | Self::IamRolePolicyAttachment => Package::Aws,
            Self::TlsPrivateKey
            | Self::TlsSelfSignedCert
            | Self::TlsCertRequest
            | Self::TlsLocallySignedCert => Package::Tls,
        }
    }

    /// Kubernetes kind, if this is a single Kubernetes object
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Kubernetes { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

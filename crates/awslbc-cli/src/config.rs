//! Component configuration from a YAML file, environment and flags.
//!
//! Resolution (highest priority first):
//! 1. Command-line flags
//! 2. `AWSLBC_*` environment variables (handled by clap)
//! 3. The file passed with `--config`
//!
//! `namespace`, `clusterName`, `oidcIssuer` and `oidcProvider` must come from
//! one of them. The component name defaults to [`DEFAULT_NAME`].

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Deserialize;

use awslbc_component::ComponentArgs;
use awslbc_infra::crds::CrdSource;

use crate::{Error, Result};

/// Component name used when none is configured
pub const DEFAULT_NAME: &str = "aws-lbc";

/// Contents of a `--config` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub cluster_name: Option<String>,
    pub oidc_issuer: Option<String>,
    pub oidc_provider: Option<String>,
    #[serde(rename = "installCRDs")]
    pub install_crds: Option<bool>,
    pub crd_source: Option<CrdSource>,
    /// AWS account the IAM ARNs are planned in
    pub account_id: Option<String>,
}

impl ConfigFile {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Flags shared by every command that composes the component
#[derive(Args, Debug, Clone, Default)]
pub struct ComponentFlags {
    /// YAML file with the component configuration
    #[arg(short = 'f', long = "config", env = "AWSLBC_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Component name; prefixes every child resource
    #[arg(long, env = "AWSLBC_NAME")]
    pub name: Option<String>,

    /// Namespace to create and run the controller in
    #[arg(long, env = "AWSLBC_NAMESPACE")]
    pub namespace: Option<String>,

    /// EKS cluster name
    #[arg(long, env = "AWSLBC_CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// OIDC issuer of the cluster (prefix of the `:sub` condition key)
    #[arg(long, env = "AWSLBC_OIDC_ISSUER")]
    pub oidc_issuer: Option<String>,

    /// OIDC provider of the cluster (federated principal)
    #[arg(long, env = "AWSLBC_OIDC_PROVIDER")]
    pub oidc_provider: Option<String>,

    /// Install the TargetGroupBinding CRD (`--install-crds=false` overrides the config file)
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub install_crds: Option<bool>,

    /// Where the CRD manifest comes from (remote or embedded)
    #[arg(long, env = "AWSLBC_CRD_SOURCE")]
    pub crd_source: Option<CrdSource>,

    /// AWS account for planned IAM ARNs
    #[arg(long, env = "AWSLBC_ACCOUNT_ID")]
    pub account_id: Option<String>,
}

/// Everything needed to compose and deploy the component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub name: String,
    pub args: ComponentArgs,
    pub account_id: Option<String>,
}

fn required(value: Option<String>, flag: &str, key: &str) -> Result<String> {
    value.ok_or_else(|| Error::validation(format!("missing --{flag} (or {key} in the config file)")))
}

impl ComponentFlags {
    /// Merge flags over the config file, if any
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let file = match &self.config_file {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        self.resolve_with(file)
    }

    fn resolve_with(&self, file: ConfigFile) -> Result<ResolvedConfig> {
        let pick = |flag: &Option<String>, file: Option<String>| flag.clone().or(file);

        let args = ComponentArgs {
            namespace: required(pick(&self.namespace, file.namespace), "namespace", "namespace")?,
            cluster_name: required(
                pick(&self.cluster_name, file.cluster_name),
                "cluster-name",
                "clusterName",
            )?,
            oidc_issuer: required(
                pick(&self.oidc_issuer, file.oidc_issuer),
                "oidc-issuer",
                "oidcIssuer",
            )?,
            oidc_provider: required(
                pick(&self.oidc_provider, file.oidc_provider),
                "oidc-provider",
                "oidcProvider",
            )?,
            install_crds: self.install_crds.or(file.install_crds).unwrap_or(false),
            crd_source: self.crd_source.or(file.crd_source).unwrap_or_default(),
        };

        Ok(ResolvedConfig {
            name: pick(&self.name, file.name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            args,
            account_id: pick(&self.account_id, file.account_id),
        })
    }
}

//! CRD manifests for the controller's custom resources
//!
//! TargetGroupBinding is installed by the component; IngressClassParams is
//! embedded for completeness and exposed through `awslbc assets crds`.

use serde::{Deserialize, Serialize};

/// TargetGroupBinding CRD as released with the pinned controller version
pub const TARGET_GROUP_BINDINGS_YAML: &str =
    include_str!("../assets/crds/elbv2.k8s.aws_targetgroupbindings.yaml");

/// IngressClassParams CRD
pub const INGRESS_CLASS_PARAMS_YAML: &str =
    include_str!("../assets/crds/elbv2.k8s.aws_ingressclassparams.yaml");

/// Git ref of the controller repository the remote CRDs are read from
pub const CRD_REF: &str = env!("CRD_REF");

const CRD_BASE_URL: &str = env!("CRD_BASE_URL");

/// Pinned raw URL of the TargetGroupBinding CRD
pub fn target_group_bindings_url() -> String {
    format!("{CRD_BASE_URL}/{CRD_REF}/config/crd/bases/elbv2.k8s.aws_targetgroupbindings.yaml")
}

/// Every embedded CRD as one multi-document stream
pub fn all_crds_yaml() -> String {
    format!("{TARGET_GROUP_BINDINGS_YAML}\n{INGRESS_CLASS_PARAMS_YAML}")
}

/// Where the TargetGroupBinding CRD is read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrdSource {
    /// Fetch the pinned URL at apply time
    #[default]
    Remote,
    /// Use the manifest compiled into the binary
    Embedded,
}

impl std::str::FromStr for CrdSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "embedded" => Ok(Self::Embedded),
            other => Err(format!(
                "unknown CRD source '{other}', expected 'remote' or 'embedded'"
            )),
        }
    }
}

/// Manifest contents of a ConfigFile resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ManifestSource {
    /// A URL fetched by the provider
    File {
        /// HTTP(S) location
        url: String,
    },
    /// Inline YAML
    Yaml {
        /// One or more documents
        content: String,
    },
}

/// Inputs of a ConfigFile resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFileArgs {
    /// What to apply
    #[serde(flatten)]
    pub manifest: ManifestSource,
}

impl ConfigFileArgs {
    /// ConfigFile for the TargetGroupBinding CRD
    pub fn target_group_bindings(source: CrdSource) -> Self {
        let manifest = match source {
            CrdSource::Remote => ManifestSource::File {
                url: target_group_bindings_url(),
            },
            CrdSource::Embedded => ManifestSource::Yaml {
                content: TARGET_GROUP_BINDINGS_YAML.to_string(),
            },
        };
        Self { manifest }
    }

    /// Human-readable origin, used in logs and reports
    pub fn describe(&self) -> &str {
        match &self.manifest {
            ManifestSource::File { url } => url,
            ManifestSource::Yaml { .. } => "<inline>",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awslbc_common::yaml::{parse_yaml_multi, split_yaml_documents};
    use serde_json::json;

    #[test]
    fn url_is_pinned_to_crd_ref() {
        let url = target_group_bindings_url();
        assert_eq!(
            url,
            format!(
                "https://raw.githubusercontent.com/kubernetes-sigs/aws-load-balancer-controller/{CRD_REF}/config/crd/bases/elbv2.k8s.aws_targetgroupbindings.yaml"
            )
        );
        assert!(!url.contains("/main/"));
    }

    #[test]
    fn embedded_crds_parse() {
        let docs = parse_yaml_multi(TARGET_GROUP_BINDINGS_YAML).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["kind"], "CustomResourceDefinition");
        assert_eq!(
            docs[0]["metadata"]["name"],
            "targetgroupbindings.elbv2.k8s.aws"
        );
        assert_eq!(docs[0]["spec"]["scope"], "Namespaced");

        let docs = parse_yaml_multi(INGRESS_CLASS_PARAMS_YAML).unwrap();
        assert_eq!(docs[0]["metadata"]["name"], "ingressclassparams.elbv2.k8s.aws");
        assert_eq!(docs[0]["spec"]["scope"], "Cluster");

        assert_eq!(split_yaml_documents(&all_crds_yaml()).len(), 2);
    }

    #[test]
    fn storage_version_is_v1beta1() {
        let docs = parse_yaml_multi(TARGET_GROUP_BINDINGS_YAML).unwrap();
        let versions = docs[0]["spec"]["versions"].as_array().unwrap();
        let storage: Vec<_> = versions
            .iter()
            .filter(|v| v["storage"] == true)
            .map(|v| v["name"].as_str().unwrap())
            .collect();
        assert_eq!(storage, vec!["v1beta1"]);
    }

    #[test]
    fn config_file_args_follow_source() {
        let remote = ConfigFileArgs::target_group_bindings(CrdSource::Remote);
        assert_eq!(
            serde_json::to_value(&remote).unwrap(),
            json!({"source": "file", "url": target_group_bindings_url()})
        );

        let embedded = ConfigFileArgs::target_group_bindings(CrdSource::Embedded);
        assert_eq!(embedded.describe(), "<inline>");
        let back: ConfigFileArgs =
            serde_json::from_value(serde_json::to_value(&embedded).unwrap()).unwrap();
        assert_eq!(back, embedded);
    }

    #[test]
    fn crd_source_parsing() {
        assert_eq!("remote".parse::<CrdSource>().unwrap(), CrdSource::Remote);
        assert_eq!("Embedded".parse::<CrdSource>().unwrap(), CrdSource::Embedded);
        assert!("git".parse::<CrdSource>().is_err());
        assert_eq!(CrdSource::default(), CrdSource::Remote);
    }
}

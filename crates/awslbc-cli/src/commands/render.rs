//! Render command - print manifests without a cluster
//!
//! The component is deployed against the preview providers: keys and
//! certificates are generated locally, Kubernetes objects are named but not
//! applied, IAM resources are planned. The result is a multi-document YAML
//! stream in apply order, followed by the IAM documents.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use serde_json::Value;
use tracing::info;

use awslbc_common::kube_utils::kind_priority;
use awslbc_common::yaml::{parse_yaml, split_yaml_documents};
use awslbc_infra::crds::{ConfigFileArgs, ManifestSource};
use awslbc_provider::ProviderSet;
use awslbc_resource::{DeploymentReport, ResourceType};

use super::{
    compose, iam_comments, iam_documents, iam_planner, write_iam_documents, CommandErrorExt,
};
use crate::config::{ComponentFlags, ResolvedConfig};
use crate::Result;

/// Render manifests and IAM documents
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub component: ComponentFlags,

    /// Write `manifests.yaml` and `iam/*.json` here instead of printing
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Deploy `config` against the preview providers
pub async fn preview(config: &ResolvedConfig) -> Result<DeploymentReport> {
    let stack = compose(config)?;
    let providers = ProviderSet::preview(iam_planner(config));
    Ok(stack.deploy(&providers).await?)
}

fn kind_of(object: &Value) -> &str {
    object.get("kind").and_then(Value::as_str).unwrap_or_default()
}

/// Kubernetes manifests of a deployment as one YAML stream.
///
/// Objects are ordered by apply priority; objects of the same priority keep
/// declaration order. Inline ConfigFiles contribute their documents; remote
/// ones are listed in a leading comment.
pub fn manifest_stream(report: &DeploymentReport) -> Result<String> {
    let mut objects: Vec<Value> = report.kubernetes_objects().cloned().collect();
    let mut remote = Vec::new();

    for resource in report
        .resources
        .iter()
        .filter(|r| r.resource_type == ResourceType::ConfigFile)
    {
        let args: ConfigFileArgs = serde_json::from_value(resource.inputs.clone())?;
        match args.manifest {
            ManifestSource::Yaml { content } => {
                for doc in split_yaml_documents(&content) {
                    objects.push(parse_yaml(&doc).cmd_err()?);
                }
            }
            ManifestSource::File { url } => remote.push(url),
        }
    }

    objects.sort_by_key(|o| kind_priority(kind_of(o)));

    let mut out = String::new();
    for url in &remote {
        let _ = writeln!(out, "# not rendered, apply separately: {url}");
    }
    for object in &objects {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(object)?);
    }
    Ok(out)
}

pub async fn run(args: RenderArgs) -> Result<()> {
    let config = args.component.resolve()?;
    let report = preview(&config).await?;

    let manifests = manifest_stream(&report)?;
    let documents = iam_documents(&report)?;

    match &args.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let manifest_path = dir.join("manifests.yaml");
            std::fs::write(&manifest_path, &manifests)?;
            let written = write_iam_documents(dir, &documents)?;
            info!(
                manifests = %manifest_path.display(),
                iam_documents = written.len(),
                "rendered"
            );
        }
        None => {
            print!("{manifests}");
            print!("{}", iam_comments(&documents));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use awslbc_component::ComponentArgs;
    use awslbc_infra::crds::CrdSource;

    fn config(crd_source: CrdSource) -> ResolvedConfig {
        ResolvedConfig {
            name: "lbc".to_string(),
            args: ComponentArgs {
                namespace: "lb-ns".to_string(),
                cluster_name: "c1".to_string(),
                oidc_issuer: "oidc.example/id/ABC".to_string(),
                oidc_provider: "oidc.example/id/ABC".to_string(),
                install_crds: true,
                crd_source,
            },
            account_id: Some("123456789012".to_string()),
        }
    }

    fn kinds(stream: &str) -> Vec<String> {
        stream
            .lines()
            .filter_map(|l| l.strip_prefix("kind: "))
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn stream_is_in_apply_order() {
        let report = preview(&config(CrdSource::Embedded)).await.unwrap();
        let stream = manifest_stream(&report).unwrap();
        assert_eq!(
            kinds(&stream),
            vec![
                "Namespace",
                "CustomResourceDefinition",
                "ServiceAccount",
                "ClusterRole",
                "Role",
                "ClusterRoleBinding",
                "RoleBinding",
                "Secret",
                "Service",
                "Deployment",
                "MutatingWebhookConfiguration",
                "ValidatingWebhookConfiguration",
            ]
        );
        assert!(!stream.contains("# not rendered"));
    }

    #[tokio::test]
    async fn remote_crds_are_listed_not_rendered() {
        let report = preview(&config(CrdSource::Remote)).await.unwrap();
        let stream = manifest_stream(&report).unwrap();
        assert!(stream.starts_with("# not rendered, apply separately: https://"));
        assert!(!kinds(&stream).contains(&"CustomResourceDefinition".to_string()));
    }

    #[tokio::test]
    async fn documents_parse_back() {
        let report = preview(&config(CrdSource::Remote)).await.unwrap();
        let stream = manifest_stream(&report).unwrap();
        for doc in split_yaml_documents(&stream) {
            let value = parse_yaml(&doc).unwrap();
            if value.is_null() {
                continue;
            }
            assert!(value.get("apiVersion").is_some(), "{doc}");
        }
    }

    #[tokio::test]
    async fn output_dir_receives_files() {
        let dir = tempfile::tempdir().unwrap();
        let component = ComponentFlags {
            name: Some("lbc".to_string()),
            namespace: Some("lb-ns".to_string()),
            cluster_name: Some("c1".to_string()),
            oidc_issuer: Some("i".to_string()),
            oidc_provider: Some("p".to_string()),
            ..Default::default()
        };

        run(RenderArgs {
            component,
            output_dir: Some(dir.path().to_path_buf()),
        })
        .await
        .unwrap();

        assert!(dir.path().join("manifests.yaml").is_file());
        let iam: Vec<_> = std::fs::read_dir(dir.path().join("iam"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(iam.len(), 3);
        assert!(iam.iter().any(|f| f.ends_with("-trust-policy.json")));
    }
}

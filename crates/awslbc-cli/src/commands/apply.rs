//! Apply command - deploy the component to a cluster
//!
//! Kubernetes objects are server-side applied and awaited. IAM resources are
//! planned only; their documents are printed (or written) for the operator.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tracing::info;

use awslbc_common::kube_utils::create_client;
use awslbc_provider::{KubeProvider, KubeProviderConfig, ProviderSet};
use awslbc_resource::DeploymentReport;

use super::format::table;
use super::{compose, iam_comments, iam_documents, iam_planner, write_iam_documents, CommandErrorExt};
use crate::config::ComponentFlags;
use crate::Result;

/// Apply to a cluster
#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub component: ComponentFlags,

    /// Kubeconfig to use (defaults to KUBECONFIG / ~/.kube/config)
    #[arg(long, env = "AWSLBC_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// How long to wait for each Deployment or Service to become ready
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// Write IAM documents to `<dir>/iam/` instead of printing them
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// One row per created resource: type, logical name, physical name
pub fn summary(report: &DeploymentReport) -> String {
    let rows: Vec<Vec<String>> = report
        .resources
        .iter()
        .map(|r| {
            let physical = r
                .outputs
                .pointer("/metadata/name")
                .or_else(|| r.outputs.get("arn"))
                .or_else(|| r.outputs.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or("-");
            vec![
                r.resource_type.token(),
                r.urn.name().to_string(),
                physical.to_string(),
            ]
        })
        .collect();
    table(&["TYPE", "NAME", "ID"], &rows)
}

pub async fn run(args: ApplyArgs) -> Result<()> {
    let config = args.component.resolve()?;
    let stack = compose(&config)?;

    let kube = KubeProvider::new(
        create_client(args.kubeconfig.as_deref()).await?,
        KubeProviderConfig {
            ready_timeout: Duration::from_secs(args.timeout_secs),
        },
    )
    .cmd_err()?;
    let providers = ProviderSet::cluster(kube, iam_planner(&config));

    info!(component = %config.name, namespace = %config.args.namespace, "applying");
    let report = stack.deploy(&providers).await?;

    print!("{}", summary(&report));

    let documents = iam_documents(&report)?;
    match &args.output_dir {
        Some(dir) => {
            for path in write_iam_documents(dir, &documents)? {
                println!("wrote {}", path.display());
            }
        }
        None => {
            println!();
            println!("# IAM resources are not created by awslbc; apply these out of band:");
            print!("{}", iam_comments(&documents));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use awslbc_resource::{AppliedResource, ResourceType, Urn};
    use k8s_openapi::api::core::v1::Namespace;
    use serde_json::json;

    #[test]
    fn summary_shows_physical_ids() {
        let ns = ResourceType::kubernetes::<Namespace>();
        let report = DeploymentReport {
            stack: "awslbc".to_string(),
            resources: vec![
                AppliedResource {
                    urn: Urn::new("awslbc", &ns.token(), "lbc-ns"),
                    resource_type: ns,
                    parent: None,
                    inputs: json!({}),
                    outputs: json!({"metadata": {"name": "lb-ns"}}),
                },
                AppliedResource {
                    urn: Urn::new("awslbc", "aws:iam/role:Role", "lbc-role"),
                    resource_type: ResourceType::IamRole,
                    parent: None,
                    inputs: json!({}),
                    outputs: json!({"arn": "arn:aws:iam::123456789012:role/r"}),
                },
            ],
        };
        let out = summary(&report);
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].starts_with("TYPE"));
        assert!(lines[1].ends_with("lb-ns"));
        assert!(lines[2].ends_with("arn:aws:iam::123456789012:role/r"));
    }
}

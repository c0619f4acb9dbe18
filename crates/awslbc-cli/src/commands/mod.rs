//! CLI commands

use std::fmt::{Display, Write as _};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use awslbc_component::AwsLbControllerDeployment;
use awslbc_provider::IamPlanner;
use awslbc_resource::{DeploymentReport, Package, ResourceOptions, ResourceType, Stack};

use crate::config::ResolvedConfig;
use crate::{Error, Result};

pub mod apply;
pub mod assets;
pub mod format;
pub mod graph;
pub mod render;

/// Stack every command declares the component on
pub const STACK_NAME: &str = "awslbc";

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Declare the component on a fresh stack
pub fn compose(config: &ResolvedConfig) -> Result<Stack> {
    let mut stack = Stack::new(STACK_NAME);
    AwsLbControllerDeployment::new(
        &mut stack,
        &config.name,
        &config.args,
        ResourceOptions::new(),
    )?;
    info!(component = %config.name, resources = stack.len(), "composed");
    Ok(stack)
}

/// IAM planner for the configured account
pub fn iam_planner(config: &ResolvedConfig) -> IamPlanner {
    match &config.account_id {
        Some(account) => IamPlanner::with_account(account.clone()),
        None => IamPlanner::new(),
    }
}

/// An IAM document the operator applies out of band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamDocument {
    /// File name under `iam/`
    pub file_name: String,
    /// One-line description
    pub description: String,
    /// Pretty-printed JSON
    pub json: String,
}

fn pretty(document: &str) -> Result<String> {
    let value: Value = serde_json::from_str(document)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

fn output_str<'a>(outputs: &'a Value, key: &str) -> Result<&'a str> {
    outputs
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::command_failed(format!("IAM output {key} missing")))
}

/// IAM role trust policies, policies and attachments from a deployment
pub fn iam_documents(report: &DeploymentReport) -> Result<Vec<IamDocument>> {
    let mut documents = Vec::new();
    for resource in report.of_package(Package::Aws) {
        let outputs = &resource.outputs;
        match resource.resource_type {
            ResourceType::IamRole => {
                let name = output_str(outputs, "name")?;
                documents.push(IamDocument {
                    file_name: format!("{name}-trust-policy.json"),
                    description: format!("trust policy of role {}", output_str(outputs, "arn")?),
                    json: pretty(output_str(outputs, "assumeRolePolicy")?)?,
                });
            }
            ResourceType::IamPolicy => {
                let name = output_str(outputs, "name")?;
                documents.push(IamDocument {
                    file_name: format!("{name}.json"),
                    description: format!("policy {}", output_str(outputs, "arn")?),
                    json: pretty(output_str(outputs, "policy")?)?,
                });
            }
            ResourceType::IamRolePolicyAttachment => {
                let role = output_str(outputs, "role")?;
                documents.push(IamDocument {
                    file_name: format!("{role}-attachment.json"),
                    description: format!("attach policy to role {role}"),
                    json: serde_json::to_string_pretty(outputs)?,
                });
            }
            _ => {}
        }
    }
    Ok(documents)
}

/// IAM documents as a YAML comment block
pub fn iam_comments(documents: &[IamDocument]) -> String {
    let mut out = String::new();
    for doc in documents {
        let _ = writeln!(out, "# {} ({})", doc.description, doc.file_name);
        for line in doc.json.lines() {
            let _ = writeln!(out, "#   {line}");
        }
    }
    out
}

/// Write IAM documents to `<dir>/iam/`
pub fn write_iam_documents(dir: &Path, documents: &[IamDocument]) -> Result<Vec<PathBuf>> {
    let iam_dir = dir.join("iam");
    std::fs::create_dir_all(&iam_dir)?;
    documents
        .iter()
        .map(|doc| -> Result<PathBuf> {
            let path = iam_dir.join(&doc.file_name);
            std::fs::write(&path, format!("{}\n", doc.json))?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use awslbc_resource::{AppliedResource, Urn};
    use serde_json::json;

    fn applied(resource_type: ResourceType, name: &str, outputs: Value) -> AppliedResource {
        AppliedResource {
            urn: Urn::new(STACK_NAME, &resource_type.token(), name),
            resource_type,
            parent: None,
            inputs: json!({}),
            outputs,
        }
    }

    fn report() -> DeploymentReport {
        DeploymentReport {
            stack: STACK_NAME.to_string(),
            resources: vec![
                applied(
                    ResourceType::IamRole,
                    "lbc-role",
                    json!({
                        "name": "lbc-role-abc1234",
                        "arn": "arn:aws:iam::123456789012:role/lbc-role-abc1234",
                        "assumeRolePolicy": "{\"Version\":\"2012-10-17\"}"
                    }),
                ),
                applied(
                    ResourceType::IamPolicy,
                    "lbc-policy",
                    json!({
                        "name": "lbc-policy-def5678",
                        "arn": "arn:aws:iam::123456789012:policy/lbc-policy-def5678",
                        "policy": "{\"Statement\":[]}"
                    }),
                ),
                applied(
                    ResourceType::IamRolePolicyAttachment,
                    "lbc-policy-attachment",
                    json!({
                        "role": "lbc-role-abc1234",
                        "policyArn": "arn:aws:iam::123456789012:policy/lbc-policy-def5678",
                        "id": "lbc-role-abc1234-0011aabb"
                    }),
                ),
            ],
        }
    }

    #[test]
    fn one_document_per_iam_resource() {
        let docs = iam_documents(&report()).unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "lbc-role-abc1234-trust-policy.json",
                "lbc-policy-def5678.json",
                "lbc-role-abc1234-attachment.json"
            ]
        );
        assert_eq!(docs[0].json, "{\n  \"Version\": \"2012-10-17\"\n}");
    }

    #[test]
    fn comments_prefix_every_line() {
        let comments = iam_comments(&iam_documents(&report()).unwrap());
        assert!(comments.lines().all(|l| l.starts_with('#')));
        assert!(comments.contains("# trust policy of role arn:aws:iam::123456789012:role/lbc-role-abc1234"));
    }

    #[test]
    fn documents_are_written_under_iam() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_iam_documents(dir.path(), &iam_documents(&report()).unwrap()).unwrap();
        assert_eq!(paths.len(), 3);
        for path in paths {
            assert!(path.starts_with(dir.path().join("iam")));
            let written: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
            assert!(written.is_object());
        }
    }

    #[test]
    fn missing_outputs_are_reported() {
        let report = DeploymentReport {
            stack: STACK_NAME.to_string(),
            resources: vec![applied(ResourceType::IamRole, "r", json!({"name": "r"}))],
        };
        assert!(iam_documents(&report).is_err());
    }
}

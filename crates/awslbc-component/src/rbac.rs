//! ClusterRole, Role and their bindings to the controller service account

use std::collections::BTreeMap;

use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding, RoleRef, Subject};

use awslbc_common::Result;
use awslbc_infra::rbac;
use awslbc_resource::{ComponentResource, CustomResource, Output, ResourceOptions, Stack};

use crate::objects::{declare, metadata, object_name};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

pub(crate) struct RbacResources {
    pub cluster_role: CustomResource,
    pub cluster_role_binding: CustomResource,
    pub role: CustomResource,
    pub role_binding: CustomResource,
}

fn role_ref(kind: &str, name: String) -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: kind.to_string(),
        name,
    }
}

fn service_account_subject(name: String, namespace: String) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name,
        namespace: Some(namespace),
        ..Default::default()
    }
}

pub(crate) fn declare_all(
    stack: &mut Stack,
    name: &str,
    labels: &BTreeMap<String, String>,
    component: &ComponentResource,
    namespace: &CustomResource,
    service_account: &CustomResource,
) -> Result<RbacResources> {
    let rules = rbac::rules();
    let ns_name = object_name(namespace);
    let subject = object_name(service_account)
        .zip(&ns_name)
        .apply(|(sa, ns)| service_account_subject(sa, ns));

    let cluster_role = declare(
        stack,
        "cluster role",
        &format!("{name}-clusterrole"),
        Output::known(ClusterRole {
            metadata: metadata(None, None, labels),
            rules: Some(rules.cluster_rules.clone()),
            ..Default::default()
        }),
        ResourceOptions::child_of(component),
    )?;

    let binding_labels = labels.clone();
    let cluster_role_binding = declare(
        stack,
        "cluster role binding",
        &format!("{name}-clusterrole-binding"),
        object_name(&cluster_role)
            .zip(&subject)
            .apply(move |(role_name, subject)| ClusterRoleBinding {
                metadata: metadata(None, None, &binding_labels),
                role_ref: role_ref("ClusterRole", role_name),
                subjects: Some(vec![subject]),
            }),
        ResourceOptions::child_of(&cluster_role),
    )?;

    let role_labels = labels.clone();
    let namespaced_rules = rules.namespaced_rules.clone();
    let role = declare(
        stack,
        "kubernetes role",
        &format!("{name}-role"),
        ns_name.apply(move |ns| Role {
            metadata: metadata(None, Some(ns), &role_labels),
            rules: Some(namespaced_rules),
        }),
        ResourceOptions::child_of(namespace),
    )?;

    let binding_labels = labels.clone();
    let role_binding = declare(
        stack,
        "role binding",
        &format!("{name}-rolebinding"),
        object_name(&role)
            .zip(&subject)
            .zip(&ns_name)
            .apply(move |((role_name, subject), ns)| RoleBinding {
                metadata: metadata(None, Some(ns), &binding_labels),
                role_ref: role_ref("Role", role_name),
                subjects: Some(vec![subject]),
            }),
        ResourceOptions::child_of(&role),
    )?;

    Ok(RbacResources {
        cluster_role,
        cluster_role_binding,
        role,
        role_binding,
    })
}

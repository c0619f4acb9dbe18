//! Declaration-time behaviour of the component
//!
//! These tests only look at what gets declared on the stack: which resources
//! exist, how they are parented and what they wait for. Nothing is deployed.

use awslbc_common::Error;
use awslbc_component::{AwsLbControllerDeployment, ComponentArgs, COMPONENT_TYPE};
use awslbc_infra::crds::CrdSource;
use awslbc_resource::{
    DeclaredGraph, GraphNode, Output, Resource, ResourceOptions, ResourceType, Stack,
};
use k8s_openapi::api::core::v1::Namespace;
use serde_json::json;

// =============================================================================
// Test Fixtures
// =============================================================================

const NAMESPACE: &str = "kubernetes:core/v1:Namespace";
const SERVICE_ACCOUNT: &str = "kubernetes:core/v1:ServiceAccount";
const SERVICE: &str = "kubernetes:core/v1:Service";
const SECRET: &str = "kubernetes:core/v1:Secret";
const DEPLOYMENT: &str = "kubernetes:apps/v1:Deployment";
const CLUSTER_ROLE: &str = "kubernetes:rbac.authorization.k8s.io/v1:ClusterRole";
const CLUSTER_ROLE_BINDING: &str = "kubernetes:rbac.authorization.k8s.io/v1:ClusterRoleBinding";
const ROLE: &str = "kubernetes:rbac.authorization.k8s.io/v1:Role";
const ROLE_BINDING: &str = "kubernetes:rbac.authorization.k8s.io/v1:RoleBinding";
const MUTATING: &str = "kubernetes:admissionregistration.k8s.io/v1:MutatingWebhookConfiguration";
const VALIDATING: &str =
    "kubernetes:admissionregistration.k8s.io/v1:ValidatingWebhookConfiguration";
const CONFIG_FILE: &str = "kubernetes:yaml:ConfigFile";
const IAM_ROLE: &str = "aws:iam/role:Role";
const IAM_POLICY: &str = "aws:iam/policy:Policy";
const IAM_ATTACHMENT: &str = "aws:iam/rolePolicyAttachment:RolePolicyAttachment";
const PRIVATE_KEY: &str = "tls:index/privateKey:PrivateKey";
const SELF_SIGNED: &str = "tls:index/selfSignedCert:SelfSignedCert";
const CERT_REQUEST: &str = "tls:index/certRequest:CertRequest";
const LOCALLY_SIGNED: &str = "tls:index/locallySignedCert:LocallySignedCert";

fn args(install_crds: bool) -> ComponentArgs {
    ComponentArgs {
        namespace: "lb-ns".to_string(),
        cluster_name: "c1".to_string(),
        oidc_issuer: "oidc.example/id/ABC".to_string(),
        oidc_provider: "oidc.example/id/ABC".to_string(),
        install_crds,
        crd_source: CrdSource::Remote,
    }
}

fn declared(install_crds: bool) -> DeclaredGraph {
    let mut stack = Stack::new("dev");
    AwsLbControllerDeployment::new(&mut stack, "lbc", &args(install_crds), ResourceOptions::new())
        .unwrap();
    stack.graph()
}

fn node<'a>(graph: &'a DeclaredGraph, token: &str, name: &str) -> &'a GraphNode {
    graph
        .nodes
        .iter()
        .find(|n| n.type_token == token && n.urn.name() == name)
        .unwrap_or_else(|| panic!("{token} {name} not declared"))
}

fn parent_of<'a>(graph: &'a DeclaredGraph, child: &GraphNode) -> &'a GraphNode {
    let parent = child.parent.as_ref().expect("resource has no parent");
    graph.node(parent).expect("parent not declared")
}

// =============================================================================
// Resource Set
// =============================================================================

#[test]
fn declares_every_resource_once() {
    let graph = declared(true);

    for (token, name) in [
        (COMPONENT_TYPE, "lbc"),
        (NAMESPACE, "lbc-ns"),
        (IAM_ROLE, "lbc-role"),
        (IAM_POLICY, "lbc-policy"),
        (IAM_ATTACHMENT, "lbc-policy-attachment"),
        (SERVICE_ACCOUNT, "lbc-serviceaccount"),
        (CLUSTER_ROLE, "lbc-clusterrole"),
        (CLUSTER_ROLE_BINDING, "lbc-clusterrole-binding"),
        (ROLE, "lbc-role"),
        (ROLE_BINDING, "lbc-rolebinding"),
        (PRIVATE_KEY, "lbc-ca-privatekey"),
        (SELF_SIGNED, "lbc-cacert"),
        (SERVICE, "lbc-webhook-service"),
        (PRIVATE_KEY, "lbc-webhook-privatekey"),
        (CERT_REQUEST, "lbc-webhook-cert-request"),
        (LOCALLY_SIGNED, "lbc-webhook-certificate"),
        (SECRET, "lbc-tls-secret"),
        (DEPLOYMENT, "lbc-deployment"),
        (MUTATING, "lbc-mutating-webhook"),
        (VALIDATING, "lbc-validating-webhook"),
        (CONFIG_FILE, "lbc-crds"),
    ] {
        node(&graph, token, name);
    }
    assert_eq!(graph.nodes.len(), 21);
}

#[test]
fn crds_follow_install_flag() {
    assert_eq!(declared(true).of_type(CONFIG_FILE).count(), 1);
    assert_eq!(declared(false).of_type(CONFIG_FILE).count(), 0);
    assert_eq!(declared(false).nodes.len(), 20);
}

#[test]
fn same_inputs_declare_the_same_graph() {
    assert_eq!(declared(true), declared(true));
    assert_eq!(declared(true).render_tree(), declared(true).render_tree());
}

// =============================================================================
// Parent Tree
// =============================================================================

#[test]
fn top_level_children_hang_off_the_component() {
    let graph = declared(true);
    let component = node(&graph, COMPONENT_TYPE, "lbc");
    assert!(component.parent.is_none());

    for (token, name) in [
        (NAMESPACE, "lbc-ns"),
        (IAM_ROLE, "lbc-role"),
        (CLUSTER_ROLE, "lbc-clusterrole"),
        (PRIVATE_KEY, "lbc-ca-privatekey"),
        (PRIVATE_KEY, "lbc-webhook-privatekey"),
        (MUTATING, "lbc-mutating-webhook"),
        (VALIDATING, "lbc-validating-webhook"),
        (CONFIG_FILE, "lbc-crds"),
    ] {
        assert_eq!(
            parent_of(&graph, node(&graph, token, name)).urn,
            component.urn,
            "{name}"
        );
    }
}

#[test]
fn chains_are_parented_on_their_predecessor() {
    let graph = declared(false);

    for ((token, name), (parent_token, parent_name)) in [
        ((IAM_POLICY, "lbc-policy"), (IAM_ROLE, "lbc-role")),
        ((IAM_ATTACHMENT, "lbc-policy-attachment"), (IAM_POLICY, "lbc-policy")),
        ((SERVICE_ACCOUNT, "lbc-serviceaccount"), (NAMESPACE, "lbc-ns")),
        ((CLUSTER_ROLE_BINDING, "lbc-clusterrole-binding"), (CLUSTER_ROLE, "lbc-clusterrole")),
        ((ROLE, "lbc-role"), (NAMESPACE, "lbc-ns")),
        ((ROLE_BINDING, "lbc-rolebinding"), (ROLE, "lbc-role")),
        ((SELF_SIGNED, "lbc-cacert"), (PRIVATE_KEY, "lbc-ca-privatekey")),
        ((SERVICE, "lbc-webhook-service"), (NAMESPACE, "lbc-ns")),
        ((CERT_REQUEST, "lbc-webhook-cert-request"), (PRIVATE_KEY, "lbc-webhook-privatekey")),
        ((LOCALLY_SIGNED, "lbc-webhook-certificate"), (CERT_REQUEST, "lbc-webhook-cert-request")),
        ((SECRET, "lbc-tls-secret"), (NAMESPACE, "lbc-ns")),
        ((DEPLOYMENT, "lbc-deployment"), (NAMESPACE, "lbc-ns")),
    ] {
        assert_eq!(
            parent_of(&graph, node(&graph, token, name)).urn,
            node(&graph, parent_token, parent_name).urn,
            "{name}"
        );
    }
}

#[test]
fn secret_waits_for_the_whole_chain() {
    let graph = declared(false);
    let secret = node(&graph, SECRET, "lbc-tls-secret");
    for (token, name) in [
        (PRIVATE_KEY, "lbc-webhook-privatekey"),
        (CERT_REQUEST, "lbc-webhook-cert-request"),
        (LOCALLY_SIGNED, "lbc-webhook-certificate"),
        (SELF_SIGNED, "lbc-cacert"),
    ] {
        assert!(
            secret.dependencies.contains(&node(&graph, token, name).urn),
            "secret does not wait for {name}"
        );
    }
}

#[test]
fn webhooks_wait_for_ca_and_service() {
    let graph = declared(false);
    let ca = &node(&graph, SELF_SIGNED, "lbc-cacert").urn;
    let service = &node(&graph, SERVICE, "lbc-webhook-service").urn;
    for name in ["lbc-mutating-webhook", "lbc-validating-webhook"] {
        let token = if name.contains("mutating") { MUTATING } else { VALIDATING };
        let hook = node(&graph, token, name);
        assert!(hook.dependencies.contains(ca));
        assert!(hook.dependencies.contains(service));
    }
}

#[test]
fn tree_renders_nested() {
    let tree = declared(false).render_tree();
    let first = tree.lines().next().unwrap();
    assert_eq!(first, format!("lbc ({COMPONENT_TYPE})"));
    assert!(tree.contains("\n  lbc-ns (kubernetes:core/v1:Namespace)\n"));
    assert!(tree.contains("\n    lbc-serviceaccount (kubernetes:core/v1:ServiceAccount)"));
}

#[test]
fn component_can_be_nested() {
    let mut stack = Stack::new("dev");
    let outer = stack
        .register_component("platform:index:Addons", "addons", ResourceOptions::new())
        .unwrap();
    let lbc = AwsLbControllerDeployment::new(
        &mut stack,
        "lbc",
        &args(false),
        ResourceOptions::child_of(&outer),
    )
    .unwrap();

    let graph = stack.graph();
    let ancestors: Vec<_> = graph
        .ancestors(lbc.namespace.urn())
        .into_iter()
        .map(|n| n.urn.name().to_string())
        .collect();
    assert_eq!(ancestors, vec!["lbc", "addons"]);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn invalid_args_declare_nothing() {
    let mut stack = Stack::new("dev");
    let bad = ComponentArgs {
        namespace: "Not_A_Label".to_string(),
        ..args(false)
    };
    let err = AwsLbControllerDeployment::new(&mut stack, "lbc", &bad, ResourceOptions::new())
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(stack.is_empty());

    let err = AwsLbControllerDeployment::new(&mut stack, "", &args(false), ResourceOptions::new())
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn failed_child_names_the_resource() {
    let mut stack = Stack::new("dev");
    // Occupy the URN the component's namespace will want
    let other = stack
        .register_component(COMPONENT_TYPE, "other", ResourceOptions::new())
        .unwrap();
    stack
        .register(
            ResourceType::kubernetes::<Namespace>(),
            "lbc-ns",
            Output::known(json!({"metadata": {"name": "taken"}})),
            ResourceOptions::child_of(&other),
        )
        .unwrap();

    let err = AwsLbControllerDeployment::new(&mut stack, "lbc", &args(false), ResourceOptions::new())
        .unwrap_err();
    assert!(matches!(err, Error::Declaration { .. }));
    assert!(
        err.to_string().starts_with("error creating namespace: "),
        "{err}"
    );
}

#[test]
fn second_instance_with_same_name_is_rejected() {
    let mut stack = Stack::new("dev");
    AwsLbControllerDeployment::new(&mut stack, "lbc", &args(false), ResourceOptions::new())
        .unwrap();
    assert!(
        AwsLbControllerDeployment::new(&mut stack, "lbc", &args(false), ResourceOptions::new())
            .is_err()
    );
}

#[test]
fn args_load_from_yaml() {
    let parsed: ComponentArgs = serde_yaml::from_str(
        "namespace: lb-ns\n\
         clusterName: c1\n\
         oidcIssuer: oidc.example/id/ABC\n\
         oidcProvider: oidc.example/id/ABC\n\
         installCRDs: true\n",
    )
    .unwrap();
    assert_eq!(parsed, args(true));
}

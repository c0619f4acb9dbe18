//! Kubernetes utilities built on kube-rs
//!
//! Server-side apply of untyped objects, manifest parsing, API discovery and
//! readiness polling. Every apply uses the `awslbc` field manager with force.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::{ApiResource, Discovery};
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::retry::{retry_with_backoff, RetryConfig};
use crate::{Error, FIELD_MANAGER};

/// The "Available" condition type for deployments
pub const CONDITION_AVAILABLE: &str = "Available";
/// The "True" status value for conditions
pub const STATUS_TRUE: &str = "True";

/// Default polling interval for wait operations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path.
///
/// Without a path the config is inferred (in-cluster or `$KUBECONFIG`).
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Poll `check_fn` until it returns `Ok(true)` or `timeout` elapses.
///
/// Errors from `check_fn` are treated as "not yet" and polling continues.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let start = std::time::Instant::now();
    let timeout_msg = timeout_msg.into();

    loop {
        if start.elapsed() > timeout {
            return Err(Error::internal_with_context("poll_until", timeout_msg));
        }

        match check_fn().await {
            Ok(true) => return Ok(()),
            Ok(false) => trace!("condition not yet met"),
            Err(e) => trace!(error = %e, "polling check failed, retrying"),
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Wait for a Deployment to report `Available=True`
pub async fn wait_for_deployment(
    client: &Client,
    name: &str,
    namespace: &str,
    timeout: Duration,
) -> Result<(), Error> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    poll_until(
        timeout,
        DEFAULT_POLL_INTERVAL,
        format!("timeout waiting for deployment {namespace}/{name} to be available"),
        || {
            let deployments = deployments.clone();
            async move {
                match deployments.get_opt(name).await? {
                    Some(deployment) => Ok(deployment
                        .status
                        .and_then(|s| s.conditions)
                        .unwrap_or_default()
                        .iter()
                        .any(|c| c.type_ == CONDITION_AVAILABLE && c.status == STATUS_TRUE)),
                    None => Ok(false),
                }
            }
        },
    )
    .await
}

/// Wait until a Service has at least one ready endpoint
pub async fn wait_for_service_endpoints(
    client: &Client,
    name: &str,
    namespace: &str,
    timeout: Duration,
) -> Result<(), Error> {
    let slices: Api<EndpointSlice> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().labels(&format!("kubernetes.io/service-name={name}"));

    poll_until(
        timeout,
        DEFAULT_POLL_INTERVAL,
        format!("timeout waiting for endpoints of service {namespace}/{name}"),
        || {
            let slices = slices.clone();
            let params = params.clone();
            async move {
                let list = slices.list(&params).await?;
                Ok(list.items.iter().flat_map(|s| s.endpoints.iter()).any(|ep| {
                    ep.conditions
                        .as_ref()
                        .and_then(|c| c.ready)
                        .unwrap_or(false)
                }))
            }
        },
    )
    .await
}

/// Parsed manifest ready for server-side apply
#[derive(Debug, Clone)]
pub struct ManifestMetadata {
    /// The object body
    pub value: Value,
    /// metadata.name
    pub name: String,
    /// metadata.namespace; absent for cluster-scoped objects
    pub namespace: Option<String>,
    /// API resource resolved from apiVersion/kind
    pub api_resource: ApiResource,
}

impl ManifestMetadata {
    /// Extract apply metadata from an object body
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let field = |pointer: &str| value.pointer(pointer).and_then(|v| v.as_str());

        let api_version = field("/apiVersion").ok_or_else(|| {
            Error::internal_with_context("parse_manifest", "manifest missing apiVersion")
        })?;
        let kind = field("/kind")
            .ok_or_else(|| Error::internal_with_context("parse_manifest", "manifest missing kind"))?;
        let name = field("/metadata/name")
            .ok_or_else(|| {
                Error::internal_with_context("parse_manifest", "manifest missing metadata.name")
            })?
            .to_string();
        let namespace = field("/metadata/namespace").map(str::to_string);
        let api_resource = build_api_resource(api_version, kind);

        Ok(Self {
            value,
            name,
            namespace,
            api_resource,
        })
    }

    fn api(&self, client: &Client) -> Api<DynamicObject> {
        match &self.namespace {
            Some(ns) => Api::namespaced_with(client.clone(), ns, &self.api_resource),
            None => Api::all_with(client.clone(), &self.api_resource),
        }
    }
}

/// Parse a YAML or JSON manifest
pub fn parse_manifest(manifest: &str) -> Result<ManifestMetadata, Error> {
    let value: Value = if manifest.trim_start().starts_with('{') {
        serde_json::from_str(manifest).map_err(|e| {
            Error::internal_with_context(
                "parse_manifest",
                format!("failed to parse manifest as JSON: {}", e),
            )
        })?
    } else {
        crate::yaml::parse_yaml(manifest).map_err(|e| {
            Error::internal_with_context(
                "parse_manifest",
                format!("failed to parse manifest as YAML: {}", e),
            )
        })?
    };
    ManifestMetadata::from_value(value)
}

/// Split an apiVersion into (group, version)
///
/// ```
/// use awslbc_common::kube_utils::parse_api_version;
///
/// assert_eq!(parse_api_version("apps/v1"), ("apps".to_string(), "v1".to_string()));
/// assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from an explicit apiVersion and kind
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Kinds whose plural is not a plain suffix
const KIND_PLURALS: &[(&str, &str)] = &[
    ("endpoints", "endpoints"),
    ("ingressclassparams", "ingressclassparams"),
    ("networkpolicy", "networkpolicies"),
];

/// Pluralize a Kubernetes kind the way the API server names its resources
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Server-side apply an object and return the object as stored by the API server
pub async fn apply_object(client: &Client, object: Value) -> Result<Value, Error> {
    let manifest = ManifestMetadata::from_value(object)?;
    let params = PatchParams::apply(FIELD_MANAGER).force();

    let applied = manifest
        .api(client)
        .patch(&manifest.name, &params, &Patch::Apply(&manifest.value))
        .await
        .map_err(|e| {
            Error::internal_with_context(
                "apply_object",
                format!(
                    "failed to apply {}/{}: {}",
                    manifest.api_resource.kind, manifest.name, e
                ),
            )
        })?;

    debug!(
        kind = %manifest.api_resource.kind,
        name = %manifest.name,
        namespace = ?manifest.namespace,
        "applied object"
    );
    Ok(serde_json::to_value(applied)?)
}

/// Server-side apply a manifest, resolving its type through discovery.
///
/// Returns `kind/name` of the applied object.
pub async fn apply_manifest_with_discovery(
    client: &Client,
    discovery: &Discovery,
    manifest: &str,
) -> Result<String, Error> {
    let parsed = parse_manifest(manifest)?;
    let (group, version) = parse_api_version(&parsed.api_resource.api_version);
    let gvk = kube::api::GroupVersionKind {
        group,
        version,
        kind: parsed.api_resource.kind.clone(),
    };

    let Some((api_resource, _)) = discovery.resolve_gvk(&gvk) else {
        return Err(Error::internal_with_context(
            "apply_manifest_with_discovery",
            format!(
                "unknown resource type: {}/{}",
                parsed.api_resource.api_version, parsed.api_resource.kind
            ),
        ));
    };

    let api: Api<DynamicObject> = match &parsed.namespace {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &api_resource),
        None => Api::all_with(client.clone(), &api_resource),
    };
    let params = PatchParams::apply(FIELD_MANAGER).force();
    api.patch(&parsed.name, &params, &Patch::Apply(&parsed.value))
        .await
        .map_err(|e| {
            Error::internal_with_context(
                "apply_manifest_with_discovery",
                format!("failed to apply {}/{}: {}", gvk.kind, parsed.name, e),
            )
        })?;

    trace!(kind = %gvk.kind, name = %parsed.name, "applied manifest");
    Ok(format!("{}/{}", gvk.kind, parsed.name))
}

/// Run API discovery, retrying while aggregated APIs settle
async fn run_discovery(client: &Client) -> Result<Discovery, Error> {
    let config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_secs(1),
        ..RetryConfig::default()
    };
    retry_with_backoff(&config, "api-discovery", || {
        let client = client.clone();
        async move {
            Discovery::new(client)
                .run()
                .await
                .map_err(|e| Error::internal_with_context("api-discovery", e.to_string()))
        }
    })
    .await
}

/// Apply a set of manifests in kind-priority order.
///
/// Namespaces and CRDs go first; discovery is re-run after CRDs are applied so
/// custom resources in the same set resolve. Returns `kind/name` of every
/// applied object.
pub async fn apply_manifests_with_discovery(
    client: &Client,
    manifests: &[impl AsRef<str>],
) -> Result<Vec<String>, Error> {
    let (mut foundational, mut rest): (Vec<&str>, Vec<&str>) =
        manifests.iter().map(|m| m.as_ref()).partition(|m| {
            matches!(extract_kind(m), "Namespace" | "CustomResourceDefinition")
        });
    foundational.sort_by_key(|m| kind_priority(extract_kind(m)));
    rest.sort_by_key(|m| kind_priority(extract_kind(m)));

    let mut applied = Vec::with_capacity(manifests.len());
    if foundational.is_empty() && rest.is_empty() {
        return Ok(applied);
    }

    let mut discovery = run_discovery(client).await?;
    for manifest in &foundational {
        applied.push(apply_manifest_with_discovery(client, &discovery, manifest).await?);
    }

    if !rest.is_empty() {
        if foundational
            .iter()
            .any(|m| extract_kind(m) == "CustomResourceDefinition")
        {
            discovery = run_discovery(client).await?;
        }
        for manifest in &rest {
            match apply_manifest_with_discovery(client, &discovery, manifest).await {
                Ok(id) => applied.push(id),
                Err(e) => {
                    warn!(error = %e, kind = %extract_kind(manifest), "manifest apply failed");
                    return Err(e);
                }
            }
        }
    }

    Ok(applied)
}

/// Apply order for a kind (lower = apply first)
pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "CustomResourceDefinition" => 1,
        "ServiceAccount" => 2,
        "ClusterRole" | "Role" => 3,
        "ClusterRoleBinding" | "RoleBinding" => 4,
        "ConfigMap" | "Secret" => 5,
        "Service" => 6,
        "Deployment" | "DaemonSet" | "StatefulSet" => 7,
        "MutatingWebhookConfiguration" | "ValidatingWebhookConfiguration" => 8,
        _ => 9,
    }
}

/// Extract the kind from a YAML or pretty-printed JSON manifest without parsing it
pub fn extract_kind(manifest: &str) -> &str {
    for line in manifest.lines() {
        let trimmed = line.trim();

        if let Some(value) = trimmed.strip_prefix("kind:") {
            return value.trim();
        }

        if let Some(rest) = trimmed.strip_prefix("\"kind\":") {
            let rest = rest.trim().trim_start_matches('"');
            if let Some(end) = rest.find('"') {
                return &rest[..end];
            }
        }
    }

    ""
}

/// Truncated SHA-256 of `input` as lowercase hex (16 chars).
///
/// Stable across toolchains, so it can be used for names that must not change
/// between runs.
pub fn deterministic_hash(input: &str) -> String {
    use aws_lc_rs::digest;
    use std::fmt::Write;

    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hash.as_ref()[..8]
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        })
}

//! Declaring and deploying resources
//!
//! Registration is synchronous and validates the declaration against what is
//! already on the stack: names must be unique, parents and explicit
//! dependencies must already be declared. Because outputs can only come from
//! resources that are already declared, the dependency graph cannot contain a
//! cycle.

use std::collections::{BTreeSet, HashMap};

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use awslbc_common::{Error, Result};

use crate::graph::{DeclaredGraph, GraphNode};
use crate::output::{Output, OutputError};
use crate::provider::{CreateRequest, ResourceProvider};
use crate::types::{Package, ResourceType};
use crate::urn::Urn;

/// Anything that has been registered on a stack
pub trait Resource {
    /// URN of the declaration
    fn urn(&self) -> &Urn;
}

/// Parent and explicit dependencies of a declaration
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    parent: Option<Urn>,
    depends_on: Vec<Urn>,
}

impl ResourceOptions {
    /// Options with no parent and no explicit dependencies
    pub fn new() -> Self {
        Self::default()
    }

    /// Options parented to `resource`
    pub fn child_of(resource: &(impl Resource + ?Sized)) -> Self {
        Self::new().parent(resource)
    }

    /// Set the parent
    pub fn parent(mut self, resource: &(impl Resource + ?Sized)) -> Self {
        self.parent = Some(resource.urn().clone());
        self
    }

    /// Add an explicit dependency
    pub fn depends_on(mut self, resource: &(impl Resource + ?Sized)) -> Self {
        self.depends_on.push(resource.urn().clone());
        self
    }
}

/// A registered component
#[derive(Debug, Clone)]
pub struct ComponentResource {
    urn: Urn,
}

impl Resource for ComponentResource {
    fn urn(&self) -> &Urn {
        &self.urn
    }
}

/// A registered resource realised by a provider
#[derive(Debug, Clone)]
pub struct CustomResource {
    urn: Urn,
    outputs: Output<Value>,
}

impl CustomResource {
    /// All outputs reported by the provider
    pub fn outputs(&self) -> &Output<Value> {
        &self.outputs
    }

    /// A single output property addressed by JSON pointer
    pub fn output<T>(&self, pointer: &str) -> Output<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.outputs.property(pointer)
    }
}

impl Resource for CustomResource {
    fn urn(&self) -> &Urn {
        &self.urn
    }
}

struct Declaration {
    urn: Urn,
    resource_type: ResourceType,
    parent: Option<Urn>,
    depends_on: BTreeSet<Urn>,
    inputs: Option<Output<Value>>,
    outputs: Output<Value>,
    resolver: Option<oneshot::Sender<std::result::Result<Value, OutputError>>>,
}

impl Declaration {
    /// Every URN that must be created before this declaration
    fn prerequisites(&self) -> BTreeSet<Urn> {
        let mut all: BTreeSet<Urn> = self.depends_on.clone();
        all.extend(self.parent.iter().cloned());
        if let Some(inputs) = &self.inputs {
            all.extend(inputs.dependencies().iter().cloned());
        }
        all
    }
}

/// Result of realising one declaration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedResource {
    /// URN of the declaration
    pub urn: Urn,
    /// Declared type
    pub resource_type: ResourceType,
    /// Parent declaration
    pub parent: Option<Urn>,
    /// Resolved inputs handed to the provider
    pub inputs: Value,
    /// Outputs returned by the provider
    pub outputs: Value,
}

/// Everything a deployment created, in declaration order
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    /// Stack name
    pub stack: String,
    /// Realised resources
    pub resources: Vec<AppliedResource>,
}

impl DeploymentReport {
    /// Look up a resource by URN
    pub fn find(&self, urn: &Urn) -> Option<&AppliedResource> {
        self.resources.iter().find(|r| &r.urn == urn)
    }

    /// Resources realised by one provider family
    pub fn of_package(&self, package: Package) -> impl Iterator<Item = &AppliedResource> {
        self.resources
            .iter()
            .filter(move |r| r.resource_type.package() == package)
    }

    /// Outputs of every single Kubernetes object
    pub fn kubernetes_objects(&self) -> impl Iterator<Item = &Value> {
        self.resources
            .iter()
            .filter(|r| matches!(r.resource_type, ResourceType::Kubernetes { .. }))
            .map(|r| &r.outputs)
    }
}

/// A set of declarations that deploy together
pub struct Stack {
    name: String,
    declarations: Vec<Declaration>,
    index: HashMap<Urn, usize>,
}

impl Stack {
    /// Empty stack
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Stack name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declarations
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Register a component resource
    pub fn register_component(
        &mut self,
        token: &str,
        name: &str,
        opts: ResourceOptions,
    ) -> Result<ComponentResource> {
        let resource_type = ResourceType::component(token);
        let urn = self.validate(&resource_type, name, &opts)?;
        self.push(Declaration {
            urn: urn.clone(),
            resource_type,
            parent: opts.parent,
            depends_on: opts.depends_on.into_iter().collect(),
            inputs: None,
            outputs: Output::known(json!({})),
            resolver: None,
        });
        Ok(ComponentResource { urn })
    }

    /// Register a resource realised by a provider
    pub fn register(
        &mut self,
        resource_type: ResourceType,
        name: &str,
        inputs: Output<Value>,
        opts: ResourceOptions,
    ) -> Result<CustomResource> {
        if resource_type.package() == Package::Component {
            return Err(Error::validation(format!(
                "{name}: component types must be registered with register_component"
            )));
        }
        let urn = self.validate(&resource_type, name, &opts)?;

        if let Some(unknown) = inputs
            .dependencies()
            .iter()
            .find(|d| !self.index.contains_key(*d))
        {
            return Err(Error::validation(format!(
                "{name}: inputs depend on {unknown}, which is not declared on stack {}",
                self.name
            )));
        }

        let (tx, rx) = oneshot::channel();
        let owner = urn.clone();
        let outputs = Output::from_future(
            async move {
                rx.await
                    .unwrap_or(Err(OutputError::Abandoned { urn: owner }))
            },
            BTreeSet::from([urn.clone()]),
        );

        self.push(Declaration {
            urn: urn.clone(),
            resource_type,
            parent: opts.parent,
            depends_on: opts.depends_on.into_iter().collect(),
            inputs: Some(inputs),
            outputs: outputs.clone(),
            resolver: Some(tx),
        });
        Ok(CustomResource { urn, outputs })
    }

    fn validate(
        &self,
        resource_type: &ResourceType,
        name: &str,
        opts: &ResourceOptions,
    ) -> Result<Urn> {
        if name.is_empty() {
            return Err(Error::validation_for_field(
                "name",
                "resource name must not be empty",
            ));
        }
        if name.contains("::") {
            return Err(Error::validation_for_field(
                "name",
                format!("resource name {name} must not contain '::'"),
            ));
        }

        let qualified_type = match &opts.parent {
            Some(parent) => {
                if !self.index.contains_key(parent) {
                    return Err(Error::validation(format!(
                        "{name}: parent {parent} is not declared on stack {}",
                        self.name
                    )));
                }
                format!("{}${}", parent.qualified_type(), resource_type.token())
            }
            None => resource_type.token(),
        };

        if let Some(missing) = opts.depends_on.iter().find(|d| !self.index.contains_key(*d)) {
            return Err(Error::validation(format!(
                "{name}: dependency {missing} is not declared on stack {}",
                self.name
            )));
        }

        let urn = Urn::new(&self.name, &qualified_type, name);
        if self.index.contains_key(&urn) {
            return Err(Error::validation(format!("duplicate resource {urn}")));
        }
        Ok(urn)
    }

    fn push(&mut self, declaration: Declaration) {
        debug!(urn = %declaration.urn, "declared resource");
        self.index
            .insert(declaration.urn.clone(), self.declarations.len());
        self.declarations.push(declaration);
    }

    /// Snapshot of what has been declared
    pub fn graph(&self) -> DeclaredGraph {
        DeclaredGraph {
            stack: self.name.clone(),
            nodes: self
                .declarations
                .iter()
                .map(|d| GraphNode {
                    urn: d.urn.clone(),
                    type_token: d.resource_type.token(),
                    parent: d.parent.clone(),
                    dependencies: d.prerequisites(),
                })
                .collect(),
        }
    }

    /// Realise every declaration through `provider`.
    ///
    /// Declarations run concurrently; each waits for its prerequisites. A
    /// failed resource fails everything that depends on it, and the first
    /// root-cause failure in declaration order is returned.
    pub async fn deploy<P>(mut self, provider: &P) -> Result<DeploymentReport>
    where
        P: ResourceProvider + ?Sized,
    {
        let outputs: HashMap<Urn, Output<Value>> = self
            .declarations
            .iter()
            .map(|d| (d.urn.clone(), d.outputs.clone()))
            .collect();

        info!(stack = %self.name, resources = self.declarations.len(), "deploying stack");

        let tasks = self.declarations.iter_mut().map(|decl| {
            let waits: Vec<Output<Value>> = decl
                .parent
                .iter()
                .chain(decl.depends_on.iter())
                .filter_map(|u| outputs.get(u).cloned())
                .collect();
            let resolver = decl.resolver.take();
            let urn = decl.urn.clone();
            let resource_type = decl.resource_type.clone();
            let parent = decl.parent.clone();
            let inputs = decl.inputs.clone();

            async move {
                let result = realise(provider, urn, resource_type, parent, inputs, waits).await;
                if let Some(resolver) = resolver {
                    let _ = resolver.send(match &result {
                        Ok(applied) => Ok(applied.outputs.clone()),
                        Err(e) => Err(e.clone()),
                    });
                }
                result
            }
        });

        let results = join_all(tasks).await;

        let mut resources = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (decl, result) in self.declarations.iter().zip(results) {
            match result {
                Ok(applied) => resources.push(applied),
                Err(e) => failures.push((decl.urn.clone(), e)),
            }
        }

        if failures.is_empty() {
            info!(stack = %self.name, resources = resources.len(), "stack deployed");
            return Ok(DeploymentReport {
                stack: self.name,
                resources,
            });
        }

        for (urn, e) in &failures {
            warn!(urn = %urn, error = %e, "resource not deployed");
        }
        let (urn, cause) = failures
            .iter()
            .find(|(urn, e)| matches!(e, OutputError::Failed { urn: source, .. } if source == urn))
            .unwrap_or(&failures[0]);
        Err(Error::deployment(
            urn.as_str(),
            format!("{cause} ({} resources not deployed)", failures.len()),
        ))
    }
}

async fn realise<P>(
    provider: &P,
    urn: Urn,
    resource_type: ResourceType,
    parent: Option<Urn>,
    inputs: Option<Output<Value>>,
    waits: Vec<Output<Value>>,
) -> std::result::Result<AppliedResource, OutputError>
where
    P: ResourceProvider + ?Sized,
{
    for prerequisite in &waits {
        prerequisite.resolve().await?;
    }

    let Some(inputs) = inputs else {
        return Ok(AppliedResource {
            urn,
            resource_type,
            parent,
            inputs: json!({}),
            outputs: json!({}),
        });
    };
    let inputs = inputs.resolve().await?;

    let request = CreateRequest {
        urn: urn.clone(),
        resource_type,
        inputs,
    };
    let outputs = provider
        .create(&request)
        .await
        .map_err(|e| OutputError::Failed {
            urn: urn.clone(),
            message: e.to_string(),
        })?;

    info!(urn = %urn, resource_type = %request.resource_type, "resource created");
    Ok(AppliedResource {
        urn,
        resource_type: request.resource_type,
        parent,
        inputs: request.inputs,
        outputs,
    })
}

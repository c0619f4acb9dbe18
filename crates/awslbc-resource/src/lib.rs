//! Resource model for awslbc
//!
//! A [`Stack`] collects resource declarations. Declarations reference each
//! other through [`Output`] values that only resolve once the referenced
//! resource has been created by a [`ResourceProvider`]. `Stack::deploy` drives
//! every declaration concurrently, each one waiting on its parent, explicit
//! dependencies and inputs.
//!
//! - [`output`]: deferred values and their combinators
//! - [`stack`]: declaration, validation and deployment
//! - [`graph`]: snapshot of the declared graph
//! - [`provider`]: the seam to whatever realises resources
//! - [`naming`]: deterministic physical names

#![deny(missing_docs)]

pub mod graph;
pub mod naming;
pub mod output;
pub mod provider;
pub mod stack;
pub mod types;
pub mod urn;

pub use graph::{DeclaredGraph, GraphNode};
pub use output::{Output, OutputError};
pub use provider::{CreateRequest, ProviderError, ResourceProvider};
pub use stack::{
    AppliedResource, ComponentResource, CustomResource, DeploymentReport, Resource,
    ResourceOptions, Stack,
};
pub use types::{Package, ResourceType};
pub use urn::Urn;

//! Deferred values
//!
//! An [`Output`] is a value that may not exist yet: the ARN of a role that has
//! not been created, the name a namespace will be given. Outputs are cheap to
//! clone and resolve at most once; every clone observes the same result.
//! Each output remembers the URNs of the resources it was derived from.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::urn::Urn;

/// Why an output could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// The resource producing the value was never deployed
    #[error("{urn} was dropped before its outputs were resolved")]
    Abandoned {
        /// The producing resource
        urn: Urn,
    },

    /// The resource producing the value failed
    #[error("{urn} failed: {message}")]
    Failed {
        /// The failing resource
        urn: Urn,
        /// Provider message
        message: String,
    },

    /// A transform applied to a resolved value failed
    #[error("output transform failed: {0}")]
    Apply(String),

    /// A property lookup found nothing at the pointer
    #[error("output property {pointer} is missing or has the wrong type")]
    MissingProperty {
        /// JSON pointer that was looked up
        pointer: String,
    },
}

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, OutputError>>>;

/// A lazily resolved, shareable value
pub struct Output<T> {
    value: SharedResult<T>,
    dependencies: Arc<BTreeSet<Urn>>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output that is already resolved
    pub fn known(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)), BTreeSet::new())
    }

    pub(crate) fn from_future<F>(fut: F, dependencies: BTreeSet<Urn>) -> Self
    where
        F: Future<Output = Result<T, OutputError>> + Send + 'static,
    {
        Self {
            value: fut.boxed().shared(),
            dependencies: Arc::new(dependencies),
        }
    }

    /// URNs of the resources this value is derived from
    pub fn dependencies(&self) -> &BTreeSet<Urn> {
        &self.dependencies
    }

    /// Wait for the value
    pub async fn resolve(&self) -> Result<T, OutputError> {
        self.value.clone().await
    }

    /// Transform the value once it resolves
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Output::from_future(
            self.value.clone().map(|r| r.map(f)),
            (*self.dependencies).clone(),
        )
    }

    /// Transform the value with a fallible function
    pub fn try_apply<U, E, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        E: fmt::Display + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        Output::from_future(
            self.value
                .clone()
                .map(|r| r.and_then(|v| f(v).map_err(|e| OutputError::Apply(e.to_string())))),
            (*self.dependencies).clone(),
        )
    }

    /// Combine two outputs; resolves once both have resolved
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();
        Output::from_future(
            future::try_join(self.value.clone(), other.value.clone()),
            dependencies,
        )
    }

    /// Collect many outputs into one
    pub fn all(outputs: impl IntoIterator<Item = Output<T>>) -> Output<Vec<T>> {
        let outputs: Vec<Output<T>> = outputs.into_iter().collect();
        let dependencies = outputs
            .iter()
            .flat_map(|o| o.dependencies.iter().cloned())
            .collect();
        Output::from_future(
            future::try_join_all(outputs.into_iter().map(|o| o.value)),
            dependencies,
        )
    }
}

impl Output<Value> {
    /// Deserialize the value found at a JSON pointer
    pub fn property<U>(&self, pointer: &str) -> Output<U>
    where
        U: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let pointer = pointer.to_string();
        Output::from_future(
            self.value.clone().map(move |r| {
                r.and_then(|v| {
                    v.pointer(&pointer)
                        .cloned()
                        .and_then(|found| serde_json::from_value(found).ok())
                        .ok_or(OutputError::MissingProperty { pointer })
                })
            }),
            (*self.dependencies).clone(),
        )
    }
}

impl<T> From<T> for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Self::known(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn pending<T: Clone + Send + Sync + 'static>(
        urn: &Urn,
    ) -> (Output<T>, oneshot::Sender<Result<T, OutputError>>) {
        let (tx, rx) = oneshot::channel();
        let owner = urn.clone();
        let output = Output::from_future(
            async move { rx.await.unwrap_or(Err(OutputError::Abandoned { urn: owner })) },
            BTreeSet::from([urn.clone()]),
        );
        (output, tx)
    }

    fn urn(name: &str) -> Urn {
        Urn::new("test", "kubernetes:core/v1:Service", name)
    }

    #[tokio::test]
    async fn known_values_resolve_immediately() {
        let out = Output::known(7u32);
        assert_eq!(out.resolve().await, Ok(7));
        assert!(out.dependencies().is_empty());
    }

    #[tokio::test]
    async fn apply_keeps_dependencies_and_waits_for_source() {
        let svc = urn("svc");
        let (name, tx) = pending::<String>(&svc);
        let fqdn = name.apply(|n| format!("{n}.lb-ns.svc"));

        assert_eq!(fqdn.dependencies(), &BTreeSet::from([svc.clone()]));

        tx.send(Ok("example-webhook-service".to_string())).unwrap();
        assert_eq!(
            fqdn.resolve().await.unwrap(),
            "example-webhook-service.lb-ns.svc"
        );
    }

    #[tokio::test]
    async fn zip_unions_dependencies() {
        let svc = urn("svc");
        let ns = urn("ns");
        let (svc_name, svc_tx) = pending::<String>(&svc);
        let (ns_name, ns_tx) = pending::<String>(&ns);

        let both = svc_name.zip(&ns_name);
        assert_eq!(both.dependencies().len(), 2);

        ns_tx.send(Ok("lb-ns".to_string())).unwrap();
        svc_tx.send(Ok("hook".to_string())).unwrap();
        assert_eq!(
            both.resolve().await.unwrap(),
            ("hook".to_string(), "lb-ns".to_string())
        );
    }

    #[tokio::test]
    async fn failure_skips_transforms() {
        let svc = urn("svc");
        let (name, tx) = pending::<String>(&svc);
        let derived = name.apply(|_| -> String { panic!("transform must not run") });

        tx.send(Err(OutputError::Failed {
            urn: svc.clone(),
            message: "quota exceeded".to_string(),
        }))
        .unwrap();

        assert!(matches!(
            derived.resolve().await,
            Err(OutputError::Failed { urn, .. }) if urn == svc
        ));
    }

    #[tokio::test]
    async fn dropped_producer_abandons_output() {
        let svc = urn("svc");
        let (name, tx) = pending::<String>(&svc);
        drop(tx);
        assert_eq!(
            name.resolve().await,
            Err(OutputError::Abandoned { urn: svc })
        );
    }

    #[tokio::test]
    async fn try_apply_surfaces_errors() {
        let out = Output::known("not a number".to_string())
            .try_apply(|s| s.parse::<u16>());
        assert!(matches!(out.resolve().await, Err(OutputError::Apply(_))));
    }

    #[tokio::test]
    async fn all_preserves_order() {
        let out = Output::all(vec![Output::known(1), Output::known(2), Output::known(3)]);
        assert_eq!(out.resolve().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn property_reads_json_pointer() {
        let outputs = Output::known(json!({"metadata": {"name": "lb-ns"}}));
        let name: Output<String> = outputs.property("/metadata/name");
        assert_eq!(name.resolve().await.unwrap(), "lb-ns");

        let missing: Output<String> = outputs.property("/metadata/uid");
        assert_eq!(
            missing.resolve().await,
            Err(OutputError::MissingProperty {
                pointer: "/metadata/uid".to_string()
            })
        );
    }

    #[tokio::test]
    async fn resolves_once_for_many_consumers() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let out = Output::known(1u32).apply(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v + 1
        });
        let a = out.clone();
        let b = out.clone();
        assert_eq!(a.resolve().await.unwrap(), 2);
        assert_eq!(b.resolve().await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

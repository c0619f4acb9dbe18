//! Local key and certificate generation
//!
//! Keys are random, so a second create for the same URN with the same inputs
//! returns the first result instead of generating new material. A changed
//! input (say, a new CSR) produces a new result.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use awslbc_infra::pki::{
    self, CertRequestArgs, LocallySignedCertArgs, PkiError, PrivateKeyArgs, SelfSignedCertArgs,
};
use awslbc_resource::{CreateRequest, ProviderError, ResourceProvider, ResourceType, Urn};

use crate::merge_outputs;

/// Provider for the `tls` package
#[derive(Debug, Default)]
pub struct TlsProvider {
    issued: Mutex<HashMap<(Urn, String), Value>>,
}

impl TlsProvider {
    /// Provider with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn cached(&self, key: &(Urn, String)) -> Result<Option<Value>, ProviderError> {
        let issued = self.issued.lock().map_err(poisoned)?;
        Ok(issued.get(key).cloned())
    }

    fn remember(&self, key: (Urn, String), outputs: &Value) -> Result<(), ProviderError> {
        let mut issued = self.issued.lock().map_err(poisoned)?;
        issued.insert(key, outputs.clone());
        Ok(())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> ProviderError {
    ProviderError::backend("TLS material cache is poisoned")
}

fn generate(request: &CreateRequest) -> Result<Value, ProviderError> {
    match request.resource_type {
        ResourceType::TlsPrivateKey => {
            let args: PrivateKeyArgs = request.inputs_as()?;
            let key = pki::generate_private_key(&args).map_err(pki_error)?;
            merge_outputs(request, key)
        }
        ResourceType::TlsSelfSignedCert => {
            let args: SelfSignedCertArgs = request.inputs_as()?;
            let cert_pem = pki::self_signed_cert(&args).map_err(pki_error)?;
            merge_outputs(request, json!({ "certPem": cert_pem }))
        }
        ResourceType::TlsCertRequest => {
            let args: CertRequestArgs = request.inputs_as()?;
            let csr_pem = pki::cert_request(&args).map_err(pki_error)?;
            merge_outputs(request, json!({ "certRequestPem": csr_pem }))
        }
        ResourceType::TlsLocallySignedCert => {
            let args: LocallySignedCertArgs = request.inputs_as()?;
            let cert_pem = pki::locally_signed_cert(&args).map_err(pki_error)?;
            merge_outputs(request, json!({ "certPem": cert_pem }))
        }
        _ => Err(ProviderError::unsupported("tls", request)),
    }
}

fn pki_error(e: PkiError) -> ProviderError {
    ProviderError::backend(e)
}

#[async_trait]
impl ResourceProvider for TlsProvider {
    async fn create(&self, request: &CreateRequest) -> Result<Value, ProviderError> {
        let key = (request.urn.clone(), request.inputs.to_string());
        if let Some(outputs) = self.cached(&key)? {
            debug!(urn = %request.urn, "reusing generated TLS material");
            return Ok(outputs);
        }

        // RSA key generation blocks; keep it off the runtime threads
        let owned = request.clone();
        let outputs = tokio::task::spawn_blocking(move || generate(&owned))
            .await
            .map_err(ProviderError::backend)??;
        self.remember(key, &outputs)?;
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awslbc_infra::pki::{AllowedUse, CertificateInfo, Subject};
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn request(resource_type: ResourceType, name: &str, inputs: Value) -> CreateRequest {
        CreateRequest {
            urn: Urn::new("dev", &resource_type.token(), name),
            resource_type,
            inputs,
        }
    }

    fn key_request(name: &str) -> CreateRequest {
        request(
            ResourceType::TlsPrivateKey,
            name,
            serde_json::to_value(PrivateKeyArgs::rsa(2048)).unwrap(),
        )
    }

    #[tokio::test]
    async fn same_request_reuses_key() {
        let provider = TlsProvider::new();
        let first = provider.create(&key_request("ca-key")).await.unwrap();
        let second = provider.create(&key_request("ca-key")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first["algorithm"], "RSA");
        assert_eq!(first["rsaBits"], 2048);

        let other = provider.create(&key_request("webhook-key")).await.unwrap();
        assert_ne!(first["privateKeyPem"], other["privateKeyPem"]);
    }

    #[tokio::test]
    async fn self_signed_ca_from_generated_key() {
        let provider = TlsProvider::new();
        let key = provider.create(&key_request("ca-key")).await.unwrap();

        let args = SelfSignedCertArgs {
            private_key_pem: key["privateKeyPem"].as_str().unwrap().to_string(),
            is_ca_certificate: true,
            validity_period_hours: 88_600,
            allowed_uses: vec![AllowedUse::CertSigning],
            subject: Subject::common_name("ca"),
            dns_names: vec![],
        };
        let cert = provider
            .create(&request(
                ResourceType::TlsSelfSignedCert,
                "ca",
                serde_json::to_value(&args).unwrap(),
            ))
            .await
            .unwrap();

        let info = CertificateInfo::from_pem(cert["certPem"].as_str().unwrap()).unwrap();
        assert!(info.is_ca);
        assert_eq!(cert["isCaCertificate"], true);
    }

    #[tokio::test]
    async fn key_generation_leaves_the_runtime_free() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };

        TlsProvider::new()
            .create(&key_request("ca-key"))
            .await
            .unwrap();
        ticker.abort();
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn poisoned_cache_is_an_error() {
        let provider = TlsProvider::new();
        let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = provider.issued.lock().unwrap();
            panic!("poison the cache");
        }));

        let err = provider.create(&key_request("ca-key")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Backend { .. }));
        assert!(err.to_string().contains("poisoned"));
    }

    #[tokio::test]
    async fn invalid_inputs_are_reported() {
        let provider = TlsProvider::new();
        let err = provider
            .create(&request(
                ResourceType::TlsCertRequest,
                "csr",
                json!({"dnsNames": []}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInputs { .. }));
    }

    #[tokio::test]
    async fn non_tls_types_are_unsupported() {
        let provider = TlsProvider::new();
        let err = provider
            .create(&request(ResourceType::IamRole, "role", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { provider: "tls", .. }));
    }
}

//! Webhook serving certificate chain
//!
//! A self-signed CA issues the serving certificate for the webhook Service.
//! The CA certificate doubles as the caBundle of the webhook configurations.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;

use awslbc_common::Result;
use awslbc_infra::pki::{
    AllowedUse, CertRequestArgs, LocallySignedCertArgs, PrivateKeyArgs, SelfSignedCertArgs,
    Subject, RSA_KEY_BITS, WEBHOOK_CERT_VALIDITY_HOURS,
};
use awslbc_resource::{ComponentResource, CustomResource, Output, ResourceOptions, ResourceType, Stack};

use crate::objects::{declare, declare_args, metadata, object_name};

/// Secret type of the serving certificate
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// DNS names the webhook Service is reached by
pub fn webhook_dns_names(service: &str, namespace: &str) -> Vec<String> {
    vec![
        format!("{service}.{namespace}"),
        format!("{service}.{namespace}.svc"),
    ]
}

/// Common name of the webhook CA
pub fn ca_common_name(name: &str) -> String {
    format!("{name}-aws-load-balancer-controller")
}

/// Keys of the TLS secret, in the order their PEMs are collected
const TLS_SECRET_KEYS: [&str; 3] = ["ca.crt", "tls.crt", "tls.key"];

fn tls_secret(namespace: String, labels: &BTreeMap<String, String>, pems: Vec<String>) -> Secret {
    Secret {
        metadata: metadata(None, Some(namespace), labels),
        type_: Some(TLS_SECRET_TYPE.to_string()),
        string_data: Some(
            TLS_SECRET_KEYS
                .iter()
                .map(|k| k.to_string())
                .zip(pems)
                .collect(),
        ),
        ..Default::default()
    }
}

pub(crate) struct CertificateAuthority {
    pub key: CustomResource,
    pub cert: CustomResource,
}

impl CertificateAuthority {
    pub fn cert_pem(&self) -> Output<String> {
        self.cert.output("/certPem")
    }

    fn key_pem(&self) -> Output<String> {
        self.key.output("/privateKeyPem")
    }
}

pub(crate) struct ServingCertificate {
    pub cert: CustomResource,
    pub secret: CustomResource,
}

pub(crate) fn declare_ca(
    stack: &mut Stack,
    name: &str,
    component: &ComponentResource,
) -> Result<CertificateAuthority> {
    let key = declare_args(
        stack,
        "CA private key",
        ResourceType::TlsPrivateKey,
        &format!("{name}-ca-privatekey"),
        Output::known(PrivateKeyArgs::rsa(RSA_KEY_BITS)),
        ResourceOptions::child_of(component),
    )?;

    let common_name = ca_common_name(name);
    let cert_args = key
        .output::<String>("/privateKeyPem")
        .apply(move |private_key_pem| SelfSignedCertArgs {
            private_key_pem,
            is_ca_certificate: true,
            validity_period_hours: WEBHOOK_CERT_VALIDITY_HOURS,
            allowed_uses: vec![
                AllowedUse::CertSigning,
                AllowedUse::DigitalSignature,
                AllowedUse::KeyEncipherment,
            ],
            subject: Subject::common_name(common_name),
            dns_names: Vec::new(),
        });
    let cert = declare_args(
        stack,
        "CA Cert",
        ResourceType::TlsSelfSignedCert,
        &format!("{name}-cacert"),
        cert_args,
        ResourceOptions::child_of(&key),
    )?;

    Ok(CertificateAuthority { key, cert })
}

pub(crate) fn declare_serving(
    stack: &mut Stack,
    name: &str,
    labels: &BTreeMap<String, String>,
    component: &ComponentResource,
    namespace: &CustomResource,
    ca: &CertificateAuthority,
    service: &CustomResource,
) -> Result<ServingCertificate> {
    let ns_name = object_name(namespace);

    let key = declare_args(
        stack,
        "Webhook Certificate Key",
        ResourceType::TlsPrivateKey,
        &format!("{name}-webhook-privatekey"),
        Output::known(PrivateKeyArgs::rsa(RSA_KEY_BITS)),
        ResourceOptions::child_of(component),
    )?;
    let key_pem = key.output::<String>("/privateKeyPem");

    let request_args = key_pem
        .zip(&object_name(service).zip(&ns_name))
        .apply(|(private_key_pem, (service, namespace))| CertRequestArgs {
            private_key_pem,
            dns_names: webhook_dns_names(&service, &namespace),
            subject: Subject::common_name(service),
        });
    let request = declare_args(
        stack,
        "Webhook Certificate Request",
        ResourceType::TlsCertRequest,
        &format!("{name}-webhook-cert-request"),
        request_args,
        ResourceOptions::child_of(&key),
    )?;

    let signed_args = request
        .output::<String>("/certRequestPem")
        .zip(&ca.key_pem())
        .zip(&ca.cert_pem())
        .apply(
            |((cert_request_pem, ca_private_key_pem), ca_cert_pem)| LocallySignedCertArgs {
                cert_request_pem,
                ca_private_key_pem,
                ca_cert_pem,
                validity_period_hours: WEBHOOK_CERT_VALIDITY_HOURS,
                allowed_uses: vec![AllowedUse::KeyEncipherment, AllowedUse::DigitalSignature],
                is_ca_certificate: false,
            },
        );
    let cert = declare_args(
        stack,
        "Webhook Certificate",
        ResourceType::TlsLocallySignedCert,
        &format!("{name}-webhook-certificate"),
        signed_args,
        ResourceOptions::child_of(&request),
    )?;

    let secret_labels = labels.clone();
    let secret_body = Output::all([
        ca.cert_pem(),
        cert.output::<String>("/certPem"),
        key_pem,
    ])
    .zip(&ns_name)
    .apply(move |(pems, ns)| tls_secret(ns, &secret_labels, pems));
    let secret = declare(
        stack,
        "Webhook Secret",
        &format!("{name}-tls-secret"),
        secret_body,
        ResourceOptions::child_of(namespace)
            .depends_on(&key)
            .depends_on(&cert)
            .depends_on(&request),
    )?;

    Ok(ServingCertificate { cert, secret })
}

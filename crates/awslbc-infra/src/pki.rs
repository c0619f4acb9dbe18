//! Key and certificate generation for the admission webhook
//!
//! Two-tier PKI: a self-signed CA signs the webhook serving certificate, which
//! is issued from a CSR carrying the service DNS names. The argument structs
//! are the serialized inputs of the corresponding TLS resources.

use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, CertificateSigningRequestParams,
    DistinguishedName, DnType, DnValue, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose, RsaKeySize, SanType,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x509_parser::prelude::*;

/// Errors from key and certificate operations
#[derive(Debug, Error)]
pub enum PkiError {
    /// Unsupported algorithm parameters
    #[error("unsupported key parameters: {0}")]
    UnsupportedKey(String),

    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// CSR could not be created or parsed
    #[error("invalid CSR: {0}")]
    InvalidCsr(String),

    /// Certificate could not be created
    #[error("certificate generation failed: {0}")]
    CertificateGenerationFailed(String),

    /// PEM or DER could not be parsed
    #[error("certificate parsing error: {0}")]
    ParseError(String),
}

/// Result type for PKI operations
pub type Result<T> = std::result::Result<T, PkiError>;

/// Validity of both webhook certificates
pub const WEBHOOK_CERT_VALIDITY_HOURS: i64 = 88_600;

/// RSA modulus size used for webhook keys
pub const RSA_KEY_BITS: u32 = 2048;

/// Key algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyAlgorithm {
    /// RSA with PKCS#1 v1.5 SHA-256 signatures
    #[default]
    Rsa,
    /// ECDSA
    Ecdsa,
}

/// Inputs of a private key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyArgs {
    /// Algorithm
    pub algorithm: KeyAlgorithm,
    /// RSA modulus size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsa_bits: Option<u32>,
    /// ECDSA curve (P256 or P384)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecdsa_curve: Option<String>,
}

impl PrivateKeyArgs {
    /// RSA key of the given size
    pub fn rsa(bits: u32) -> Self {
        Self {
            algorithm: KeyAlgorithm::Rsa,
            rsa_bits: Some(bits),
            ecdsa_curve: None,
        }
    }
}

/// Outputs of a private key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedKey {
    /// Algorithm
    pub algorithm: KeyAlgorithm,
    /// PKCS#8 private key
    pub private_key_pem: String,
    /// SubjectPublicKeyInfo
    pub public_key_pem: String,
}

/// Permitted uses of a certificate key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedUse {
    /// keyCertSign
    CertSigning,
    /// cRLSign
    CrlSigning,
    /// digitalSignature
    DigitalSignature,
    /// keyEncipherment
    KeyEncipherment,
    /// extended key usage serverAuth
    ServerAuth,
    /// extended key usage clientAuth
    ClientAuth,
}

/// Certificate subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// CN
    pub common_name: String,
    /// O
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Subject {
    /// Subject with only a common name
    pub fn common_name(cn: impl Into<String>) -> Self {
        Self {
            common_name: cn.into(),
            organization: None,
        }
    }

    fn distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(self.common_name.clone()),
        );
        if let Some(org) = &self.organization {
            dn.push(DnType::OrganizationName, DnValue::Utf8String(org.clone()));
        }
        dn
    }
}

/// Inputs of a self-signed certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfSignedCertArgs {
    /// Signing key
    pub private_key_pem: String,
    /// Whether the certificate is a CA
    pub is_ca_certificate: bool,
    /// Lifetime in hours
    pub validity_period_hours: i64,
    /// Key usages
    pub allowed_uses: Vec<AllowedUse>,
    /// Subject
    pub subject: Subject,
    /// DNS SANs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}

/// Inputs of a certificate signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertRequestArgs {
    /// Key the request is made for
    pub private_key_pem: String,
    /// Subject
    pub subject: Subject,
    /// DNS SANs
    pub dns_names: Vec<String>,
}

/// Inputs of a certificate signed by a local CA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocallySignedCertArgs {
    /// PEM CSR
    pub cert_request_pem: String,
    /// CA private key
    pub ca_private_key_pem: String,
    /// CA certificate
    pub ca_cert_pem: String,
    /// Lifetime in hours
    pub validity_period_hours: i64,
    /// Key usages
    pub allowed_uses: Vec<AllowedUse>,
    /// Whether the issued certificate is itself a CA
    #[serde(default)]
    pub is_ca_certificate: bool,
}

fn validity(hours: i64) -> Result<(::time::OffsetDateTime, ::time::OffsetDateTime)> {
    if hours <= 0 {
        return Err(PkiError::CertificateGenerationFailed(format!(
            "validity must be positive, got {hours}h"
        )));
    }
    let now = ::time::OffsetDateTime::now_utc();
    Ok((now, now + ::time::Duration::hours(hours)))
}

fn apply_uses(params: &mut CertificateParams, uses: &[AllowedUse]) {
    params.key_usages = uses
        .iter()
        .filter_map(|u| match u {
            AllowedUse::CertSigning => Some(KeyUsagePurpose::KeyCertSign),
            AllowedUse::CrlSigning => Some(KeyUsagePurpose::CrlSign),
            AllowedUse::DigitalSignature => Some(KeyUsagePurpose::DigitalSignature),
            AllowedUse::KeyEncipherment => Some(KeyUsagePurpose::KeyEncipherment),
            AllowedUse::ServerAuth | AllowedUse::ClientAuth => None,
        })
        .collect();
    params.extended_key_usages = uses
        .iter()
        .filter_map(|u| match u {
            AllowedUse::ServerAuth => Some(ExtendedKeyUsagePurpose::ServerAuth),
            AllowedUse::ClientAuth => Some(ExtendedKeyUsagePurpose::ClientAuth),
            _ => None,
        })
        .collect();
}

fn dns_sans(names: &[String]) -> Result<Vec<SanType>> {
    names
        .iter()
        .map(|name| {
            Ia5String::try_from(name.clone())
                .map(SanType::DnsName)
                .map_err(|e| {
                    PkiError::CertificateGenerationFailed(format!(
                        "invalid DNS name '{}': {}",
                        name, e
                    ))
                })
        })
        .collect()
}

fn load_key(pem: &str, what: &str) -> Result<KeyPair> {
    KeyPair::from_pem(pem).map_err(|e| PkiError::ParseError(format!("failed to load {what}: {e}")))
}

/// Generate a private key
pub fn generate_private_key(args: &PrivateKeyArgs) -> Result<GeneratedKey> {
    let key = match args.algorithm {
        KeyAlgorithm::Rsa => {
            let size = match args.rsa_bits.unwrap_or(RSA_KEY_BITS) {
                2048 => RsaKeySize::_2048,
                3072 => RsaKeySize::_3072,
                4096 => RsaKeySize::_4096,
                other => {
                    return Err(PkiError::UnsupportedKey(format!(
                        "RSA keys of {other} bits"
                    )))
                }
            };
            KeyPair::generate_rsa_for(&rcgen::PKCS_RSA_SHA256, size)
        }
        KeyAlgorithm::Ecdsa => match args.ecdsa_curve.as_deref().unwrap_or("P256") {
            "P256" => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256),
            "P384" => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384),
            other => return Err(PkiError::UnsupportedKey(format!("ECDSA curve {other}"))),
        },
    }
    .map_err(|e| PkiError::KeyGenerationFailed(e.to_string()))?;

    Ok(GeneratedKey {
        algorithm: args.algorithm,
        private_key_pem: key.serialize_pem(),
        public_key_pem: key.public_key_pem(),
    })
}

/// Issue a self-signed certificate; returns the PEM certificate
pub fn self_signed_cert(args: &SelfSignedCertArgs) -> Result<String> {
    let key = load_key(&args.private_key_pem, "signing key")?;

    let mut params = CertificateParams::default();
    params.distinguished_name = args.subject.distinguished_name();
    params.is_ca = if args.is_ca_certificate {
        IsCa::Ca(BasicConstraints::Unconstrained)
    } else {
        IsCa::NoCa
    };
    apply_uses(&mut params, &args.allowed_uses);
    params.subject_alt_names = dns_sans(&args.dns_names)?;
    (params.not_before, params.not_after) = validity(args.validity_period_hours)?;

    let cert = params.self_signed(&key).map_err(|e| {
        PkiError::CertificateGenerationFailed(format!("failed to self-sign: {}", e))
    })?;
    Ok(cert.pem())
}

/// Create a CSR; returns the PEM request
pub fn cert_request(args: &CertRequestArgs) -> Result<String> {
    let key = load_key(&args.private_key_pem, "request key")?;

    let mut params = CertificateParams::default();
    params.distinguished_name = args.subject.distinguished_name();
    params.subject_alt_names = dns_sans(&args.dns_names)?;

    params
        .serialize_request(&key)
        .and_then(|csr| csr.pem())
        .map_err(|e| PkiError::InvalidCsr(format!("failed to build CSR: {}", e)))
}

/// Sign a CSR with a local CA; returns the PEM certificate.
///
/// Subject and SANs come from the CSR; usages and validity from `args`.
pub fn locally_signed_cert(args: &LocallySignedCertArgs) -> Result<String> {
    let mut csr = CertificateSigningRequestParams::from_pem(&args.cert_request_pem)
        .map_err(|e| PkiError::InvalidCsr(format!("failed to parse CSR: {}", e)))?;

    csr.params.is_ca = if args.is_ca_certificate {
        IsCa::Ca(BasicConstraints::Unconstrained)
    } else {
        IsCa::NoCa
    };
    apply_uses(&mut csr.params, &args.allowed_uses);
    (csr.params.not_before, csr.params.not_after) = validity(args.validity_period_hours)?;

    let ca_key = load_key(&args.ca_private_key_pem, "CA key")?;
    let issuer = Issuer::from_ca_cert_pem(&args.ca_cert_pem, &ca_key)
        .map_err(|e| PkiError::ParseError(format!("failed to create issuer: {}", e)))?;

    let cert = csr.signed_by(&issuer).map_err(|e| {
        PkiError::CertificateGenerationFailed(format!("failed to sign certificate: {}", e))
    })?;
    Ok(cert.pem())
}

/// Decode the first PEM block
pub fn parse_pem(pem_data: &str) -> Result<Vec<u8>> {
    let block = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| PkiError::ParseError(format!("failed to parse PEM: {}", e)))?;
    Ok(block.contents().to_vec())
}

/// Fields of an issued certificate
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// Subject CN
    pub common_name: String,
    /// Issuer CN
    pub issuer_common_name: String,
    /// DNS SANs in certificate order
    pub dns_names: Vec<String>,
    /// basicConstraints CA flag
    pub is_ca: bool,
    /// keyCertSign usage present
    pub can_sign_certificates: bool,
    /// RSA modulus size, if the key is RSA
    pub rsa_key_bits: Option<usize>,
    /// notBefore, seconds since epoch
    pub not_before: i64,
    /// notAfter, seconds since epoch
    pub not_after: i64,
}

impl CertificateInfo {
    /// Parse a PEM certificate
    pub fn from_pem(pem_data: &str) -> Result<Self> {
        let der = parse_pem(pem_data)?;
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| PkiError::ParseError(format!("failed to parse certificate: {}", e)))?;

        let first_cn = |name: &X509Name| {
            name.iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let dns_names = match cert.subject_alternative_name() {
            Ok(Some(ext)) => ext
                .value
                .general_names
                .iter()
                .filter_map(|n| match n {
                    GeneralName::DNSName(name) => Some(name.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let is_ca = matches!(cert.basic_constraints(), Ok(Some(bc)) if bc.value.ca);
        let can_sign_certificates =
            matches!(cert.key_usage(), Ok(Some(ku)) if ku.value.key_cert_sign());
        let rsa_key_bits = match cert.public_key().parsed() {
            Ok(x509_parser::public_key::PublicKey::RSA(rsa)) => Some(rsa.key_size()),
            _ => None,
        };

        Ok(Self {
            common_name: first_cn(cert.subject()),
            issuer_common_name: first_cn(cert.issuer()),
            dns_names,
            is_ca,
            can_sign_certificates,
            rsa_key_bits,
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
        })
    }

    /// Lifetime in hours
    pub fn lifetime_hours(&self) -> i64 {
        (self.not_after - self.not_before) / 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_key() -> GeneratedKey {
        generate_private_key(&PrivateKeyArgs::rsa(RSA_KEY_BITS)).unwrap()
    }

    fn ca(key: &GeneratedKey) -> String {
        self_signed_cert(&SelfSignedCertArgs {
            private_key_pem: key.private_key_pem.clone(),
            is_ca_certificate: true,
            validity_period_hours: WEBHOOK_CERT_VALIDITY_HOURS,
            allowed_uses: vec![
                AllowedUse::CertSigning,
                AllowedUse::DigitalSignature,
                AllowedUse::KeyEncipherment,
            ],
            subject: Subject::common_name("example-aws-load-balancer-controller"),
            dns_names: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn ca_certificate_is_rsa_2048_and_can_sign() {
        let key = rsa_key();
        assert!(key.private_key_pem.contains("PRIVATE KEY"));
        assert!(key.public_key_pem.contains("PUBLIC KEY"));

        let info = CertificateInfo::from_pem(&ca(&key)).unwrap();
        assert!(info.is_ca);
        assert!(info.can_sign_certificates);
        assert_eq!(info.rsa_key_bits, Some(2048));
        assert_eq!(info.common_name, "example-aws-load-balancer-controller");
        assert_eq!(info.lifetime_hours(), WEBHOOK_CERT_VALIDITY_HOURS);
    }

    #[test]
    fn webhook_certificate_chain() {
        let ca_key = rsa_key();
        let ca_pem = ca(&ca_key);
        let leaf_key = rsa_key();

        let csr = cert_request(&CertRequestArgs {
            private_key_pem: leaf_key.private_key_pem.clone(),
            subject: Subject::common_name("example-webhook-service"),
            dns_names: vec![
                "example-webhook-service.lb-ns".to_string(),
                "example-webhook-service.lb-ns.svc".to_string(),
            ],
        })
        .unwrap();
        assert!(csr.contains("CERTIFICATE REQUEST"));

        let leaf = locally_signed_cert(&LocallySignedCertArgs {
            cert_request_pem: csr,
            ca_private_key_pem: ca_key.private_key_pem.clone(),
            ca_cert_pem: ca_pem,
            validity_period_hours: WEBHOOK_CERT_VALIDITY_HOURS,
            allowed_uses: vec![AllowedUse::KeyEncipherment, AllowedUse::DigitalSignature],
            is_ca_certificate: false,
        })
        .unwrap();

        let info = CertificateInfo::from_pem(&leaf).unwrap();
        assert_eq!(info.common_name, "example-webhook-service");
        assert_eq!(info.issuer_common_name, "example-aws-load-balancer-controller");
        assert_eq!(
            info.dns_names,
            vec![
                "example-webhook-service.lb-ns".to_string(),
                "example-webhook-service.lb-ns.svc".to_string()
            ]
        );
        assert!(!info.is_ca);
        assert!(!info.can_sign_certificates);
    }

    #[test]
    fn ecdsa_keys_are_supported() {
        let key = generate_private_key(&PrivateKeyArgs {
            algorithm: KeyAlgorithm::Ecdsa,
            rsa_bits: None,
            ecdsa_curve: Some("P256".to_string()),
        })
        .unwrap();
        assert_eq!(key.algorithm, KeyAlgorithm::Ecdsa);
    }

    #[test]
    fn odd_rsa_sizes_are_rejected() {
        assert!(matches!(
            generate_private_key(&PrivateKeyArgs::rsa(1024)),
            Err(PkiError::UnsupportedKey(_))
        ));
    }

    #[test]
    fn zero_validity_is_rejected() {
        let key = rsa_key();
        let err = self_signed_cert(&SelfSignedCertArgs {
            private_key_pem: key.private_key_pem,
            is_ca_certificate: true,
            validity_period_hours: 0,
            allowed_uses: vec![],
            subject: Subject::common_name("x"),
            dns_names: vec![],
        })
        .unwrap_err();
        assert!(matches!(err, PkiError::CertificateGenerationFailed(_)));
    }

    #[test]
    fn args_serialize_with_provider_field_names() {
        let json = serde_json::to_value(PrivateKeyArgs::rsa(2048)).unwrap();
        assert_eq!(json, serde_json::json!({"algorithm": "RSA", "rsaBits": 2048}));
        assert_eq!(
            serde_json::to_value(AllowedUse::CertSigning).unwrap(),
            "cert_signing"
        );
    }
}

//! Client configuration.
//!
//! [`ApiConfig`] describes how to reach the platform management API;
//! [`SecurityConfig`] bundles it with the leaf issuance profile so both can
//! be loaded from one JSON document.

use crate::cert::builder::LeafProfile;
use crate::cert::loader::load_certificates_from_pem;
use crate::error::{Result, SecurityError};
use hyper::Uri;
use rustls::pki_types::CertificateDer;
use rustls::ClientConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Connection settings for the platform management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API, e.g. `https://opsman.example.com`.
    pub target: String,
    /// Bearer token sent as `Authorization` on every request.
    #[serde(default)]
    pub token: Option<String>,
    /// PEM bundle trusted in addition to the built-in web roots.
    #[serde(default)]
    pub ca_cert_pem: Option<String>,
    /// Upper bound on a single request, body included. No limit when unset.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ApiConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            token: None,
            ca_cert_pem: None,
            request_timeout_secs: None,
        }
    }

    /// The target parsed as an absolute `http` or `https` URI.
    pub fn target_uri(&self) -> Result<Uri> {
        let uri = Uri::from_str(&self.target)
            .map_err(|e| SecurityError::Config(format!("Invalid target {:?}: {}", self.target, e)))?;

        match uri.scheme_str() {
            Some("http") | Some("https") if uri.authority().is_some() => Ok(uri),
            _ => Err(SecurityError::Config(format!(
                "Target must be an absolute http(s) URL, got {:?}",
                self.target
            ))),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Everything needed to construct a [`crate::service::SecurityService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub leaf: LeafProfile,
}

impl SecurityConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SecurityError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.leaf.validate()?;
        Ok(config)
    }
}

/// Build a rustls client configuration trusting the bundled web PKI roots
/// and, when given, every certificate in `ca_cert_pem`.
pub fn build_tls_config(ca_cert_pem: Option<&str>) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(bundle) = ca_cert_pem {
        for ca_der in load_certificates_from_pem(bundle)? {
            root_store
                .add(CertificateDer::from(ca_der))
                .map_err(|e| SecurityError::Config(format!("Failed to add CA cert: {:?}", e)))?;
        }
    }

    // Install default crypto provider if not already set
    let _ = rustls::crypto::ring::default_provider().install_default();

    Ok(ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::x509_signing::create_self_signed_ca;
    use crate::crypto::rsa::generate_rsa_keypair;
    use crate::error::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_target_uri_accepts_https() {
        let config = ApiConfig::new("https://opsman.example.com");
        let uri = config.target_uri().unwrap();
        assert_eq!(uri.host(), Some("opsman.example.com"));
    }

    #[test]
    fn test_target_uri_rejects_relative() {
        let err = ApiConfig::new("/just/a/path").target_uri().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_target_uri_rejects_other_scheme() {
        assert!(ApiConfig::new("ftp://opsman.example.com").target_uri().is_err());
    }

    #[test]
    fn test_security_config_defaults() {
        let config = SecurityConfig::from_json(r#"{"api": {"target": "https://opsman"}}"#).unwrap();

        assert_eq!(config.api.target, "https://opsman");
        assert_eq!(config.api.token, None);
        assert_eq!(config.api.request_timeout(), None);
        assert_eq!(config.leaf, LeafProfile::default());
    }

    #[test]
    fn test_security_config_overrides() {
        let config = SecurityConfig::from_json(
            r#"{
                "api": {"target": "https://opsman", "token": "t0k3n", "request_timeout_secs": 30},
                "leaf": {"organization": "Example", "validity_days": 90}
            }"#,
        )
        .unwrap();

        assert_eq!(config.api.token.as_deref(), Some("t0k3n"));
        assert_eq!(config.api.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.leaf.organization, "Example");
        assert_eq!(config.leaf.validity_days, 90);
        assert_eq!(config.leaf.key_bits, 2048);
    }

    #[test]
    fn test_security_config_rejects_zero_validity() {
        let err = SecurityConfig::from_json(
            r#"{"api": {"target": "https://opsman"}, "leaf": {"validity_days": 0}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_security_config_rejects_missing_api() {
        let err = SecurityConfig::from_json("{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_build_tls_config_with_custom_ca() {
        let mut rng = StdRng::seed_from_u64(1);
        let keypair = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let ca_pem = create_self_signed_ca(&mut rng, &keypair, "opsman-ca", 365).unwrap();

        assert!(build_tls_config(Some(&ca_pem)).is_ok());
    }

    #[test]
    fn test_build_tls_config_without_custom_ca() {
        assert!(build_tls_config(None).is_ok());
    }

    #[test]
    fn test_build_tls_config_rejects_empty_bundle() {
        assert!(build_tls_config(Some("")).is_err());
    }
}

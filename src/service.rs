//! The security service: root CA retrieval and leaf issuance behind one handle.

use crate::cert::builder::LeafProfile;
use crate::cert::issuer::{IssuedCert, LeafCertIssuer};
use crate::error::Result;
use crate::net::client::{HttpClient, HyperClient};
use crate::net::config::SecurityConfig;
use crate::net::root_ca::RootCaClient;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// Bundles a [`RootCaClient`] and a [`LeafCertIssuer`].
#[derive(Debug)]
pub struct SecurityService<C, R = OsRng> {
    root_ca: RootCaClient<C>,
    issuer: LeafCertIssuer<R>,
}

impl SecurityService<HyperClient, OsRng> {
    /// Build a service talking to the configured API over hyper, issuing with
    /// the operating system CSPRNG.
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        config.leaf.validate()?;
        let client = HyperClient::new(&config.api)?;
        Ok(Self::new(
            client,
            LeafCertIssuer::with_os_rng(config.leaf.clone()),
        ))
    }
}

impl<C> SecurityService<C, OsRng>
where
    C: HttpClient,
{
    /// A service with the default leaf profile and the OS CSPRNG.
    pub fn with_client(client: C) -> Self {
        Self::new(client, LeafCertIssuer::with_os_rng(LeafProfile::default()))
    }
}

impl<C, R> SecurityService<C, R>
where
    C: HttpClient,
    R: RngCore + CryptoRng,
{
    pub fn new(client: C, issuer: LeafCertIssuer<R>) -> Self {
        Self {
            root_ca: RootCaClient::new(client),
            issuer,
        }
    }

    /// See [`RootCaClient::fetch_root_ca_cert`].
    pub async fn fetch_root_ca_cert(&self) -> Result<String> {
        self.root_ca.fetch_root_ca_cert().await
    }

    /// See [`LeafCertIssuer::generate_rsa_cert`].
    pub fn generate_rsa_cert<S>(
        &self,
        parent_pem: &[u8],
        parent_key_pem: &str,
        dns_names: &[S],
    ) -> Result<IssuedCert>
    where
        S: AsRef<str>,
    {
        self.issuer
            .generate_rsa_cert(parent_pem, parent_key_pem, dns_names)
    }

    pub fn root_ca(&self) -> &RootCaClient<C> {
        &self.root_ca
    }

    pub fn issuer(&self) -> &LeafCertIssuer<R> {
        &self.issuer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::config::ApiConfig;

    #[test]
    fn test_from_config() {
        let config = SecurityConfig {
            api: ApiConfig::new("https://opsman.example.com"),
            leaf: LeafProfile {
                organization: "Example".to_string(),
                ..LeafProfile::default()
            },
        };

        let service = SecurityService::from_config(&config).unwrap();
        assert_eq!(service.issuer().profile().organization, "Example");
    }

    #[test]
    fn test_from_config_rejects_zero_validity() {
        let config = SecurityConfig {
            api: ApiConfig::new("https://opsman.example.com"),
            leaf: LeafProfile {
                validity_days: 0,
                ..LeafProfile::default()
            },
        };

        let err = SecurityService::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_from_config_rejects_bad_target() {
        let config = SecurityConfig {
            api: ApiConfig::new("not a url"),
            leaf: LeafProfile::default(),
        };

        assert!(SecurityService::from_config(&config).is_err());
    }
}

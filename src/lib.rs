//! Security client for the platform management API.
//!
//! This library covers two operations:
//!
//! - Fetch the platform's root CA certificate (PEM) from
//!   `/api/v0/security/root_ca_certificate`
//! - Issue RSA server certificates for a set of DNS names under a parent CA
//!
//! # Architecture
//!
//! HTTP access goes through the [`net::client::HttpClient`] trait so the
//! transport, authentication and deadlines stay with the caller. Issuance
//! takes its random source as a parameter. Every failure is returned as a
//! [`SecurityError`]; nothing panics on bad input.
//!
//! # Example
//!
//! ```rust,no_run
//! use opsman_security::net::config::{ApiConfig, SecurityConfig};
//! use opsman_security::service::SecurityService;
//!
//! # async fn example(ca_key_pem: &str) -> opsman_security::error::Result<()> {
//! let config = SecurityConfig {
//!     api: ApiConfig::new("https://opsman.example.com"),
//!     leaf: Default::default(),
//! };
//! let service = SecurityService::from_config(&config)?;
//!
//! let root_ca_pem = service.fetch_root_ca_cert().await?;
//! let issued = service.generate_rsa_cert(
//!     root_ca_pem.as_bytes(),
//!     ca_key_pem,
//!     &["*.apps.example.com", "*.sys.example.com"],
//! )?;
//! println!("{}", issued.certificate_pem());
//! # Ok(())
//! # }
//! ```

pub mod cert;
pub mod crypto;
pub mod error;
pub mod net;
pub mod service;

// Re-export commonly used types
pub use error::{ErrorKind, Result, SecurityError};

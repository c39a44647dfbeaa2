//! Cryptographic operations module.
//!
//! RSA key generation and PEM import/export for parent and leaf keys.
//!
//! # Example
//!
//! ```rust,no_run
//! use opsman_security::crypto::rsa::{generate_rsa_keypair, import_rsa_from_pem};
//!
//! # fn example() -> opsman_security::error::Result<()> {
//! let keypair = generate_rsa_keypair(&mut rand::rngs::OsRng, 2048)?;
//! let pem = keypair.to_pkcs8_pem()?;
//! let imported = import_rsa_from_pem(&pem)?;
//! assert_eq!(keypair.public, imported.public);
//! # Ok(())
//! # }
//! ```

pub mod rsa;

//! RSA key operations.
//!
//! This module provides functions for generating, importing and exporting the
//! RSA keypairs used to sign and bind leaf certificates.

use crate::error::{Result, SecurityError};
use der::Decode;
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use spki::SubjectPublicKeyInfoOwned;

/// Default modulus size for generated keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// An RSA keypair consisting of a private key and its public half.
#[derive(Debug, Clone)]
pub struct RsaKeypair {
    pub secret: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl RsaKeypair {
    /// Create a new keypair from a private key.
    pub fn from_secret(secret: RsaPrivateKey) -> Self {
        let public = secret.to_public_key();
        Self { secret, public }
    }

    /// Export the private key as PKCS#8 PEM (`BEGIN PRIVATE KEY`).
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        self.secret
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| SecurityError::InvalidKey(format!("Failed to encode PKCS#8: {}", e)))
    }

    /// The public key as an X.509 SubjectPublicKeyInfo.
    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let der = self
            .public
            .to_public_key_der()
            .map_err(|e| SecurityError::Encode(format!("Failed to encode public key: {}", e)))?;

        SubjectPublicKeyInfoOwned::from_der(der.as_bytes())
            .map_err(|e| SecurityError::Encode(format!("Failed to decode public key info: {}", e)))
    }
}

/// Generate a new RSA keypair of `bits` modulus size from `rng`.
///
/// # Example
///
/// ```no_run
/// use opsman_security::crypto::rsa::{generate_rsa_keypair, DEFAULT_RSA_BITS};
///
/// let keypair = generate_rsa_keypair(&mut rand::rngs::OsRng, DEFAULT_RSA_BITS).unwrap();
/// ```
pub fn generate_rsa_keypair<R>(rng: &mut R, bits: usize) -> Result<RsaKeypair>
where
    R: RngCore + CryptoRng,
{
    let secret = RsaPrivateKey::new(rng, bits)
        .map_err(|e| SecurityError::KeyGeneration(format!("{} bits: {}", bits, e)))?;
    Ok(RsaKeypair::from_secret(secret))
}

/// Import an RSA keypair from PEM. Accepts PKCS#8 (`PRIVATE KEY`) and
/// PKCS#1 (`RSA PRIVATE KEY`) encodings.
pub fn import_rsa_from_pem(pem: &str) -> Result<RsaKeypair> {
    let secret = match RsaPrivateKey::from_pkcs8_pem(pem) {
        Ok(secret) => secret,
        Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
            SecurityError::InvalidKey(format!(
                "not PKCS#8 ({}) or PKCS#1 ({})",
                pkcs8_err, pkcs1_err
            ))
        })?,
    };

    Ok(RsaKeypair::from_secret(secret))
}

//! Certificate bundle loading from PEM.
//!
//! Used to turn an operator-supplied CA bundle into DER certificates for the
//! HTTP client's trust store.

use crate::error::{Result, SecurityError};
use rustls_pemfile::Item;
use std::io::Cursor;

/// Load every certificate from a PEM bundle.
///
/// Non-certificate items (keys, CRLs) are skipped. A bundle without any
/// certificate is an error.
///
/// # Example
///
/// ```rust,no_run
/// use opsman_security::cert::loader::load_certificates_from_pem;
///
/// # fn example() -> opsman_security::error::Result<()> {
/// let pem = std::fs::read_to_string("ca-bundle.pem").unwrap();
/// let certs = load_certificates_from_pem(&pem)?;
/// println!("Loaded {} certificates", certs.len());
/// # Ok(())
/// # }
/// ```
pub fn load_certificates_from_pem(pem_str: &str) -> Result<Vec<Vec<u8>>> {
    let mut cursor = Cursor::new(pem_str.as_bytes());
    let mut certificates = Vec::new();

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| SecurityError::Config(format!("Failed to read PEM: {}", e)))?
        {
            Some(Item::X509Certificate(cert_der)) => {
                certificates.push(cert_der.to_vec());
            }
            Some(_) => continue,
            None => break,
        }
    }

    if certificates.is_empty() {
        return Err(SecurityError::Config(
            "No certificates found in PEM bundle".to_string(),
        ));
    }

    Ok(certificates)
}

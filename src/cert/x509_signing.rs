//! X.509 certificate signing using x509-cert and RSA PKCS#1 v1.5.
//!
//! This module signs TBS certificates with an issuer's RSA key, creates
//! self-signed CA certificates and checks a certificate's signature against
//! its issuer.

use crate::cert::builder::{common_name, generate_serial_number, to_extension, validity_from_now};
use crate::crypto::rsa::RsaKeypair;
use crate::error::{Result, SecurityError};
use der::asn1::{BitString, OctetString};
use der::{Any, Decode, Encode};
use rand::{CryptoRng, RngCore};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier};

/// PEM label of an X.509 certificate block.
pub const CERTIFICATE_PEM_TAG: &str = "CERTIFICATE";

/// Create a self-signed RSA Root CA certificate.
///
/// The certificate carries a critical CA basic constraint, cert/CRL signing
/// key usage and a subject key identifier, so leaves issued from it get an
/// authority key identifier.
///
/// # Example
///
/// ```no_run
/// use opsman_security::crypto::rsa::generate_rsa_keypair;
/// use opsman_security::cert::x509_signing::create_self_signed_ca;
///
/// # fn example() -> opsman_security::error::Result<()> {
/// let mut rng = rand::rngs::OsRng;
/// let keypair = generate_rsa_keypair(&mut rng, 2048)?;
/// let cert_pem = create_self_signed_ca(&mut rng, &keypair, "ca.localhost", 3650)?;
/// assert!(cert_pem.contains("BEGIN CERTIFICATE"));
/// # Ok(())
/// # }
/// ```
pub fn create_self_signed_ca<R>(
    rng: &mut R,
    keypair: &RsaKeypair,
    subject_cn: &str,
    validity_days: u32,
) -> Result<String>
where
    R: RngCore + CryptoRng,
{
    let subject = common_name(subject_cn)?;
    let spki = keypair.public_key_info()?;
    let signature_algorithm = sha256_with_rsa();

    let extensions = vec![
        to_extension(
            &BasicConstraints {
                ca: true,
                path_len_constraint: None,
            },
            true,
        )?,
        to_extension(
            &KeyUsage(
                KeyUsages::DigitalSignature | KeyUsages::KeyCertSign | KeyUsages::CRLSign,
            ),
            true,
        )?,
        to_extension(&SubjectKeyIdentifier(key_identifier(&spki)?), false)?,
    ];

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: generate_serial_number(rng)?,
        signature: signature_algorithm.clone(),
        issuer: subject.clone(), // Self-signed
        validity: validity_from_now(validity_days)?,
        subject,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };

    let signature = sign_tbs(&tbs, &keypair.secret)?;

    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm,
        signature,
    };

    cert_to_pem(&cert)
}

/// The sha256WithRSAEncryption algorithm identifier, NULL parameters included.
pub fn sha256_with_rsa() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
        parameters: Some(Any::null()),
    }
}

/// Sign the DER encoding of `tbs` with `signing_key`.
pub fn sign_tbs(tbs: &TbsCertificate, signing_key: &RsaPrivateKey) -> Result<BitString> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| SecurityError::Encode(format!("Failed to encode TBS: {}", e)))?;

    let signer = SigningKey::<Sha256>::new(signing_key.clone());
    let signature = signer
        .try_sign(&tbs_der)
        .map_err(|e| SecurityError::Encode(format!("Failed to sign TBS: {}", e)))?;

    BitString::from_bytes(&signature.to_bytes()).map_err(|e| {
        SecurityError::Encode(format!("Failed to create signature bitstring: {}", e))
    })
}

/// Verify that `cert` was issued and signed by `issuer`.
///
/// This checks one link only: issuer name match and the RSA signature.
/// Validity periods and constraints are not evaluated.
pub fn check_signature_from(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(SecurityError::Verification(format!(
            "issuer {} does not match {}",
            cert.tbs_certificate.issuer, issuer.tbs_certificate.subject
        )));
    }

    if cert.signature_algorithm.oid != const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION {
        return Err(SecurityError::Verification(format!(
            "unsupported signature algorithm {}",
            cert.signature_algorithm.oid
        )));
    }

    let public_key = rsa_public_key(&issuer.tbs_certificate.subject_public_key_info)?;
    let verifier = VerifyingKey::<Sha256>::new(public_key);

    let signature = Signature::try_from(cert.signature.raw_bytes())
        .map_err(|e| SecurityError::Verification(format!("Malformed signature: {}", e)))?;

    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| SecurityError::Verification(format!("Failed to encode TBS: {}", e)))?;

    verifier
        .verify(&tbs_der, &signature)
        .map_err(|e| SecurityError::Verification(e.to_string()))
}

/// Extract the RSA public key from a SubjectPublicKeyInfo.
pub fn rsa_public_key(spki: &SubjectPublicKeyInfoOwned) -> Result<RsaPublicKey> {
    let der = spki
        .to_der()
        .map_err(|e| SecurityError::Encode(format!("Failed to encode public key info: {}", e)))?;

    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| SecurityError::InvalidKey(format!("Not an RSA public key: {}", e)))
}

/// Convert a Certificate to PEM format.
pub fn cert_to_pem(cert: &Certificate) -> Result<String> {
    let der = cert
        .to_der()
        .map_err(|e| SecurityError::Encode(format!("Failed to encode certificate: {}", e)))?;

    Ok(wrap_der_pem(der))
}

/// Wrap DER certificate bytes in a `CERTIFICATE` PEM block.
pub fn wrap_der_pem(der: Vec<u8>) -> String {
    pem::encode(&pem::Pem::new(CERTIFICATE_PEM_TAG, der))
}

/// Load a Certificate from PEM bytes.
///
/// Only the first PEM block is considered and it must be labelled
/// `CERTIFICATE`. Input without any PEM block is an error.
pub fn cert_from_pem(pem_bytes: &[u8]) -> Result<Certificate> {
    let pem = pem::parse(pem_bytes)
        .map_err(|e| SecurityError::ParentParse(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != CERTIFICATE_PEM_TAG {
        return Err(SecurityError::ParentParse(format!(
            "Expected {}, got {}",
            CERTIFICATE_PEM_TAG,
            pem.tag()
        )));
    }

    Certificate::from_der(pem.contents())
        .map_err(|e| SecurityError::ParentParse(format!("Failed to decode certificate: {}", e)))
}

// Truncated SHA-256 of the subject public key bits (RFC 7093, method 1).
fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Result<OctetString> {
    let digest = Sha256::digest(spki.subject_public_key.raw_bytes());
    OctetString::new(&digest[..20])
        .map_err(|e| SecurityError::Encode(format!("Failed to create key identifier: {}", e)))
}

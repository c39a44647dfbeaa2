//! Certificate builder utilities.
//!
//! This module provides the pieces a leaf template is assembled from: random
//! serial numbers, subject names, validity windows and the X.509 v3
//! extensions a server certificate carries.

use crate::error::{Result, SecurityError};
use const_oid::AssociatedOid;
use der::asn1::{Ia5String, OctetString, SetOfVec};
use der::{Any, Encode, Tag};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;
use x509_cert::Certificate;

/// Organization placed in every leaf subject unless configured otherwise.
pub const DEFAULT_ORGANIZATION: &str = "Pivotal";

/// Leaf certificates are valid for one year.
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Serial numbers are 128 bits wide.
pub const SERIAL_NUMBER_BYTES: usize = 16;

/// Tunable parts of an issued leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafProfile {
    /// Subject organization (`O=`).
    pub organization: String,
    /// Validity window in days, starting at the moment of issuance.
    pub validity_days: u32,
    /// Modulus size of the generated leaf key.
    pub key_bits: usize,
}

impl LeafProfile {
    /// Reject profiles that cannot yield a usable certificate.
    pub fn validate(&self) -> Result<()> {
        if self.validity_days == 0 {
            return Err(SecurityError::Config(
                "validity_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LeafProfile {
    fn default() -> Self {
        Self {
            organization: DEFAULT_ORGANIZATION.to_string(),
            validity_days: DEFAULT_VALIDITY_DAYS,
            key_bits: crate::crypto::rsa::DEFAULT_RSA_BITS,
        }
    }
}

/// Everything about a leaf certificate that is decided before a key or
/// issuer is involved.
#[derive(Debug, Clone)]
pub struct LeafTemplate {
    pub serial_number: SerialNumber,
    pub subject: Name,
    pub validity: Validity,
    pub dns_names: Vec<String>,
}

impl LeafTemplate {
    /// Build a template with a fresh serial from `rng` and a validity window
    /// starting now.
    pub fn new<R, S>(rng: &mut R, profile: &LeafProfile, dns_names: &[S]) -> Result<Self>
    where
        R: RngCore + CryptoRng,
        S: AsRef<str>,
    {
        Ok(Self {
            serial_number: generate_serial_number(rng)?,
            subject: organization_name(&profile.organization)?,
            validity: validity_from_now(profile.validity_days)?,
            dns_names: dns_names.iter().map(|n| n.as_ref().to_string()).collect(),
        })
    }

    /// The v3 extensions of a server leaf certificate.
    ///
    /// Key usage and basic constraints are critical. The SAN extension is only
    /// present when DNS names were given; the authority key identifier only
    /// when the issuer publishes a subject key identifier.
    pub fn extensions(&self, authority_key_id: Option<OctetString>) -> Result<Vec<Extension>> {
        let mut extensions = vec![
            to_extension(
                &KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
                true,
            )?,
            to_extension(
                &ExtendedKeyUsage(vec![const_oid::db::rfc5280::ID_KP_SERVER_AUTH]),
                false,
            )?,
            to_extension(
                &BasicConstraints {
                    ca: false,
                    path_len_constraint: None,
                },
                true,
            )?,
        ];

        if !self.dns_names.is_empty() {
            extensions.push(to_extension(&subject_alt_names(&self.dns_names)?, false)?);
        }

        if let Some(key_identifier) = authority_key_id {
            let aki = AuthorityKeyIdentifier {
                key_identifier: Some(key_identifier),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            };
            extensions.push(to_extension(&aki, false)?);
        }

        Ok(extensions)
    }
}

/// Draw a uniformly random 128-bit unsigned serial number.
pub fn generate_serial_number<R>(rng: &mut R) -> Result<SerialNumber>
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| SecurityError::RandomSource(e.to_string()))?;

    SerialNumber::new(&bytes)
        .map_err(|e| SecurityError::Encode(format!("Failed to create serial number: {}", e)))
}

/// A subject name holding a single `O=` attribute.
pub fn organization_name(organization: &str) -> Result<Name> {
    single_attribute_name(const_oid::db::rfc4519::O, organization)
}

/// A subject name holding a single `CN=` attribute.
pub fn common_name(cn: &str) -> Result<Name> {
    single_attribute_name(const_oid::db::rfc4519::CN, cn)
}

fn single_attribute_name(oid: der::oid::ObjectIdentifier, value: &str) -> Result<Name> {
    let attr = AttributeTypeAndValue {
        oid,
        value: Any::new(Tag::Utf8String, value.as_bytes())
            .map_err(|e| SecurityError::Encode(format!("Invalid name attribute: {}", e)))?,
    };

    let attr_set = SetOfVec::try_from(vec![attr])
        .map_err(|e| SecurityError::Encode(format!("Failed to add attribute: {}", e)))?;

    Ok(RdnSequence(vec![RelativeDistinguishedName::from(attr_set)]))
}

/// A validity window of `days` starting at the current instant.
///
/// NotBefore must precede NotAfter, so zero days is rejected.
pub fn validity_from_now(days: u32) -> Result<Validity> {
    if days == 0 {
        return Err(SecurityError::Config(
            "validity window must span at least one day".to_string(),
        ));
    }

    Validity::from_now(Duration::from_secs(days as u64 * 24 * 60 * 60))
        .map_err(|e| SecurityError::Encode(format!("Failed to create validity: {}", e)))
}

/// The subject key identifier published by `cert`, if any.
pub fn subject_key_identifier(cert: &Certificate) -> Result<Option<OctetString>> {
    find_extension::<SubjectKeyIdentifier>(cert).map(|ski| ski.map(|ski| ski.0))
}

/// Decode the extension of type `T` from `cert`.
pub fn find_extension<T>(cert: &Certificate) -> Result<Option<T>>
where
    T: AssociatedOid + for<'a> der::Decode<'a>,
{
    let extensions = match &cert.tbs_certificate.extensions {
        Some(extensions) => extensions,
        None => return Ok(None),
    };

    extensions
        .iter()
        .find(|ext| ext.extn_id == T::OID)
        .map(|ext| {
            T::from_der(ext.extn_value.as_bytes()).map_err(|e| {
                SecurityError::ParentParse(format!("Malformed extension {}: {}", T::OID, e))
            })
        })
        .transpose()
}

pub(crate) fn to_extension<T>(value: &T, critical: bool) -> Result<Extension>
where
    T: AssociatedOid + Encode,
{
    let der = value
        .to_der()
        .map_err(|e| SecurityError::Encode(format!("Failed to encode extension: {}", e)))?;

    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(der)
            .map_err(|e| SecurityError::Encode(format!("Failed to wrap extension: {}", e)))?,
    })
}

fn subject_alt_names(dns_names: &[String]) -> Result<SubjectAltName> {
    dns_names
        .iter()
        .map(|name| {
            Ia5String::new(name)
                .map(GeneralName::DnsName)
                .map_err(|e| SecurityError::Encode(format!("Invalid DNS name {:?}: {}", name, e)))
        })
        .collect::<Result<Vec<_>>>()
        .map(SubjectAltName)
}

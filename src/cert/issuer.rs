//! Leaf certificate issuance.
//!
//! [`LeafCertIssuer`] turns a parent CA (certificate plus private key) and a
//! list of DNS names into a DER-encoded server certificate with a freshly
//! generated RSA key.

use crate::cert::builder::{subject_key_identifier, LeafProfile, LeafTemplate};
use crate::cert::x509_signing::{cert_from_pem, sha256_with_rsa, sign_tbs, wrap_der_pem};
use crate::crypto::rsa::{generate_rsa_keypair, import_rsa_from_pem, RsaKeypair};
use crate::error::{Result, SecurityError};
use der::Encode;
use rand::rngs::{OsRng, StdRng};
use rand::{CryptoRng, RngCore, SeedableRng};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};

/// A parent CA able to sign leaves: its certificate and matching private key.
#[derive(Debug, Clone)]
pub struct ParentCa {
    pub certificate: Certificate,
    pub keypair: RsaKeypair,
}

impl ParentCa {
    /// Pair a certificate with its private key, rejecting mismatched keys.
    pub fn new(certificate: Certificate, keypair: RsaKeypair) -> Result<Self> {
        let cert_spki = &certificate.tbs_certificate.subject_public_key_info;
        if *cert_spki != keypair.public_key_info()? {
            return Err(SecurityError::Encode(
                "parent private key does not match parent certificate".to_string(),
            ));
        }

        Ok(Self {
            certificate,
            keypair,
        })
    }

    /// Parse the first PEM block of `cert_pem` as the CA certificate and
    /// `key_pem` as its RSA private key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &str) -> Result<Self> {
        let certificate = cert_from_pem(cert_pem)?;
        let keypair = import_rsa_from_pem(key_pem)?;
        Self::new(certificate, keypair)
    }
}

/// The outcome of an issuance: bare DER certificate bytes and the leaf key.
#[derive(Debug, Clone)]
pub struct IssuedCert {
    pub der: Vec<u8>,
    pub keypair: RsaKeypair,
}

impl IssuedCert {
    /// The certificate wrapped in a `CERTIFICATE` PEM block.
    pub fn certificate_pem(&self) -> String {
        wrap_der_pem(self.der.clone())
    }

    /// The leaf private key as PKCS#8 PEM.
    pub fn private_key_pem(&self) -> Result<String> {
        self.keypair.to_pkcs8_pem()
    }
}

/// Issues RSA server certificates under a caller-supplied parent CA.
///
/// The random source is injected and guarded by a mutex, so a single issuer
/// may be shared between threads.
#[derive(Debug)]
pub struct LeafCertIssuer<R = OsRng> {
    rng: Mutex<R>,
    profile: LeafProfile,
}

impl LeafCertIssuer<OsRng> {
    /// An issuer drawing from the operating system CSPRNG.
    pub fn with_os_rng(profile: LeafProfile) -> Self {
        Self::new(OsRng, profile)
    }
}

impl Default for LeafCertIssuer<OsRng> {
    fn default() -> Self {
        Self::with_os_rng(LeafProfile::default())
    }
}

impl<R> LeafCertIssuer<R>
where
    R: RngCore + CryptoRng,
{
    pub fn new(rng: R, profile: LeafProfile) -> Self {
        Self {
            rng: Mutex::new(rng),
            profile,
        }
    }

    pub fn profile(&self) -> &LeafProfile {
        &self.profile
    }

    /// Generate a leaf certificate for `dns_names` under the parent CA given
    /// as PEM certificate bytes and PEM private key.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use opsman_security::cert::issuer::LeafCertIssuer;
    ///
    /// # fn example(ca_pem: &[u8], ca_key_pem: &str) -> opsman_security::error::Result<()> {
    /// let issuer = LeafCertIssuer::default();
    /// let issued = issuer.generate_rsa_cert(ca_pem, ca_key_pem, &["*.apps.example.com"])?;
    /// println!("{}", issued.certificate_pem());
    /// # Ok(())
    /// # }
    /// ```
    pub fn generate_rsa_cert<S>(
        &self,
        parent_pem: &[u8],
        parent_key_pem: &str,
        dns_names: &[S],
    ) -> Result<IssuedCert>
    where
        S: AsRef<str>,
    {
        let template = self.template(dns_names)?;
        let parent = ParentCa::from_pem(parent_pem, parent_key_pem)?;
        self.sign_leaf(template, &parent)
    }

    /// Issue a leaf certificate under an already parsed parent CA.
    pub fn issue<S>(&self, parent: &ParentCa, dns_names: &[S]) -> Result<IssuedCert>
    where
        S: AsRef<str>,
    {
        let template = self.template(dns_names)?;
        self.sign_leaf(template, parent)
    }

    fn lock_rng(&self) -> Result<MutexGuard<'_, R>> {
        self.rng
            .lock()
            .map_err(|_| SecurityError::RandomSource("random source lock poisoned".into()))
    }

    fn template<S>(&self, dns_names: &[S]) -> Result<LeafTemplate>
    where
        S: AsRef<str>,
    {
        let mut rng = self.lock_rng()?;
        LeafTemplate::new(&mut *rng, &self.profile, dns_names)
    }

    // Seeded under the lock; key generation itself runs unlocked.
    fn key_rng(&self) -> Result<StdRng> {
        let mut rng = self.lock_rng()?;
        StdRng::from_rng(&mut *rng).map_err(|e| SecurityError::RandomSource(e.to_string()))
    }

    fn sign_leaf(&self, template: LeafTemplate, parent: &ParentCa) -> Result<IssuedCert> {
        debug!(
            serial = %hex::encode(template.serial_number.as_bytes()),
            bits = self.profile.key_bits,
            "generating leaf key"
        );
        let keypair = generate_rsa_keypair(&mut self.key_rng()?, self.profile.key_bits)?;

        let parent_tbs = &parent.certificate.tbs_certificate;
        let extensions = template.extensions(subject_key_identifier(&parent.certificate)?)?;
        let signature_algorithm = sha256_with_rsa();

        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: template.serial_number,
            signature: signature_algorithm.clone(),
            issuer: parent_tbs.subject.clone(),
            validity: template.validity,
            subject: template.subject,
            subject_public_key_info: keypair.public_key_info()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        };

        // Signed with the parent's key, not the leaf's.
        let signature = sign_tbs(&tbs, &parent.keypair.secret)?;

        let cert = Certificate {
            tbs_certificate: tbs,
            signature_algorithm,
            signature,
        };

        let der = cert
            .to_der()
            .map_err(|e| SecurityError::Encode(format!("Failed to encode certificate: {}", e)))?;

        info!(
            issuer = %parent_tbs.subject,
            serial = %hex::encode(cert.tbs_certificate.serial_number.as_bytes()),
            dns_names = template.dns_names.len(),
            "issued leaf certificate"
        );

        Ok(IssuedCert { der, keypair })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::x509_signing::{check_signature_from, create_self_signed_ca};
    use crate::error::ErrorKind;
    use der::Decode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TEST_BITS: usize = 1024;

    fn test_profile() -> LeafProfile {
        LeafProfile {
            key_bits: TEST_BITS,
            ..LeafProfile::default()
        }
    }

    fn test_parent(seed: u64) -> (String, String) {
        let mut rng = StdRng::seed_from_u64(seed);
        let keypair = generate_rsa_keypair(&mut rng, TEST_BITS).unwrap();
        let cert_pem = create_self_signed_ca(&mut rng, &keypair, "ca.localhost", 3650).unwrap();
        (cert_pem, keypair.to_pkcs8_pem().unwrap())
    }

    #[test]
    fn test_issued_cert_verifies_against_parent() {
        let (cert_pem, key_pem) = test_parent(1);
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(10), test_profile());

        let issued = issuer
            .generate_rsa_cert(cert_pem.as_bytes(), &key_pem, &["app.example.com"])
            .unwrap();

        let leaf = Certificate::from_der(&issued.der).unwrap();
        let parent = cert_from_pem(cert_pem.as_bytes()).unwrap();
        check_signature_from(&leaf, &parent).unwrap();
    }

    #[test]
    fn test_issued_cert_binds_leaf_key() {
        let (cert_pem, key_pem) = test_parent(2);
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(11), test_profile());

        let issued = issuer
            .generate_rsa_cert(cert_pem.as_bytes(), &key_pem, &["app.example.com"])
            .unwrap();

        let leaf = Certificate::from_der(&issued.der).unwrap();
        assert_eq!(
            leaf.tbs_certificate.subject_public_key_info,
            issued.keypair.public_key_info().unwrap()
        );
        assert!(issued.private_key_pem().unwrap().contains("BEGIN PRIVATE KEY"));
        assert!(issued.certificate_pem().contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn test_seeded_issuers_repeat_serials() {
        let (cert_pem, key_pem) = test_parent(3);
        let parent = ParentCa::from_pem(cert_pem.as_bytes(), &key_pem).unwrap();

        let serial = |seed| {
            let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(seed), test_profile());
            let issued = issuer.issue(&parent, &["a.example.com"]).unwrap();
            Certificate::from_der(&issued.der)
                .unwrap()
                .tbs_certificate
                .serial_number
        };

        assert_eq!(serial(20), serial(20));
        assert_ne!(serial(20), serial(21));
    }

    #[test]
    fn test_successive_serials_differ() {
        let (cert_pem, key_pem) = test_parent(4);
        let parent = ParentCa::from_pem(cert_pem.as_bytes(), &key_pem).unwrap();
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(30), test_profile());

        let first = issuer.issue(&parent, &["a.example.com"]).unwrap();
        let second = issuer.issue(&parent, &["a.example.com"]).unwrap();

        let serial_of = |der: &[u8]| {
            Certificate::from_der(der)
                .unwrap()
                .tbs_certificate
                .serial_number
        };
        assert_ne!(
            serial_of(first.der.as_slice()),
            serial_of(second.der.as_slice())
        );
    }

    #[test]
    fn test_mismatched_parent_key_is_rejected() {
        let (cert_pem, _) = test_parent(5);
        let (_, other_key_pem) = test_parent(6);
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(40), test_profile());

        let err = issuer
            .generate_rsa_cert(cert_pem.as_bytes(), &other_key_pem, &["a.example.com"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn test_missing_parent_pem_is_an_error() {
        let (_, key_pem) = test_parent(7);
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(50), test_profile());

        let err = issuer
            .generate_rsa_cert(b"no pem here", &key_pem, &["a.example.com"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParentParse);
    }

    #[test]
    fn test_invalid_parent_key_is_an_error() {
        let (cert_pem, _) = test_parent(8);
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(60), test_profile());

        let err = issuer
            .generate_rsa_cert(cert_pem.as_bytes(), "garbage", &["a.example.com"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey);
    }

    struct FailingRng;

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            Err(rand::Error::new("entropy source unavailable"))
        }
    }

    impl CryptoRng for FailingRng {}

    #[test]
    fn test_random_source_failure_is_returned() {
        let (cert_pem, key_pem) = test_parent(9);
        let issuer = LeafCertIssuer::new(FailingRng, test_profile());

        let err = issuer
            .generate_rsa_cert(cert_pem.as_bytes(), &key_pem, &["a.example.com"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RandomSource);
        assert!(err.to_string().contains("entropy source unavailable"));
    }

    #[test]
    fn test_key_rng_releases_lock() {
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(70), test_profile());

        let _key_rng = issuer.key_rng().unwrap();
        assert!(issuer.rng.try_lock().is_ok());
    }

    #[test]
    fn test_key_rng_failure_is_returned() {
        let issuer = LeafCertIssuer::new(FailingRng, test_profile());

        let err = issuer.key_rng().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RandomSource);
    }

    #[test]
    fn test_concurrent_issuance_on_shared_issuer() {
        let (cert_pem, key_pem) = test_parent(11);
        let parent = ParentCa::from_pem(cert_pem.as_bytes(), &key_pem).unwrap();
        let issuer = LeafCertIssuer::new(StdRng::seed_from_u64(80), test_profile());

        let (issuer, parent) = (&issuer, &parent);

        let serials: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(move || issuer.issue(parent, &["a.example.com"]).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    let issued = handle.join().unwrap();
                    Certificate::from_der(&issued.der)
                        .unwrap()
                        .tbs_certificate
                        .serial_number
                })
                .collect()
        });

        assert_ne!(serials[0], serials[1]);
    }

    #[test]
    fn test_zero_validity_profile_is_rejected() {
        let (cert_pem, key_pem) = test_parent(12);
        let issuer = LeafCertIssuer::new(
            StdRng::seed_from_u64(90),
            LeafProfile {
                validity_days: 0,
                ..test_profile()
            },
        );

        let err = issuer
            .generate_rsa_cert(cert_pem.as_bytes(), &key_pem, &["a.example.com"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_issuer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LeafCertIssuer<StdRng>>();
        assert_send_sync::<LeafCertIssuer>();
    }
}

//! Certificate generation module.
//!
//! This module builds RSA server certificates signed by a caller-supplied
//! parent CA, plus the PEM and signature helpers around them.

pub mod builder;
pub mod issuer;
pub mod loader;
pub mod x509_signing;

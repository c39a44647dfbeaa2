//! Platform management API access.
//!
//! This module provides the HTTP invoker seam, its hyper implementation and
//! the root CA retrieval client built on it.

pub mod client;
pub mod config;
pub mod root_ca;

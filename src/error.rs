//! Error types for the security client.
//!
//! Every variant carries the message of the stage that failed, so the
//! rendered error reads like `failed to submit request: connection refused`.
//! Callers that need to branch on the failure class use [`SecurityError::kind`].

use thiserror::Error;

/// The main error type for root CA retrieval and leaf certificate issuance.
#[derive(Error, Debug)]
pub enum SecurityError {
    /// The outbound HTTP request could not be built
    #[error("failed constructing request: {0}")]
    RequestConstruction(String),

    /// The HTTP invoker returned a transport error
    #[error("failed to submit request: {0}")]
    Submit(String),

    /// The response body could not be read to completion
    #[error("failed to read response body: {0}")]
    BodyRead(String),

    /// The API answered with something other than 200 OK; carries the response dump
    #[error("could not make api request: unexpected response.\n{0}")]
    UnexpectedStatus(String),

    /// The API answered with a non-200 status and the response could not be dumped
    #[error("request failed: unexpected response: {0}")]
    ResponseDump(String),

    /// The response body was not the expected JSON envelope
    #[error("failed to unmarshal response: {0}")]
    Decode(String),

    /// The random source could not produce a serial number
    #[error("failed to draw random serial number: {0}")]
    RandomSource(String),

    /// RSA key generation failed
    #[error("failed to generate RSA key: {0}")]
    KeyGeneration(String),

    /// A private key could not be parsed
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// The parent CA PEM did not yield a parseable certificate
    #[error("failed to parse parent certificate: {0}")]
    ParentParse(String),

    /// The certificate could not be assembled, encoded or signed
    #[error("failed to create certificate: {0}")]
    Encode(String),

    /// A certificate signature did not check out against its issuer
    #[error("signature verification failed: {0}")]
    Verification(String),

    /// Client or issuer configuration is unusable
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failure classes, independent of the stage message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    UnexpectedStatus,
    Decode,
    RandomSource,
    KeyGeneration,
    InvalidKey,
    ParentParse,
    Encode,
    Verification,
    Config,
}

impl SecurityError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecurityError::RequestConstruction(_)
            | SecurityError::Submit(_)
            | SecurityError::BodyRead(_) => ErrorKind::Transport,
            SecurityError::UnexpectedStatus(_) | SecurityError::ResponseDump(_) => {
                ErrorKind::UnexpectedStatus
            }
            SecurityError::Decode(_) => ErrorKind::Decode,
            SecurityError::RandomSource(_) => ErrorKind::RandomSource,
            SecurityError::KeyGeneration(_) => ErrorKind::KeyGeneration,
            SecurityError::InvalidKey(_) => ErrorKind::InvalidKey,
            SecurityError::ParentParse(_) => ErrorKind::ParentParse,
            SecurityError::Encode(_) => ErrorKind::Encode,
            SecurityError::Verification(_) => ErrorKind::Verification,
            SecurityError::Config(_) => ErrorKind::Config,
        }
    }
}

/// A specialized Result type for security operations.
pub type Result<T> = std::result::Result<T, SecurityError>;

//! Key store error types.

use serde_json::{json, Value};
use thiserror::Error;

/// Errors surfaced by a [`KeyStore`](crate::KeyStore).
///
/// The HTTP layer maps `Rejected` to a failure envelope carrying the detail and
/// `Fault` to an error envelope carrying the message.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the request (bad key document, bad parameters,
    /// cryptographic rejection). The detail is returned to the caller as-is.
    #[error("rejected: {0}")]
    Rejected(Value),

    /// Unexpected failure inside the store.
    #[error("key store fault: {0}")]
    Fault(String),
}

impl StoreError {
    /// Builds a rejection with an error code and a human readable reason.
    pub fn rejected(code: &str, reason: impl Into<String>) -> Self {
        Self::Rejected(json!({ "error": code, "reason": reason.into() }))
    }
}

/// Errors raised while decoding an RSA JWK.
#[derive(Debug, Error)]
pub enum JwkError {
    /// The document is not a JSON object.
    #[error("key document must be a JSON object")]
    NotAnObject,

    /// `kty` is missing or not `RSA`.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// A public parameter (`n` or `e`) is missing.
    #[error("missing public parameter: {0}")]
    MissingPublic(&'static str),

    /// One or more private parameters are missing.
    #[error("missing private parameters: {}", .0.join(", "))]
    MissingPrivate(Vec<&'static str>),

    /// A parameter is not valid base64url.
    #[error("invalid encoding for parameter {0}")]
    Encoding(&'static str),

    /// The components do not form a valid RSA key.
    #[error("invalid key: {0}")]
    Invalid(String),
}

impl From<JwkError> for StoreError {
    fn from(e: JwkError) -> Self {
        match e {
            JwkError::MissingPrivate(missing) => StoreError::Rejected(json!({
                "error": "missing_private_parameters",
                "missing": missing,
            })),
            other => StoreError::rejected("invalid_key", other.to_string()),
        }
    }
}

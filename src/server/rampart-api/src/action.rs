//! Validation of key action requests.
//!
//! The `action`, `padding` and `hash_type` path segments are checked against a
//! fixed compatibility table before anything touches the key store:
//!
//! | action  | padding | hash        | operation            |
//! |---------|---------|-------------|----------------------|
//! | decrypt | -       | -           | raw decrypt          |
//! | decrypt | pkcs1   | -           | PKCS#1 v1.5 decrypt  |
//! | sign    | pkcs1   | -           | PKCS#1 v1.5 sign     |
//! | decrypt | oaep    | any digest  | OAEP decrypt         |
//! | sign    | pss     | any digest  | PSS sign             |

use rampart_keystore::{DecryptPadding, HashAlgorithm, SignPadding};
use thiserror::Error;

use crate::routes::RouteBinding;

/// Why an action request did not resolve to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The route carried no action segment.
    #[error("missing action")]
    MissingAction,

    /// The action token is not `sign` or `decrypt`.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The padding token is not recognised.
    #[error("unknown padding: {0}")]
    UnknownPadding(String),

    /// The tokens parsed but the combination is not in the table.
    #[error("unsupported combination: {0}")]
    Unsupported(String),
}

/// Operation requested on a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Produce a signature.
    Sign,
    /// Recover a plaintext.
    Decrypt,
}

/// Padding segment of an action path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingToken {
    /// No padding segment.
    Absent,
    /// `pkcs1`
    Pkcs1,
    /// `oaep`
    Oaep,
    /// `pss`
    Pss,
}

/// Hash segment of an action path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashToken {
    /// No hash segment.
    Absent,
    /// A supported digest.
    Named(HashAlgorithm),
    /// A segment that names no supported digest.
    Invalid(String),
}

/// Action, padding and hash tokens taken from the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// Requested action.
    pub action: Action,
    /// Padding segment.
    pub padding: PaddingToken,
    /// Hash segment.
    pub hash: HashToken,
}

/// A validated cryptographic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Sign with the given padding.
    Sign(SignPadding),
    /// Decrypt with the given padding.
    Decrypt(DecryptPadding),
}

impl ActionRequest {
    /// Reads the `action`, `padding` and `hash_type` segments.
    pub fn from_tokens(
        action: Option<&str>,
        padding: Option<&str>,
        hash: Option<&str>,
    ) -> Result<Self, DispatchError> {
        let action = match action {
            Some("sign") => Action::Sign,
            Some("decrypt") => Action::Decrypt,
            Some(other) => return Err(DispatchError::UnknownAction(other.to_string())),
            None => return Err(DispatchError::MissingAction),
        };

        let padding = match padding {
            None => PaddingToken::Absent,
            Some("pkcs1") => PaddingToken::Pkcs1,
            Some("oaep") => PaddingToken::Oaep,
            Some("pss") => PaddingToken::Pss,
            Some(other) => return Err(DispatchError::UnknownPadding(other.to_string())),
        };

        let hash = match hash {
            None => HashToken::Absent,
            Some(token) => match token.parse::<HashAlgorithm>() {
                Ok(algorithm) => HashToken::Named(algorithm),
                Err(_) => HashToken::Invalid(token.to_string()),
            },
        };

        Ok(Self {
            action,
            padding,
            hash,
        })
    }

    /// Checks the request against the compatibility table.
    pub fn resolve(&self) -> Result<Operation, DispatchError> {
        use PaddingToken as P;

        match (self.action, self.padding, &self.hash) {
            (Action::Decrypt, P::Absent, HashToken::Absent) => {
                Ok(Operation::Decrypt(DecryptPadding::None))
            },
            (Action::Decrypt, P::Pkcs1, HashToken::Absent) => {
                Ok(Operation::Decrypt(DecryptPadding::Pkcs1))
            },
            (Action::Sign, P::Pkcs1, HashToken::Absent) => Ok(Operation::Sign(SignPadding::Pkcs1)),
            (Action::Decrypt, P::Oaep, HashToken::Named(hash)) => {
                Ok(Operation::Decrypt(DecryptPadding::Oaep(*hash)))
            },
            (Action::Sign, P::Pss, HashToken::Named(hash)) => {
                Ok(Operation::Sign(SignPadding::Pss(*hash)))
            },
            _ => Err(DispatchError::Unsupported(format!("{:?}", self))),
        }
    }
}

/// Resolves the operation named by an action route's bindings.
pub fn resolve(binding: &RouteBinding) -> Result<Operation, DispatchError> {
    ActionRequest::from_tokens(
        binding.get("action"),
        binding.get("padding"),
        binding.get("hash_type"),
    )?
    .resolve()
}

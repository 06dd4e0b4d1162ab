//! # Rampart Key Store
//!
//! Key storage and private-key operations for Rampart.
//!
//! ## Features
//!
//! - RSA keys imported as JWK documents
//! - Public material exported as JWK or SPKI PEM
//! - Sign with PKCS#1 v1.5 or PSS
//! - Decrypt raw, with PKCS#1 v1.5 or with OAEP
//!
//! The HTTP layer only talks to the [`KeyStore`] trait. [`MemoryKeyStore`] is the
//! process-local implementation used by the server.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod jwk;
pub mod memory;
pub mod padding;
pub mod random;
pub mod store;

mod ops;

pub use error::{JwkError, StoreError};
pub use memory::MemoryKeyStore;
pub use padding::{DecryptPadding, HashAlgorithm, SignPadding};
pub use store::{KeyId, KeyStore, StoredKey};

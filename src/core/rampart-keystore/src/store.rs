//! Key store trait definition.

use std::sync::Arc;

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::padding::{DecryptPadding, SignPadding};

/// Opaque key identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Wraps an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A key the store has confirmed to exist.
///
/// Handles are only obtained through [`KeyStore::get`] (or by a store
/// implementation), so holding one is proof that the lookup succeeded. Operations
/// taking a handle never report "not found".
#[derive(Clone)]
pub struct StoredKey {
    id: KeyId,
    material: Arc<RsaPrivateKey>,
}

impl StoredKey {
    /// Creates a handle for the given id and key material.
    pub fn new(id: KeyId, material: Arc<RsaPrivateKey>) -> Self {
        Self { id, material }
    }

    /// The key identifier.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// Shared reference to the private key material.
    pub fn material(&self) -> Arc<RsaPrivateKey> {
        Arc::clone(&self.material)
    }
}

impl std::fmt::Debug for StoredKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredKey")
            .field("id", &self.id)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Key store consumed by the HTTP layer.
///
/// A single instance is shared by every in-flight request. Implementations are
/// responsible for their own synchronisation and for id uniqueness.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Lists every key with its public JWK, ordered by id.
    async fn list(&self) -> Result<Vec<(KeyId, Value)>, StoreError>;

    /// Imports a key document and returns the id assigned to it.
    async fn add(&self, key: Value) -> Result<KeyId, StoreError>;

    /// Looks up a key by id.
    async fn get(&self, id: &str) -> Option<StoredKey>;

    /// Replaces the material of an existing key.
    ///
    /// Returns `true` if an entry was replaced and `false` if the entry had been
    /// removed concurrently and was stored again under the same id.
    async fn put(&self, key: &StoredKey, document: Value) -> Result<bool, StoreError>;

    /// Removes a key. Returns whether this call removed the entry; the key is
    /// absent afterwards either way.
    async fn del(&self, key: StoredKey) -> bool;

    /// Signs `params.message` (base64) and returns `{"signature": base64}`.
    async fn sign(
        &self,
        key: &StoredKey,
        padding: SignPadding,
        params: Value,
    ) -> Result<Value, StoreError>;

    /// Decrypts `params.ciphertext` (base64) and returns `{"plaintext": base64}`.
    async fn decrypt(
        &self,
        key: &StoredKey,
        padding: DecryptPadding,
        params: Value,
    ) -> Result<Value, StoreError>;

    /// Public JWK for a key.
    fn public_key_json(&self, key: &StoredKey) -> Value;

    /// SPKI PEM encoding of the public key.
    fn public_key_pem(&self, key: &StoredKey) -> Result<String, StoreError>;
}

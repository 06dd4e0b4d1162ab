//! In-memory key store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::jwk;
use crate::ops;
use crate::padding::{DecryptPadding, SignPadding};
use crate::random::generate_key_id;
use crate::store::{KeyId, KeyStore, StoredKey};

/// Key store holding RSA keys in process memory.
///
/// The map lock is only held for lookups and updates; RSA computation runs on
/// the blocking thread pool against a shared handle to the key material.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: RwLock<BTreeMap<KeyId, Arc<RsaPrivateKey>>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh RSA key of `bits` bits and stores it.
    pub async fn generate(&self, bits: usize) -> Result<KeyId, StoreError> {
        let key = tokio::task::spawn_blocking(move || RsaPrivateKey::new(&mut OsRng, bits))
            .await
            .map_err(|e| StoreError::Fault(format!("key generation task failed: {}", e)))?
            .map_err(|e| StoreError::rejected("invalid_key_size", e.to_string()))?;

        let id = self.insert(key).await;
        info!(id = %id, bits = bits, "RSA key generated");
        Ok(id)
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    async fn insert(&self, key: RsaPrivateKey) -> KeyId {
        let material = Arc::new(key);
        let mut keys = self.keys.write().await;
        loop {
            let id = KeyId::new(generate_key_id());
            if !keys.contains_key(&id) {
                keys.insert(id.clone(), material);
                return id;
            }
        }
    }
}

/// Decodes a required base64 field from operation parameters.
fn decode_field(params: &Value, field: &str) -> Result<Vec<u8>, StoreError> {
    let encoded = params.get(field).and_then(Value::as_str).ok_or_else(|| {
        StoreError::rejected(
            "invalid_parameters",
            format!("expected a base64 string field '{}'", field),
        )
    })?;
    BASE64.decode(encoded).map_err(|e| {
        StoreError::rejected(
            "invalid_parameters",
            format!("field '{}' is not valid base64: {}", field, e),
        )
    })
}

/// Runs an RSA primitive on the blocking pool.
async fn run_blocking<F>(label: &'static str, f: F) -> Result<Vec<u8>, StoreError>
where
    F: FnOnce() -> Result<Vec<u8>, rsa::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Fault(format!("{} task failed: {}", label, e)))?
        .map_err(|e| StoreError::rejected("operation_failed", format!("{}: {}", label, e)))
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn list(&self) -> Result<Vec<(KeyId, Value)>, StoreError> {
        let keys = self.keys.read().await;
        Ok(keys
            .iter()
            .map(|(id, key)| (id.clone(), jwk::public_jwk(id, key)))
            .collect())
    }

    async fn add(&self, key: Value) -> Result<KeyId, StoreError> {
        let key = jwk::parse_private_key(&key)?;
        let bits = key.size() * 8;
        let id = self.insert(key).await;
        info!(id = %id, bits = bits, "RSA key imported");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Option<StoredKey> {
        let keys = self.keys.read().await;
        keys.get_key_value(&KeyId::from(id))
            .map(|(id, material)| StoredKey::new(id.clone(), Arc::clone(material)))
    }

    async fn put(&self, key: &StoredKey, document: Value) -> Result<bool, StoreError> {
        let material = Arc::new(jwk::parse_private_key(&document)?);
        let replaced = self
            .keys
            .write()
            .await
            .insert(key.id().clone(), material)
            .is_some();

        if replaced {
            info!(id = %key.id(), "RSA key replaced");
        } else {
            warn!(id = %key.id(), "RSA key re-created after concurrent removal");
        }
        Ok(replaced)
    }

    async fn del(&self, key: StoredKey) -> bool {
        let removed = self.keys.write().await.remove(key.id()).is_some();
        if removed {
            warn!(id = %key.id(), "RSA key deleted");
        } else {
            debug!(id = %key.id(), "RSA key already removed");
        }
        removed
    }

    async fn sign(
        &self,
        key: &StoredKey,
        padding: SignPadding,
        params: Value,
    ) -> Result<Value, StoreError> {
        let message = decode_field(&params, "message")?;
        let material = key.material();
        let signature = run_blocking("sign", move || ops::sign(&material, padding, &message)).await?;

        debug!(id = %key.id(), padding = ?padding, "message signed");
        Ok(json!({ "signature": BASE64.encode(signature) }))
    }

    async fn decrypt(
        &self,
        key: &StoredKey,
        padding: DecryptPadding,
        params: Value,
    ) -> Result<Value, StoreError> {
        let ciphertext = decode_field(&params, "ciphertext")?;
        let material = key.material();
        let plaintext =
            run_blocking("decrypt", move || ops::decrypt(&material, padding, &ciphertext)).await?;

        debug!(id = %key.id(), padding = ?padding, "ciphertext decrypted");
        Ok(json!({ "plaintext": BASE64.encode(plaintext) }))
    }

    fn public_key_json(&self, key: &StoredKey) -> Value {
        jwk::public_jwk(key.id(), &key.material())
    }

    fn public_key_pem(&self, key: &StoredKey) -> Result<String, StoreError> {
        key.material()
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| StoreError::Fault(format!("PEM encoding failed: {}", e)))
    }
}

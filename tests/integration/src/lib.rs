//! Integration tests for the Rampart API.
//!
//! These tests serve the router on a real TCP listener and drive it over HTTP,
//! from key import through signing and decryption to deletion.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client, StatusCode};
use serde_json::Value;
use tokio::task::JoinHandle;

use rampart_api::{create_router, EngineConfig};
use rampart_keystore::{jwk, KeyStore, MemoryKeyStore};

// ============================================================================
// Test Server
// ============================================================================

/// A router served on an ephemeral local port for the lifetime of the value.
pub struct TestServer {
    task: Option<JoinHandle<std::io::Result<()>>>,
    pub base_url: String,
    pub store: Arc<MemoryKeyStore>,
}

impl TestServer {
    /// Serves a fresh, empty store.
    pub async fn start() -> Result<Self> {
        Self::with_store(Arc::new(MemoryKeyStore::new())).await
    }

    /// Serves the given store.
    pub async fn with_store(store: Arc<MemoryKeyStore>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind test listener")?;
        let addr: SocketAddr = listener.local_addr()?;

        let app = create_router(store.clone(), EngineConfig { verbose: true });
        let task = tokio::spawn(async move { axum::serve(listener, app).await });

        let mut server = Self {
            task: Some(task),
            base_url: format!("http://{}", addr),
            store,
        };
        server.wait_for_ready().await?;
        Ok(server)
    }

    async fn wait_for_ready(&mut self) -> Result<()> {
        let client = self.client()?;
        for _ in 0..50 {
            self.check_running().await?;
            match client.get("/system/status").await {
                Ok(resp) if resp.status == StatusCode::OK => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        bail!("Server failed to start within one second")
    }

    /// Fails with the server's own error if it has stopped serving.
    pub async fn check_running(&mut self) -> Result<()> {
        let task = match self.task.take() {
            Some(task) if task.is_finished() => task,
            Some(task) => {
                self.task = Some(task);
                return Ok(());
            },
            None => bail!("Server stopped serving"),
        };
        match task.await.context("Server task did not complete")? {
            Ok(()) => bail!("Server stopped serving"),
            Err(e) => Err(e).context("Server failed"),
        }
    }

    /// Get a configured HTTP client for this server.
    pub fn client(&self) -> Result<TestClient> {
        TestClient::new(&self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// A decoded HTTP response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Parses the body as JSON.
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .with_context(|| format!("Body is not JSON: {:?}", self.body))
    }

    /// The `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

/// HTTP client for the API. Redirects are not followed so `Location` can be
/// checked.
pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    async fn read(resp: reqwest::Response) -> Result<TestResponse> {
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await?;
        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get(&self, path: &str) -> Result<TestResponse> {
        Self::read(self.client.get(self.url(path)).send().await?).await
    }

    pub async fn get_accepting(&self, path: &str, accept: &str) -> Result<TestResponse> {
        let resp = self
            .client
            .get(self.url(path))
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;
        Self::read(resp).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<TestResponse> {
        Self::read(self.client.post(self.url(path)).json(body).send().await?).await
    }

    pub async fn post_raw(&self, path: &str, body: &str) -> Result<TestResponse> {
        let resp = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;
        Self::read(resp).await
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> Result<TestResponse> {
        Self::read(self.client.put(self.url(path)).json(body).send().await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<TestResponse> {
        Self::read(self.client.delete(self.url(path)).send().await?).await
    }
}

/// A private JWK for a freshly generated key of `bits` bits.
pub async fn generate_private_jwk(bits: usize) -> Result<Value> {
    let scratch = MemoryKeyStore::new();
    let id = scratch.generate(bits).await?;
    let key = scratch
        .get(id.as_str())
        .await
        .context("Generated key is missing")?;
    Ok(jwk::private_jwk(&key.material()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use rand::rngs::OsRng;
    use rsa::pss::{Signature, VerifyingKey};
    use rsa::signature::Verifier;
    use rsa::{Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPublicKey};
    use serde_json::json;
    use tokio::sync::OnceCell;

    async fn key_document() -> Value {
        static DOCUMENT: OnceCell<Value> = OnceCell::const_new();
        DOCUMENT
            .get_or_init(|| async { generate_private_jwk(1024).await.unwrap() })
            .await
            .clone()
    }

    /// Imports the shared test key and returns its API path.
    async fn import_key(client: &TestClient) -> String {
        let resp = client.post_json("/keys", &key_document().await).await.unwrap();
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
        assert_eq!(resp.json().unwrap(), json!({"status": "success"}));
        resp.location()
            .unwrap()
            .strip_prefix("/v1")
            .unwrap()
            .to_string()
    }

    async fn public_key(server: &TestServer, key_path: &str) -> RsaPublicKey {
        let id = key_path.rsplit('/').next().unwrap();
        let key = server.store.get(id).await.unwrap();
        key.material().to_public_key()
    }

    #[tokio::test]
    async fn test_status() {
        let mut server = TestServer::start().await.unwrap();
        let resp = server.client().unwrap().get("/system/status").await.unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json().unwrap(), json!({"status": "ok"}));
        server.check_running().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_server_is_reported() {
        let mut server = TestServer::start().await.unwrap();
        let task = server.task.as_ref().unwrap();
        task.abort();
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        let err = server.check_running().await.unwrap_err();
        assert!(err.to_string().contains("did not complete"), "{:#}", err);
        // Once reported, the server stays stopped.
        assert!(server.check_running().await.is_err());
    }

    #[tokio::test]
    async fn test_key_lifecycle() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();

        // 1. Empty store lists nothing
        let resp = client.get("/keys").await.unwrap();
        assert_eq!(resp.json().unwrap(), json!({"status": "success", "data": []}));

        // 2. Import a key
        let key_path = import_key(&client).await;

        // 3. It is listed with its location
        let listing = client.get("/keys").await.unwrap().json().unwrap();
        assert_eq!(listing["data"].as_array().unwrap().len(), 1);
        assert_eq!(listing["data"][0]["location"], format!("/v1{}", key_path));

        // 4. Public key as JSON, through both paths
        let item = client.get(&key_path).await.unwrap().json().unwrap();
        let alias = client
            .get(&format!("{}/public", key_path))
            .await
            .unwrap()
            .json()
            .unwrap();
        assert_eq!(item, alias);
        assert_eq!(item["data"]["kty"], "RSA");
        assert_eq!(item["data"]["n"], key_document().await["n"]);

        // 5. Public key as PEM
        let pem = client
            .get(&format!("{}/public.pem", key_path))
            .await
            .unwrap();
        assert_eq!(pem.status, StatusCode::OK);
        assert!(pem.body.contains("BEGIN PUBLIC KEY"));

        // 6. Replace the material with itself
        let resp = client
            .put_json(&key_path, &key_document().await)
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json().unwrap(), json!({"status": "success"}));

        // 7. Delete
        let resp = client.delete(&key_path).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json().unwrap(), json!({"status": "success"}));

        // 8. Gone
        let resp = client.get(&key_path).await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(resp.body.is_empty());
        assert!(server.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_import_rejections() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();

        let resp = client.post_raw("/keys", "not json").await.unwrap();
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert!(resp.location().is_none());
        let body = resp.json().unwrap();
        assert_eq!(body["status"], "error");
        assert!(!body["message"].as_str().unwrap().is_empty());

        let mut public_only = key_document().await;
        for field in ["d", "p", "q"] {
            public_only.as_object_mut().unwrap().remove(field);
        }
        let resp = client.post_json("/keys", &public_only).await.unwrap();
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert!(resp.location().is_none());
        let body = resp.json().unwrap();
        assert_eq!(body["status"], "failure");
        assert_eq!(body["data"]["error"], "missing_private_parameters");

        let resp = client
            .post_json("/keys", &json!({"kty": "EC", "crv": "P-256"}))
            .await
            .unwrap();
        assert_eq!(resp.json().unwrap()["data"]["error"], "invalid_key");

        assert!(server.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_pkcs1_sign() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();
        let key_path = import_key(&client).await;

        let message = b"pay bob 10";
        let resp = client
            .post_json(
                &format!("{}/actions/pkcs1/sign", key_path),
                &json!({ "message": BASE64.encode(message) }),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);

        let body = resp.json().unwrap();
        assert_eq!(body["status"], "success");
        let signature = BASE64
            .decode(body["data"]["signature"].as_str().unwrap())
            .unwrap();

        public_key(&server, &key_path)
            .await
            .verify(Pkcs1v15Sign::new_unprefixed(), message, &signature)
            .unwrap();
    }

    #[tokio::test]
    async fn test_pss_sign() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();
        let key_path = import_key(&client).await;

        let message = b"pss message";
        let body = client
            .post_json(
                &format!("{}/actions/pss/sha256/sign", key_path),
                &json!({ "message": BASE64.encode(message) }),
            )
            .await
            .unwrap()
            .json()
            .unwrap();
        let signature = BASE64
            .decode(body["data"]["signature"].as_str().unwrap())
            .unwrap();

        let verifying_key =
            VerifyingKey::<sha2::Sha256>::new(public_key(&server, &key_path).await);
        let signature = Signature::try_from(signature.as_slice()).unwrap();
        verifying_key.verify(message, &signature).unwrap();
    }

    #[tokio::test]
    async fn test_decrypt_paddings() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();
        let key_path = import_key(&client).await;
        let public = public_key(&server, &key_path).await;

        let cases = [
            (
                "oaep/sha/decrypt",
                public
                    .encrypt(&mut OsRng, Oaep::new::<sha1::Sha1>(), b"oaep-sha1")
                    .unwrap(),
                b"oaep-sha1".to_vec(),
            ),
            (
                "oaep/sha256/decrypt",
                public
                    .encrypt(&mut OsRng, Oaep::new::<sha2::Sha256>(), b"oaep-sha256")
                    .unwrap(),
                b"oaep-sha256".to_vec(),
            ),
            (
                "pkcs1/decrypt",
                public.encrypt(&mut OsRng, Pkcs1v15Encrypt, b"pkcs1").unwrap(),
                b"pkcs1".to_vec(),
            ),
        ];

        for (action, ciphertext, expected) in cases {
            let body = client
                .post_json(
                    &format!("{}/actions/{}", key_path, action),
                    &json!({ "ciphertext": BASE64.encode(&ciphertext) }),
                )
                .await
                .unwrap()
                .json()
                .unwrap();
            assert_eq!(body["status"], "success", "{}", action);
            let plaintext = BASE64
                .decode(body["data"]["plaintext"].as_str().unwrap())
                .unwrap();
            assert_eq!(plaintext, expected, "{}", action);
        }
    }

    #[tokio::test]
    async fn test_raw_decrypt_returns_full_block() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();
        let key_path = import_key(&client).await;
        let public = public_key(&server, &key_path).await;

        // PKCS#1 v1.5 ciphertext decrypted without padding removal yields the
        // whole padded block, ending in the message.
        let ciphertext = public.encrypt(&mut OsRng, Pkcs1v15Encrypt, b"raw").unwrap();
        let body = client
            .post_json(
                &format!("{}/actions/decrypt", key_path),
                &json!({ "ciphertext": BASE64.encode(&ciphertext) }),
            )
            .await
            .unwrap()
            .json()
            .unwrap();
        let block = BASE64
            .decode(body["data"]["plaintext"].as_str().unwrap())
            .unwrap();
        assert_eq!(block.len(), 128);
        assert_eq!(&block[..2], &[0x00, 0x02]);
        assert!(block.ends_with(b"\0raw"));
    }

    #[tokio::test]
    async fn test_invalid_action_paths_are_not_found() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();
        let key_path = import_key(&client).await;
        let params = json!({ "message": BASE64.encode(b"x") });

        for action in ["oaep/sha256/sign", "pss/sign", "pss/sha3/sign", "x931/sign"] {
            let resp = client
                .post_json(&format!("{}/actions/{}", key_path, action), &params)
                .await
                .unwrap();
            assert_eq!(resp.status, StatusCode::NOT_FOUND, "{}", action);
            assert!(resp.body.is_empty());
        }

        let resp = client
            .post_json("/keys/0000/actions/pkcs1/sign", &params)
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_operation_parameters() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();
        let key_path = import_key(&client).await;

        let resp = client
            .post_json(
                &format!("{}/actions/pkcs1/sign", key_path),
                &json!({ "message": "%%%" }),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.json().unwrap();
        assert_eq!(body["status"], "failure");
        assert_eq!(body["data"]["error"], "invalid_parameters");

        let resp = client
            .post_raw(&format!("{}/actions/pkcs1/sign", key_path), "[")
            .await
            .unwrap();
        assert_eq!(resp.json().unwrap()["status"], "error");
    }

    #[tokio::test]
    async fn test_content_negotiation() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().unwrap();
        let key_path = import_key(&client).await;

        let resp = client
            .get_accepting(&key_path, "application/x-pem-file")
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(
            resp.headers[reqwest::header::CONTENT_TYPE],
            "application/x-pem-file"
        );

        let resp = client
            .get_accepting(&format!("{}/public.pem", key_path), "application/json")
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::NOT_ACCEPTABLE);

        let resp = client.delete("/keys").await.unwrap();
        assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_concurrent_signing() {
        let server = TestServer::start().await.unwrap();
        let client = Arc::new(server.client().unwrap());
        let key_path = import_key(&client).await;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let client = Arc::clone(&client);
            let path = format!("{}/actions/pss/sha256/sign", key_path);
            tasks.push(tokio::spawn(async move {
                let message = format!("message {}", i);
                client
                    .post_json(&path, &json!({ "message": BASE64.encode(message) }))
                    .await
                    .unwrap()
                    .json()
                    .unwrap()
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap()["status"], "success");
        }
    }

    #[tokio::test]
    async fn test_delete_races_leave_key_absent() {
        let server = TestServer::start().await.unwrap();
        let client = Arc::new(server.client().unwrap());
        let key_path = import_key(&client).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let client = Arc::clone(&client);
            let path = key_path.clone();
            tasks.push(tokio::spawn(async move { client.delete(&path).await.unwrap() }));
        }

        for task in tasks {
            let resp = task.await.unwrap();
            // Either this request saw the key and removed it, or it arrived after removal.
            match resp.status {
                StatusCode::OK => assert_eq!(resp.json().unwrap(), json!({"status": "success"})),
                StatusCode::NOT_FOUND => assert!(resp.body.is_empty()),
                other => panic!("unexpected status {}", other),
            }
        }
        assert!(server.store.is_empty().await);
    }
}

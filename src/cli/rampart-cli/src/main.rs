//! Rampart CLI - Command line interface.

use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{header, redirect, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "rampart")]
#[command(about = "Rampart CLI - Manage RSA keys and use them to sign and decrypt")]
#[command(version)]
struct Cli {
    /// Rampart server address
    #[arg(long, default_value = "http://localhost:8300", env = "RAMPART_ADDR")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Key management
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },
    /// Check server status
    Status,
}

#[derive(Subcommand)]
enum KeysCommands {
    /// List keys
    List,
    /// Import a private RSA JWK
    Create {
        /// JWK file (`-` reads stdin)
        #[arg(long, default_value = "-")]
        file: String,
    },
    /// Show a public key
    Get {
        /// Key id
        id: String,
        /// Print the public key as PEM
        #[arg(long)]
        pem: bool,
    },
    /// Replace a key's material with a private RSA JWK
    Replace {
        /// Key id
        id: String,
        /// JWK file (`-` reads stdin)
        #[arg(long, default_value = "-")]
        file: String,
    },
    /// Delete a key
    Delete {
        /// Key id
        id: String,
    },
    /// Sign a message
    Sign {
        /// Key id
        id: String,
        /// Message to sign
        message: String,
        /// Signature padding
        #[arg(long, value_enum, default_value_t = SignPaddingArg::Pkcs1)]
        padding: SignPaddingArg,
        /// Digest for PSS (md5, sha, sha224, sha256, sha384, sha512)
        #[arg(long)]
        hash: Option<String>,
        /// The message is already base64 encoded
        #[arg(long)]
        base64: bool,
    },
    /// Decrypt a base64 ciphertext
    Decrypt {
        /// Key id
        id: String,
        /// Ciphertext, base64 encoded
        ciphertext: String,
        /// Decryption padding
        #[arg(long, value_enum, default_value_t = DecryptPaddingArg::Oaep)]
        padding: DecryptPaddingArg,
        /// Digest for OAEP (md5, sha, sha224, sha256, sha384, sha512)
        #[arg(long)]
        hash: Option<String>,
        /// Print the plaintext base64 encoded
        #[arg(long)]
        base64: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SignPaddingArg {
    Pkcs1,
    Pss,
}

#[derive(Clone, Copy, ValueEnum)]
enum DecryptPaddingArg {
    None,
    Pkcs1,
    Oaep,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum EnvelopeResponse {
    Success {
        #[serde(default)]
        data: Option<Value>,
    },
    Failure {
        #[serde(default)]
        data: Option<Value>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct KeyListing {
    location: String,
    key: Value,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct RampartClient {
    client: Client,
    base_url: String,
}

impl RampartClient {
    fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    async fn status(&self) -> Result<StatusResponse> {
        let resp = self
            .client
            .get(self.url("/system/status"))
            .send()
            .await
            .context("Failed to connect to server")?;

        if !resp.status().is_success() {
            bail!("Server error: HTTP {}", resp.status());
        }

        resp.json().await.context("Failed to parse response")
    }

    async fn list(&self) -> Result<Vec<KeyListing>> {
        let resp = self
            .client
            .get(self.url("/keys"))
            .send()
            .await
            .context("Failed to connect to server")?;

        let data = envelope_data(resp, "List keys").await?;
        serde_json::from_value(data.unwrap_or_else(|| json!([])))
            .context("Failed to parse key listing")
    }

    async fn create(&self, document: &Value) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/keys"))
            .json(document)
            .send()
            .await
            .context("Failed to connect to server")?;

        let location = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        envelope_data(resp, "Create key").await?;

        let location = location.context("Server did not return the new key location")?;
        location
            .rsplit('/')
            .next()
            .map(str::to_string)
            .context("Malformed key location")
    }

    async fn get(&self, id: &str) -> Result<Value> {
        let resp = self
            .client
            .get(self.url(&format!("/keys/{}", id)))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to connect to server")?;

        envelope_data(resp, "Get key")
            .await?
            .context("Server returned no key")
    }

    async fn get_pem(&self, id: &str) -> Result<String> {
        let resp = self
            .client
            .get(self.url(&format!("/keys/{}/public.pem", id)))
            .header(header::ACCEPT, "application/x-pem-file")
            .send()
            .await
            .context("Failed to connect to server")?;

        if resp.status() == StatusCode::NOT_FOUND {
            bail!("Get key failed: key '{}' not found", id);
        }
        if !resp.status().is_success() {
            bail!("Get key failed: HTTP {}", resp.status());
        }

        resp.text().await.context("Failed to read response")
    }

    async fn replace(&self, id: &str, document: &Value) -> Result<()> {
        let resp = self
            .client
            .put(self.url(&format!("/keys/{}", id)))
            .json(document)
            .send()
            .await
            .context("Failed to connect to server")?;

        envelope_data(resp, "Replace key").await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/keys/{}", id)))
            .send()
            .await
            .context("Failed to connect to server")?;

        envelope_data(resp, "Delete key").await?;
        Ok(())
    }

    async fn action(&self, id: &str, path: &str, params: Value) -> Result<Value> {
        let resp = self
            .client
            .post(self.url(&format!("/keys/{}/actions/{}", id, path)))
            .json(&params)
            .send()
            .await
            .context("Failed to connect to server")?;

        envelope_data(resp, "Key action")
            .await?
            .context("Server returned no result")
    }
}

/// Reads an enveloped response, turning failure and error envelopes into errors.
async fn envelope_data(resp: Response, what: &str) -> Result<Option<Value>> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        bail!("{} failed: not found", what);
    }
    if status.is_client_error() && status != StatusCode::BAD_REQUEST {
        bail!("{} failed: HTTP {}", what, status);
    }

    let envelope: EnvelopeResponse = resp
        .json()
        .await
        .with_context(|| format!("{} failed: unexpected response (HTTP {})", what, status))?;

    match envelope {
        EnvelopeResponse::Success { data } => Ok(data),
        EnvelopeResponse::Failure { data } => {
            let detail = data.map(|d| d.to_string()).unwrap_or_default();
            bail!("{} refused: {}", what, detail)
        },
        EnvelopeResponse::Error { message } => bail!("{} error: {}", what, message),
    }
}

fn action_path(padding: Option<&str>, hash: Option<&str>, action: &str) -> String {
    [padding, hash, Some(action)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("/")
}

fn read_document(file: &str) -> Result<Value> {
    let text = if file == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        text
    } else {
        std::fs::read_to_string(Path::new(file))
            .with_context(|| format!("Failed to read {}", file))?
    };
    serde_json::from_str(&text).context("Key file is not valid JSON")
}

fn field<'a>(data: &'a Value, name: &str) -> Result<&'a str> {
    data.get(name)
        .and_then(Value::as_str)
        .with_context(|| format!("Response has no '{}' field", name))
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cmd_status(client: &RampartClient) -> Result<()> {
    let status = client.status().await?;
    println!("Rampart server status: {}", status.status);
    Ok(())
}

async fn cmd_keys_list(client: &RampartClient) -> Result<()> {
    let keys = client.list().await?;

    if keys.is_empty() {
        println!("No keys found");
    } else {
        println!("Keys:");
        for listing in &keys {
            let kid = listing.key.get("kid").and_then(Value::as_str).unwrap_or("?");
            println!("  {}  {}", kid, listing.location);
        }
    }

    Ok(())
}

async fn cmd_keys_create(client: &RampartClient, file: &str) -> Result<()> {
    let document = read_document(file)?;
    let id = client.create(&document).await?;
    println!("Key created: {}", id);
    Ok(())
}

async fn cmd_keys_get(client: &RampartClient, id: &str, pem: bool) -> Result<()> {
    if pem {
        print!("{}", client.get_pem(id).await?);
    } else {
        let key = client.get(id).await?;
        println!("{}", serde_json::to_string_pretty(&key)?);
    }
    Ok(())
}

async fn cmd_keys_replace(client: &RampartClient, id: &str, file: &str) -> Result<()> {
    let document = read_document(file)?;
    client.replace(id, &document).await?;
    println!("Key '{}' replaced", id);
    Ok(())
}

async fn cmd_keys_delete(client: &RampartClient, id: &str) -> Result<()> {
    client.delete(id).await?;
    println!("Key '{}' deleted", id);
    Ok(())
}

async fn cmd_keys_sign(
    client: &RampartClient,
    id: &str,
    message: &str,
    padding: SignPaddingArg,
    hash: Option<&str>,
    encoded: bool,
) -> Result<()> {
    let padding = match padding {
        SignPaddingArg::Pkcs1 => "pkcs1",
        SignPaddingArg::Pss => {
            if hash.is_none() {
                bail!("PSS signatures need --hash");
            }
            "pss"
        },
    };
    let message = if encoded {
        message.to_string()
    } else {
        BASE64.encode(message.as_bytes())
    };

    let result = client
        .action(
            id,
            &action_path(Some(padding), hash, "sign"),
            json!({ "message": message }),
        )
        .await?;
    println!("{}", field(&result, "signature")?);
    Ok(())
}

async fn cmd_keys_decrypt(
    client: &RampartClient,
    id: &str,
    ciphertext: &str,
    padding: DecryptPaddingArg,
    hash: Option<&str>,
    encoded: bool,
) -> Result<()> {
    let padding = match padding {
        DecryptPaddingArg::None => None,
        DecryptPaddingArg::Pkcs1 => Some("pkcs1"),
        DecryptPaddingArg::Oaep => Some("oaep"),
    };
    let hash = match (padding, hash) {
        (Some("oaep"), None) => Some("sha256"),
        (_, hash) => hash,
    };

    let result = client
        .action(
            id,
            &action_path(padding, hash, "decrypt"),
            json!({ "ciphertext": ciphertext }),
        )
        .await?;
    let plaintext = field(&result, "plaintext")?;

    if encoded {
        println!("{}", plaintext);
    } else {
        let bytes = BASE64
            .decode(plaintext)
            .context("Server returned invalid base64")?;
        println!("{}", String::from_utf8_lossy(&bytes));
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RampartClient::new(&cli.addr)?;

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::Keys { command } => match command {
            KeysCommands::List => cmd_keys_list(&client).await,
            KeysCommands::Create { file } => cmd_keys_create(&client, &file).await,
            KeysCommands::Get { id, pem } => cmd_keys_get(&client, &id, pem).await,
            KeysCommands::Replace { id, file } => cmd_keys_replace(&client, &id, &file).await,
            KeysCommands::Delete { id } => cmd_keys_delete(&client, &id).await,
            KeysCommands::Sign {
                id,
                message,
                padding,
                hash,
                base64,
            } => cmd_keys_sign(&client, &id, &message, padding, hash.as_deref(), base64).await,
            KeysCommands::Decrypt {
                id,
                ciphertext,
                padding,
                hash,
                base64,
            } => {
                cmd_keys_decrypt(&client, &id, &ciphertext, padding, hash.as_deref(), base64)
                    .await
            },
        },
    }
}

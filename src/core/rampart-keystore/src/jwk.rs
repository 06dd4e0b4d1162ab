//! RSA JSON Web Key encoding.
//!
//! Keys are imported as private RSA JWKs (RFC 7518 section 6.3). Only `n`, `e`,
//! `d`, `p` and `q` are read; the CRT parameters are recomputed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde_json::{json, Map, Value};

use crate::error::JwkError;
use crate::store::KeyId;

const PRIVATE_PARAMS: [&str; 3] = ["d", "p", "q"];

/// Parses a private RSA JWK into key material.
pub fn parse_private_key(document: &Value) -> Result<RsaPrivateKey, JwkError> {
    let object = document.as_object().ok_or(JwkError::NotAnObject)?;

    match object.get("kty").and_then(Value::as_str) {
        Some("RSA") => {},
        Some(other) => return Err(JwkError::UnsupportedKeyType(other.to_string())),
        None => return Err(JwkError::UnsupportedKeyType("missing kty".to_string())),
    }

    let n = public_param(object, "n")?;
    let e = public_param(object, "e")?;

    let missing: Vec<&'static str> = PRIVATE_PARAMS
        .into_iter()
        .filter(|name| !object.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(JwkError::MissingPrivate(missing));
    }

    let d = decode_param(object, "d")?;
    let p = decode_param(object, "p")?;
    let q = decode_param(object, "q")?;

    let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| JwkError::Invalid(e.to_string()))?;
    key.validate()
        .map_err(|e| JwkError::Invalid(e.to_string()))?;
    Ok(key)
}

/// Public JWK for a key, tagged with its id.
pub fn public_jwk(id: &KeyId, key: &RsaPrivateKey) -> Value {
    json!({
        "kty": "RSA",
        "kid": id.as_str(),
        "n": encode_uint(key.n()),
        "e": encode_uint(key.e()),
    })
}

/// Private JWK for a key. Used to hand freshly generated keys to clients and tests.
pub fn private_jwk(key: &RsaPrivateKey) -> Value {
    let mut jwk = json!({
        "kty": "RSA",
        "n": encode_uint(key.n()),
        "e": encode_uint(key.e()),
        "d": encode_uint(key.d()),
    });
    if let [p, q, ..] = key.primes() {
        jwk["p"] = Value::String(encode_uint(p));
        jwk["q"] = Value::String(encode_uint(q));
    }
    jwk
}

fn public_param(object: &Map<String, Value>, name: &'static str) -> Result<BigUint, JwkError> {
    if !object.contains_key(name) {
        return Err(JwkError::MissingPublic(name));
    }
    decode_param(object, name)
}

fn decode_param(object: &Map<String, Value>, name: &'static str) -> Result<BigUint, JwkError> {
    let encoded = object
        .get(name)
        .and_then(Value::as_str)
        .ok_or(JwkError::Encoding(name))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|_| JwkError::Encoding(name))?;
    if bytes.is_empty() {
        return Err(JwkError::Encoding(name));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

fn encode_uint(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

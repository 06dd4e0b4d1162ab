//! Random identifier generation.
//!
//! Uses the operating system's CSPRNG.

use rand::{rngs::OsRng, RngCore};

/// Number of random bytes in a key identifier.
pub const KEY_ID_BYTES: usize = 16;

/// Generates cryptographically secure random bytes.
pub fn generate_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generates a fresh key identifier as a lowercase hex string.
pub fn generate_key_id() -> String {
    hex_encode(&generate_bytes(KEY_ID_BYTES))
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

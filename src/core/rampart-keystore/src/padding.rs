//! Padding schemes and digest algorithms for private-key operations.

use std::str::FromStr;

use sha2::Digest;

/// Digest algorithms usable with OAEP and PSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5.
    Md5,
    /// SHA-1.
    Sha1,
    /// SHA-224.
    Sha224,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// All supported algorithms.
    pub const ALL: [HashAlgorithm; 6] = [
        Self::Md5,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
    ];

    /// The token used for this algorithm in request paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Hashes `data` with this algorithm.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => md5::Md5::digest(data).to_vec(),
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha224 => sha2::Sha224::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognised digest token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownHash(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnknownHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| UnknownHash(s.to_string()))
    }
}

/// Padding applied when signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPadding {
    /// PKCS#1 v1.5 over the raw message, no DigestInfo prefix.
    Pkcs1,
    /// RSASSA-PSS over the message digest.
    Pss(HashAlgorithm),
}

/// Padding applied when decrypting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptPadding {
    /// Textbook RSA; the full modulus-sized block is returned.
    None,
    /// PKCS#1 v1.5 encryption padding.
    Pkcs1,
    /// RSAES-OAEP with the given digest for both label hash and MGF1.
    Oaep(HashAlgorithm),
}

//! RSA private-key primitives.

use rand::rngs::OsRng;
use rsa::hazmat::rsa_decrypt_and_check;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey};

use crate::padding::{DecryptPadding, HashAlgorithm, SignPadding};

pub(crate) fn sign(
    key: &RsaPrivateKey,
    padding: SignPadding,
    message: &[u8],
) -> Result<Vec<u8>, rsa::Error> {
    match padding {
        SignPadding::Pkcs1 => key.sign(Pkcs1v15Sign::new_unprefixed(), message),
        SignPadding::Pss(hash) => {
            let digest = hash.digest(message);
            key.sign_with_rng(&mut OsRng, pss(hash), &digest)
        },
    }
}

pub(crate) fn decrypt(
    key: &RsaPrivateKey,
    padding: DecryptPadding,
    ciphertext: &[u8],
) -> Result<Vec<u8>, rsa::Error> {
    match padding {
        DecryptPadding::None => raw_decrypt(key, ciphertext),
        DecryptPadding::Pkcs1 => key.decrypt(Pkcs1v15Encrypt, ciphertext),
        DecryptPadding::Oaep(hash) => key.decrypt(oaep(hash), ciphertext),
    }
}

fn raw_decrypt(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, rsa::Error> {
    let size = key.size();
    if ciphertext.len() != size {
        return Err(rsa::Error::Decryption);
    }
    let c = BigUint::from_bytes_be(ciphertext);
    if &c >= key.n() {
        return Err(rsa::Error::Decryption);
    }

    let m = rsa_decrypt_and_check(key, Some(&mut OsRng), &c)?;
    let bytes = m.to_bytes_be();

    // Left-pad to the modulus size so the output length never leaks leading zeros.
    let mut block = vec![0u8; size - bytes.len()];
    block.extend_from_slice(&bytes);
    Ok(block)
}

fn pss(hash: HashAlgorithm) -> Pss {
    match hash {
        HashAlgorithm::Md5 => Pss::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pss::new::<sha1::Sha1>(),
        HashAlgorithm::Sha224 => Pss::new::<sha2::Sha224>(),
        HashAlgorithm::Sha256 => Pss::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pss::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pss::new::<sha2::Sha512>(),
    }
}

fn oaep(hash: HashAlgorithm) -> Oaep {
    match hash {
        HashAlgorithm::Md5 => Oaep::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Oaep::new::<sha1::Sha1>(),
        HashAlgorithm::Sha224 => Oaep::new::<sha2::Sha224>(),
        HashAlgorithm::Sha256 => Oaep::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Oaep::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Oaep::new::<sha2::Sha512>(),
    }
}

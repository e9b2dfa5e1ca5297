//! Key bootstrap and content decryption.
//!
//! Clients send a DER encoded RSA public key, the server wraps a fresh AES-128 key with it using
//! OAEP (SHA-1) and later decrypts uploads with that AES key in CBC mode. The all-zero IV and the
//! SHA-1 OAEP digest are fixed by the existing client implementation and must not change.

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use getrandom::getrandom;
use rand::rngs::OsRng;
use rsa::{pkcs8::DecodePublicKey, Oaep, RsaPublicKey};
use sha1::Sha1;
use shared::types::{SymmetricKey, WrappedKey};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

const ZERO_IV: [u8; 16] = [0; 16];

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[from] rsa::pkcs8::spki::Error),
    #[error("key wrapping failed: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("wrapped key is {0} bytes long, expected 128")]
    WrappedKeyLength(usize),
    #[error("symmetric key is {0} bytes long, expected 16")]
    SymmetricKeyLength(usize),
    #[error("content decryption failed")]
    Decryption,
    #[error("unable to generate a key: {0}")]
    Random(getrandom::Error),
}

pub fn generate_symmetric_key() -> Result<SymmetricKey, Error> {
    let mut key: SymmetricKey = Default::default();
    getrandom(&mut key).map_err(Error::Random)?;

    Ok(key)
}

/// Encrypts `key` with the client's public key.
pub fn wrap_key(public_key: &[u8], key: &[u8]) -> Result<WrappedKey, Error> {
    let public_key = RsaPublicKey::from_public_key_der(public_key)?;
    let wrapped = public_key.encrypt(&mut OsRng, Oaep::new::<Sha1>(), key)?;

    // a 160 byte DER key is always 1024 bits, anything else won't fit the response
    WrappedKey::try_from(wrapped.as_slice()).map_err(|_| Error::WrappedKeyLength(wrapped.len()))
}

/// Decrypts uploaded file content and strips its PKCS#7 padding.
pub fn decrypt_content(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = Aes128CbcDec::new_from_slices(key, &ZERO_IV).map_err(|_| Error::SymmetricKeyLength(key.len()))?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption)
}

#[cfg(test)]
pub(crate) mod test_keys {
    //! Client side of the key exchange, used by tests across the crate.

    use std::sync::OnceLock;

    use cbc::cipher::BlockEncryptMut;
    use rsa::{pkcs8::EncodePublicKey, BigUint, RsaPrivateKey};
    use shared::types::PublicKeyBytes;

    use super::*;

    /// A 1024-bit key with exponent 17, the shape produced by the reference client.
    pub fn client_keypair() -> &'static (RsaPrivateKey, PublicKeyBytes) {
        static KEYPAIR: OnceLock<(RsaPrivateKey, PublicKeyBytes)> = OnceLock::new();

        KEYPAIR.get_or_init(|| {
            let private = RsaPrivateKey::new_with_exp(&mut OsRng, 1024, &BigUint::from(17u32)).unwrap();
            let der = private.to_public_key().to_public_key_der().unwrap();
            let public = PublicKeyBytes::try_from(der.as_bytes()).unwrap();
            (private, public)
        })
    }

    pub fn unwrap_key(wrapped: &[u8]) -> Vec<u8> {
        client_keypair().0.decrypt(Oaep::new::<Sha1>(), wrapped).unwrap()
    }

    pub fn encrypt_content(key: &[u8], plaintext: &[u8]) -> Vec<u8> {
        cbc::Encryptor::<Aes128>::new_from_slices(key, &ZERO_IV)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }
}

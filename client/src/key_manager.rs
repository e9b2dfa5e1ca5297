use aes::Aes128;
use anyhow::{anyhow, Context};
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rsa::{
    pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    BigUint, Oaep, RsaPrivateKey,
};
use sha1::Sha1;
use shared::types::{PublicKeyBytes, SymmetricKey};

use crate::defaults::{RSA_EXPONENT, RSA_KEY_BITS};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// The client's RSA key pair, used to receive the symmetric key from the server.
pub struct KeyManager {
    private_key: RsaPrivateKey,
}

impl KeyManager {
    pub fn generate() -> anyhow::Result<Self> {
        let private_key = RsaPrivateKey::new_with_exp(&mut OsRng, RSA_KEY_BITS, &BigUint::from(RSA_EXPONENT))?;

        Ok(Self { private_key })
    }

    pub fn from_pem(pem: &str) -> anyhow::Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem).context("invalid private key")?;

        Ok(Self { private_key })
    }

    pub fn to_pem(&self) -> anyhow::Result<String> {
        Ok(self.private_key.to_pkcs8_pem(LineEnding::LF)?.to_string())
    }

    /// The public key in the DER form sent to the server.
    pub fn get_pubkey(&self) -> anyhow::Result<PublicKeyBytes> {
        let der = self.private_key.to_public_key().to_public_key_der()?;

        PublicKeyBytes::try_from(der.as_bytes())
            .map_err(|_| anyhow!("public key is {} bytes long, expected 160", der.as_bytes().len()))
    }

    /// Decrypts the symmetric key sent by the server.
    pub fn unwrap_key(&self, wrapped_key: &[u8]) -> anyhow::Result<SymmetricKey> {
        let key = self.private_key.decrypt(Oaep::new::<Sha1>(), wrapped_key)?;

        SymmetricKey::try_from(key.as_slice()).map_err(|_| anyhow!("received key is {} bytes long", key.len()))
    }
}

/// Encrypts file content the way the server expects it: AES-128-CBC with a zero IV.
pub fn encrypt_file(key: &SymmetricKey, plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), &[0; 16].into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

#[cfg(test)]
pub(crate) mod test_keys {
    use std::sync::OnceLock;

    use super::KeyManager;

    /// Key generation is slow, tests share a single key pair.
    pub fn keys() -> &'static KeyManager {
        static KEYS: OnceLock<KeyManager> = OnceLock::new();
        KEYS.get_or_init(|| KeyManager::generate().unwrap())
    }
}

// Layer body cipher: XChaCha20-Poly1305 under a single-use SymmetricKey

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};

use super::keys::SymmetricKey;
use crate::error::{OnionError, Result};

pub fn sym_encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.key()).map_err(|_| OnionError::EncryptionFailure)?;
    cipher
        .encrypt(XNonce::from_slice(key.nonce()), plaintext)
        .map_err(|_| OnionError::EncryptionFailure)
}

pub fn sym_decrypt(key: &SymmetricKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.key())
        .map_err(|_| OnionError::DecryptionFailure("invalid layer key".to_string()))?;
    cipher
        .decrypt(XNonce::from_slice(key.nonce()), ciphertext)
        .map_err(|_| OnionError::DecryptionFailure("layer body failed authentication".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sym_roundtrip() {
        let key = SymmetricKey::generate();
        let ciphertext = sym_encrypt(&key, b"0000004001hello").unwrap();
        assert_eq!(sym_decrypt(&key, &ciphertext).unwrap(), b"0000004001hello");
    }

    #[test]
    fn test_sym_reimported_key_decrypts() {
        let key = SymmetricKey::generate();
        let ciphertext = sym_encrypt(&key, b"payload").unwrap();

        let restored = SymmetricKey::decode(&key.encode()).unwrap();
        assert_eq!(sym_decrypt(&restored, &ciphertext).unwrap(), b"payload");
    }

    #[test]
    fn test_sym_wrong_key_fails() {
        let key = SymmetricKey::generate();
        let ciphertext = sym_encrypt(&key, b"payload").unwrap();
        let other = SymmetricKey::generate();
        assert!(sym_decrypt(&other, &ciphertext).is_err());
    }

    #[test]
    fn test_sym_empty_plaintext() {
        let key = SymmetricKey::generate();
        let ciphertext = sym_encrypt(&key, b"").unwrap();
        assert!(sym_decrypt(&key, &ciphertext).unwrap().is_empty());
    }
}

// Sealed box: X25519 ECDH + XChaCha20-Poly1305
//
// Seal:
// 1. Generate ephemeral X25519 keypair
// 2. ECDH: ephemeral_secret × recipient_public → shared_secret
// 3. KDF: Blake3::derive_key(shared_secret) → sealing key
// 4. Nonce: Blake3(shared_secret || ephemeral_public)[..24]
// 5. Output: ephemeral_public || XChaCha20-Poly1305(plaintext, aad = ephemeral_public)
//
// For a fixed plaintext length the output length is fixed, which is what
// lets a relay split a frame without a length prefix.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::{Zeroize, Zeroizing};

use super::keys::{PrivateKey, PublicKey, KEY_SIZE, NONCE_SIZE, SYMMETRIC_MATERIAL_LEN};
use crate::error::{OnionError, Result};

/// Changing either context breaks compatibility with every frame in flight.
const SEAL_KEY_CONTEXT: &str = "onionnet v1 layer key seal 2026-10-18";
const SEAL_NONCE_CONTEXT: &str = "onionnet v1 layer key nonce 2026-10-18";

/// Size of the Poly1305 authentication tag (bytes)
pub const TAG_SIZE: usize = 16;

/// Length of a sealed symmetric layer key (bytes)
pub const SEALED_LEN: usize = KEY_SIZE + SYMMETRIC_MATERIAL_LEN + TAG_SIZE;

fn derive_nonce(shared_secret: &[u8], ephemeral_public: &[u8]) -> [u8; NONCE_SIZE] {
    let mut hasher = blake3::Hasher::new_derive_key(SEAL_NONCE_CONTEXT);
    hasher.update(shared_secret);
    hasher.update(ephemeral_public);
    let hash = hasher.finalize();
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&hash.as_bytes()[..NONCE_SIZE]);
    nonce
}

/// Encrypt `plaintext` so that only the holder of `recipient`'s private key
/// can recover it.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral_secret);

    let shared_secret = ephemeral_secret.diffie_hellman(recipient.as_x25519());
    let mut key = blake3::derive_key(SEAL_KEY_CONTEXT, shared_secret.as_bytes());
    let nonce_bytes = derive_nonce(shared_secret.as_bytes(), ephemeral_public.as_bytes());

    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| OnionError::EncryptionFailure);
    key.zeroize();

    let ciphertext = cipher?
        .encrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: ephemeral_public.as_bytes(),
            },
        )
        .map_err(|_| OnionError::EncryptionFailure)?;

    let mut sealed = Vec::with_capacity(KEY_SIZE + ciphertext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Recover the plaintext of a sealed box with the recipient's private key.
pub fn open(private: &PrivateKey, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < KEY_SIZE + TAG_SIZE {
        return Err(OnionError::DecryptionFailure(format!(
            "sealed key too short ({} bytes)",
            sealed.len()
        )));
    }

    let (ephemeral_bytes, ciphertext) = sealed.split_at(KEY_SIZE);
    let mut ephemeral = [0u8; KEY_SIZE];
    ephemeral.copy_from_slice(ephemeral_bytes);
    let ephemeral_public = X25519PublicKey::from(ephemeral);

    let shared_secret = private.as_static().diffie_hellman(&ephemeral_public);
    let mut key = blake3::derive_key(SEAL_KEY_CONTEXT, shared_secret.as_bytes());
    let nonce_bytes = derive_nonce(shared_secret.as_bytes(), ephemeral_public.as_bytes());

    let cipher = XChaCha20Poly1305::new_from_slice(&key)
        .map_err(|_| OnionError::DecryptionFailure("invalid sealing key".to_string()));
    key.zeroize();

    let plaintext = cipher?
        .decrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: ephemeral_public.as_bytes(),
            },
        )
        .map_err(|_| {
            OnionError::DecryptionFailure("layer key does not open with this private key".to_string())
        })?;

    Ok(Zeroizing::new(plaintext))
}

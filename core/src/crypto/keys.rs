// Key material: relay keypairs and per-layer symmetric keys
//
// Every key type exposes only encode/decode and the capability it is
// scoped to (sealing, opening, or symmetric encryption). Secret bytes are
// wiped on drop and never printed by Debug.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{OnionError, Result};

/// Size of X25519 keys and of the symmetric key (bytes)
pub const KEY_SIZE: usize = 32;

/// Size of the XChaCha20-Poly1305 nonce (bytes)
pub const NONCE_SIZE: usize = 24;

/// Exported symmetric material: key || nonce
pub const SYMMETRIC_MATERIAL_LEN: usize = KEY_SIZE + NONCE_SIZE;

fn decode_fixed<const N: usize>(text: &str, what: &str) -> Result<Zeroizing<[u8; N]>> {
    let bytes = Zeroizing::new(
        BASE64
            .decode(text.trim())
            .map_err(|e| OnionError::InvalidKey(format!("{}: {}", what, e)))?,
    );
    if bytes.len() != N {
        return Err(OnionError::InvalidKey(format!(
            "{}: expected {} bytes, got {}",
            what,
            N,
            bytes.len()
        )));
    }
    let mut out = Zeroizing::new([0u8; N]);
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A relay's public key, published through the registry.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(X25519PublicKey);

impl PublicKey {
    pub fn encode(&self) -> String {
        BASE64.encode(self.0.as_bytes())
    }

    pub fn decode(text: &str) -> Result<Self> {
        let bytes = decode_fixed::<KEY_SIZE>(text, "public key")?;
        Ok(Self(X25519PublicKey::from(*bytes)))
    }

    pub(crate) fn as_x25519(&self) -> &X25519PublicKey {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.encode())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        PublicKey::decode(&text).map_err(serde::de::Error::custom)
    }
}

/// A relay's private key. Only the owning router (and the insecure
/// registry debug endpoint) ever holds one.
#[derive(Clone)]
pub struct PrivateKey(StaticSecret);

impl PrivateKey {
    pub fn encode(&self) -> String {
        let bytes = Zeroizing::new(self.0.to_bytes());
        BASE64.encode(bytes.as_slice())
    }

    pub fn decode(text: &str) -> Result<Self> {
        let bytes = decode_fixed::<KEY_SIZE>(text, "private key")?;
        Ok(Self(StaticSecret::from(*bytes)))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(X25519PublicKey::from(&self.0))
    }

    pub(crate) fn as_static(&self) -> &StaticSecret {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Asymmetric keypair bound to one router for its whole lifetime.
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let private = PrivateKey(secret);
        Self {
            public: private.public_key(),
            private,
        }
    }

    pub fn from_private(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn private(&self) -> &PrivateKey {
        &self.private
    }
}

/// Ephemeral per-layer key and nonce. Generated for exactly one layer.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_SIZE],
    nonce: [u8; NONCE_SIZE],
}

impl SymmetricKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut key);
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        Self { key, nonce }
    }

    /// Raw material as sealed inside a layer: key || nonce.
    pub fn export(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(SYMMETRIC_MATERIAL_LEN));
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&self.nonce);
        out
    }

    pub fn import(material: &[u8]) -> Result<Self> {
        if material.len() != SYMMETRIC_MATERIAL_LEN {
            return Err(OnionError::InvalidKey(format!(
                "symmetric key: expected {} bytes, got {}",
                SYMMETRIC_MATERIAL_LEN,
                material.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        key.copy_from_slice(&material[..KEY_SIZE]);
        nonce.copy_from_slice(&material[KEY_SIZE..]);
        Ok(Self { key, nonce })
    }

    pub fn encode(&self) -> String {
        BASE64.encode(self.export().as_slice())
    }

    pub fn decode(text: &str) -> Result<Self> {
        let material = decode_fixed::<SYMMETRIC_MATERIAL_LEN>(text, "symmetric key")?;
        Self::import(material.as_slice())
    }

    pub(crate) fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub(crate) fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    AsymmetricPublic,
    AsymmetricPrivate,
    Symmetric,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyKind::AsymmetricPublic => "public",
            KeyKind::AsymmetricPrivate => "private",
            KeyKind::Symmetric => "symmetric",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for KeyKind {
    type Err = OnionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(KeyKind::AsymmetricPublic),
            "private" => Ok(KeyKind::AsymmetricPrivate),
            "symmetric" => Ok(KeyKind::Symmetric),
            other => Err(OnionError::InvalidKey(format!("unknown key kind '{}'", other))),
        }
    }
}

/// Any key handled by the overlay, tagged by what it may be used for.
#[derive(Debug)]
pub enum Key {
    AsymmetricPublic(PublicKey),
    AsymmetricPrivate(PrivateKey),
    Symmetric(SymmetricKey),
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::AsymmetricPublic(_) => KeyKind::AsymmetricPublic,
            Key::AsymmetricPrivate(_) => KeyKind::AsymmetricPrivate,
            Key::Symmetric(_) => KeyKind::Symmetric,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Key::AsymmetricPublic(k) => k.encode(),
            Key::AsymmetricPrivate(k) => k.encode(),
            Key::Symmetric(k) => k.encode(),
        }
    }

    pub fn decode(kind: KeyKind, text: &str) -> Result<Self> {
        match kind {
            KeyKind::AsymmetricPublic => PublicKey::decode(text).map(Key::AsymmetricPublic),
            KeyKind::AsymmetricPrivate => PrivateKey::decode(text).map(Key::AsymmetricPrivate),
            KeyKind::Symmetric => SymmetricKey::decode(text).map(Key::Symmetric),
        }
    }
}

impl From<PublicKey> for Key {
    fn from(key: PublicKey) -> Self {
        Key::AsymmetricPublic(key)
    }
}

impl From<PrivateKey> for Key {
    fn from(key: PrivateKey) -> Self {
        Key::AsymmetricPrivate(key)
    }
}

impl From<SymmetricKey> for Key {
    fn from(key: SymmetricKey) -> Self {
        Key::Symmetric(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.public(), b.public());
        assert_eq!(a.private().public_key(), *a.public());
    }

    #[test]
    fn test_public_key_encoding_roundtrip() {
        let pair = KeyPair::generate();
        let encoded = pair.public().encode();
        assert_eq!(encoded.len(), 44);

        let decoded = PublicKey::decode(&encoded).unwrap();
        assert_eq!(decoded, *pair.public());
    }

    #[test]
    fn test_private_key_encoding_roundtrip() {
        let pair = KeyPair::generate();
        let restored = PrivateKey::decode(&pair.private().encode()).unwrap();
        assert_eq!(restored.public_key(), *pair.public());
    }

    #[test]
    fn test_symmetric_key_export_import() {
        let key = SymmetricKey::generate();
        let material = key.export();
        assert_eq!(material.len(), SYMMETRIC_MATERIAL_LEN);

        let restored = SymmetricKey::import(&material).unwrap();
        assert_eq!(restored.key(), key.key());
        assert_eq!(restored.nonce(), key.nonce());
    }

    #[test]
    fn test_symmetric_key_import_wrong_length() {
        let result = SymmetricKey::import(&[0u8; 31]);
        assert!(matches!(result, Err(OnionError::InvalidKey(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(PublicKey::decode("not base64!").is_err());
        assert!(PublicKey::decode(&BASE64.encode([1u8; 16])).is_err());
        assert!(PrivateKey::decode("").is_err());
    }

    #[test]
    fn test_tagged_key_roundtrip() {
        let pair = KeyPair::generate();
        let keys: Vec<Key> = vec![
            (*pair.public()).into(),
            pair.private().clone().into(),
            SymmetricKey::generate().into(),
        ];

        for key in keys {
            let restored = Key::decode(key.kind(), &key.encode()).unwrap();
            assert_eq!(restored.kind(), key.kind());
            assert_eq!(restored.encode(), key.encode());
        }
    }

    #[test]
    fn test_key_kind_parse() {
        assert_eq!("public".parse::<KeyKind>().unwrap(), KeyKind::AsymmetricPublic);
        assert_eq!(KeyKind::Symmetric.to_string(), "symmetric");
        assert!("rsa".parse::<KeyKind>().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let pair = KeyPair::generate();
        let printed = format!("{:?}", pair.private());
        assert!(!printed.contains(&pair.private().encode()));
        assert_eq!(format!("{:?}", SymmetricKey::generate()), "SymmetricKey(..)");
    }

    #[test]
    fn test_public_key_serde() {
        let pair = KeyPair::generate();
        let json = serde_json::to_string(pair.public()).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, *pair.public());
    }
}

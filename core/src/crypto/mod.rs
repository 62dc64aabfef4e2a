// Cryptography module — key material, sealed layer keys, layer body cipher

pub mod keys;
pub mod seal;
pub mod symmetric;

pub use keys::{Key, KeyKind, KeyPair, PrivateKey, PublicKey, SymmetricKey};
pub use seal::{open, seal, SEALED_LEN};
pub use symmetric::{sym_decrypt, sym_encrypt};

// Onion-Layered Relay — nested hybrid encryption, one layer per relay
//
// Each layer reveals only the next hop address to the relay that peels
// it; the innermost layer addresses the destination and carries the
// plaintext message.

use tracing::debug;

use super::frame::{LayerBody, NextHop, OnionFrame};
use crate::circuit::Circuit;
use crate::config::NetworkConfig;
use crate::crypto::{open, seal, sym_decrypt, sym_encrypt, PrivateKey, PublicKey, SymmetricKey};
use crate::error::{OnionError, Result};

/// Wrap `payload` in one layer addressed to `next_hop`, readable only by
/// the holder of `recipient`'s private key.
///
/// A fresh symmetric key is generated for every call and dropped (and
/// wiped) before returning.
pub fn encrypt_layer(payload: &str, next_hop: NextHop, recipient: &PublicKey) -> Result<String> {
    let key = SymmetricKey::generate();

    let body = LayerBody {
        next_hop,
        payload: payload.to_string(),
    };
    let ciphertext = sym_encrypt(&key, &body.to_bytes())?;
    let sealed_key = seal(recipient, &key.export())?;

    Ok(OnionFrame::new(sealed_key, ciphertext).encode())
}

/// Remove one layer with this relay's private key.
///
/// Wrong keys and damaged frames both surface as `DecryptionFailure`.
pub fn peel_layer(frame: &str, private_key: &PrivateKey) -> Result<LayerBody> {
    let frame = OnionFrame::decode(frame)?;
    let material = open(private_key, frame.sealed_key())?;
    let key = SymmetricKey::import(&material)
        .map_err(|e| OnionError::DecryptionFailure(e.to_string()))?;
    let body = sym_decrypt(&key, frame.ciphertext())?;
    LayerBody::from_bytes(&body)
}

/// Construct the full onion for `circuit`, working backward from the exit.
///
/// Given a circuit [entry, middle, exit]:
/// - the exit's layer addresses `destination` and carries `message`
/// - each earlier relay's layer addresses the relay after it and carries
///   that relay's complete frame
/// - the returned frame is for the entry relay
pub fn build_onion(
    message: &str,
    destination: NextHop,
    circuit: &Circuit,
    addressing: &NetworkConfig,
) -> Result<String> {
    if circuit.is_empty() {
        return Err(OnionError::InvalidCircuitLength(0));
    }

    let mut payload = message.to_string();
    let mut next_hop = destination;

    for hop in circuit.hops().iter().rev() {
        payload = encrypt_layer(&payload, next_hop, &hop.public_key)?;
        next_hop = addressing.router_hop(hop.node_id)?;
    }

    debug!(
        "Built {}-layer onion ({} chars) for destination {}",
        circuit.len(),
        payload.len(),
        destination
    );

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::onion::frame::ASYM_SEGMENT_WIDTH;
    use crate::registry::NodeEntry;
    use proptest::prelude::*;

    fn relay(node_id: u16) -> (NodeEntry, KeyPair) {
        let keys = KeyPair::generate();
        (
            NodeEntry {
                node_id,
                public_key: *keys.public(),
            },
            keys,
        )
    }

    #[test]
    fn test_layer_roundtrip() {
        let keys = KeyPair::generate();
        let frame = encrypt_layer("hello", NextHop::new(3001), keys.public()).unwrap();

        let body = peel_layer(&frame, keys.private()).unwrap();
        assert_eq!(body.next_hop, NextHop::new(3001));
        assert_eq!(body.payload, "hello");
    }

    #[test]
    fn test_layer_with_reimported_keys() {
        let keys = KeyPair::generate();
        let public = PublicKey::decode(&keys.public().encode()).unwrap();
        let private = PrivateKey::decode(&keys.private().encode()).unwrap();

        let frame = encrypt_layer("hello", NextHop::new(4002), &public).unwrap();
        assert_eq!(
            peel_layer(&frame, &private).unwrap(),
            peel_layer(&frame, keys.private()).unwrap()
        );
    }

    #[test]
    fn test_peel_with_wrong_key_fails() {
        let keys = KeyPair::generate();
        let other = KeyPair::generate();
        let frame = encrypt_layer("hello", NextHop::new(3001), keys.public()).unwrap();

        let result = peel_layer(&frame, other.private());
        assert!(matches!(result, Err(OnionError::DecryptionFailure(_))));
    }

    #[test]
    fn test_peel_corrupted_body_fails() {
        let keys = KeyPair::generate();
        let frame = encrypt_layer("hello", NextHop::new(3001), keys.public()).unwrap();

        let mut corrupted: Vec<char> = frame.chars().collect();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == '0' { '1' } else { '0' };
        let corrupted: String = corrupted.into_iter().collect();

        assert!(matches!(
            peel_layer(&corrupted, keys.private()),
            Err(OnionError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_peel_out_of_range_next_hop_fails() {
        let keys = KeyPair::generate();
        let key = SymmetricKey::generate();
        let ciphertext = sym_encrypt(&key, b"0000070000hello").unwrap();
        let sealed_key = seal(keys.public(), &key.export()).unwrap();
        let frame = OnionFrame::new(sealed_key, ciphertext).encode();

        assert!(matches!(
            peel_layer(&frame, keys.private()),
            Err(OnionError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_fresh_key_per_layer() {
        let keys = KeyPair::generate();
        let a = encrypt_layer("same", NextHop::new(3001), keys.public()).unwrap();
        let b = encrypt_layer("same", NextHop::new(3001), keys.public()).unwrap();
        assert_ne!(a[..ASYM_SEGMENT_WIDTH], b[..ASYM_SEGMENT_WIDTH]);
        assert_ne!(a[ASYM_SEGMENT_WIDTH..], b[ASYM_SEGMENT_WIDTH..]);
    }

    #[test]
    fn test_onion_peels_hop_by_hop() {
        let config = NetworkConfig::default();
        let (a, a_keys) = relay(0);
        let (b, b_keys) = relay(5);
        let (c, c_keys) = relay(9);
        let circuit = Circuit::from_hops(vec![a, b, c]);
        let destination = config.user_hop(2).unwrap();

        let onion = build_onion("hello", destination, &circuit, &config).unwrap();

        let at_a = peel_layer(&onion, a_keys.private()).unwrap();
        assert_eq!(at_a.next_hop, config.router_hop(5).unwrap());

        let at_b = peel_layer(&at_a.payload, b_keys.private()).unwrap();
        assert_eq!(at_b.next_hop, config.router_hop(9).unwrap());

        let at_c = peel_layer(&at_b.payload, c_keys.private()).unwrap();
        assert_eq!(at_c.next_hop, destination);
        assert_eq!(at_c.payload, "hello");
    }

    #[test]
    fn test_onion_layers_out_of_order_fail() {
        let config = NetworkConfig::default();
        let (a, _a_keys) = relay(0);
        let (b, b_keys) = relay(1);
        let (c, _c_keys) = relay(2);
        let circuit = Circuit::from_hops(vec![a, b, c]);

        let onion = build_onion("hello", config.user_hop(0).unwrap(), &circuit, &config).unwrap();
        assert!(peel_layer(&onion, b_keys.private()).is_err());
    }

    #[test]
    fn test_build_onion_empty_circuit() {
        let config = NetworkConfig::default();
        let circuit = Circuit::from_hops(vec![]);
        let result = build_onion("hello", NextHop::new(3000), &circuit, &config);
        assert!(matches!(result, Err(OnionError::InvalidCircuitLength(0))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_layer_roundtrip(payload in ".{0,256}", port in any::<u16>()) {
            let keys = KeyPair::generate();
            let frame = encrypt_layer(&payload, NextHop::new(port), keys.public()).unwrap();
            let body = peel_layer(&frame, keys.private()).unwrap();
            prop_assert_eq!(body.next_hop, NextHop::new(port));
            prop_assert_eq!(body.payload, payload);
        }

        #[test]
        fn prop_key_segment_width_is_fixed(payload in ".{0,512}", port in any::<u16>()) {
            let keys = KeyPair::generate();
            let frame = encrypt_layer(&payload, NextHop::new(port), keys.public()).unwrap();
            let decoded = OnionFrame::decode(&frame).unwrap();
            prop_assert_eq!(decoded.sealed_key().len(), crate::crypto::SEALED_LEN);
            prop_assert!(frame.len() > ASYM_SEGMENT_WIDTH);
            let body_hex = hex::encode(decoded.ciphertext());
            prop_assert_eq!(&frame[ASYM_SEGMENT_WIDTH..], body_hex.as_str());
        }
    }
}

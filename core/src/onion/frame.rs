//! Wire frame of one onion layer
//!
//! ```text
//! base64(sealed layer key)    (exactly ASYM_SEGMENT_WIDTH chars)
//! hex(XChaCha20-Poly1305(next_hop_field || payload))
//! ```
//!
//! The first segment has a constant width, so a relay splits a frame at a
//! fixed offset instead of looking for a delimiter.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::SEALED_LEN;
use crate::error::{OnionError, Result};

/// Width of the zero-padded decimal next-hop field
pub const NEXT_HOP_WIDTH: usize = 10;

const fn base64_len(bytes: usize) -> usize {
    4 * ((bytes + 2) / 3)
}

/// Encoded width of the sealed-key segment
pub const ASYM_SEGMENT_WIDTH: usize = base64_len(SEALED_LEN);

/// Port-style address of the next hop (a router or the destination user)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NextHop(u16);

impl NextHop {
    pub fn new(port: u16) -> Self {
        Self(port)
    }

    pub fn port(self) -> u16 {
        self.0
    }

    /// Fixed-width field as carried at the head of a layer body.
    pub fn encode(self) -> String {
        format!("{:0width$}", self.0, width = NEXT_HOP_WIDTH)
    }

    /// Read the field back out of a peeled layer. Anything other than ten
    /// digits naming a valid port counts as a failed peel.
    pub fn parse(field: &str) -> Result<Self> {
        if field.len() != NEXT_HOP_WIDTH || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OnionError::DecryptionFailure(format!(
                "malformed next-hop field {:?}",
                field
            )));
        }
        let value: u64 = field.parse().map_err(|_| {
            OnionError::DecryptionFailure(format!("malformed next-hop field {:?}", field))
        })?;
        u16::try_from(value).map(Self).map_err(|_| {
            OnionError::DecryptionFailure(format!("next hop {} is not a port", value))
        })
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cleartext of one layer once the symmetric segment is decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerBody {
    pub next_hop: NextHop,
    pub payload: String,
}

impl LayerBody {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NEXT_HOP_WIDTH + self.payload.len());
        out.extend_from_slice(self.next_hop.encode().as_bytes());
        out.extend_from_slice(self.payload.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| OnionError::DecryptionFailure("layer body is not UTF-8".to_string()))?;
        let field = text.get(..NEXT_HOP_WIDTH).ok_or_else(|| {
            OnionError::DecryptionFailure("layer body shorter than next-hop field".to_string())
        })?;
        Ok(Self {
            next_hop: NextHop::parse(field)?,
            payload: text[NEXT_HOP_WIDTH..].to_string(),
        })
    }
}

/// One encryption layer as transmitted between hops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnionFrame {
    sealed_key: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl OnionFrame {
    pub(crate) fn new(sealed_key: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        debug_assert_eq!(sealed_key.len(), SEALED_LEN);
        Self {
            sealed_key,
            ciphertext,
        }
    }

    pub fn sealed_key(&self) -> &[u8] {
        &self.sealed_key
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn encode(&self) -> String {
        let mut wire = BASE64.encode(&self.sealed_key);
        wire.push_str(&hex::encode(&self.ciphertext));
        wire
    }

    pub fn decode(wire: &str) -> Result<Self> {
        let (asym, sym) = match (wire.get(..ASYM_SEGMENT_WIDTH), wire.get(ASYM_SEGMENT_WIDTH..)) {
            (Some(asym), Some(sym)) => (asym, sym),
            _ => {
                return Err(OnionError::DecryptionFailure(format!(
                    "frame shorter than the {}-char key segment",
                    ASYM_SEGMENT_WIDTH
                )))
            }
        };

        let sealed_key = BASE64
            .decode(asym)
            .map_err(|e| OnionError::DecryptionFailure(format!("key segment: {}", e)))?;
        if sealed_key.len() != SEALED_LEN {
            return Err(OnionError::DecryptionFailure(format!(
                "key segment decodes to {} bytes, expected {}",
                sealed_key.len(),
                SEALED_LEN
            )));
        }

        if sym.is_empty() {
            return Err(OnionError::DecryptionFailure("missing body segment".to_string()));
        }
        let ciphertext = hex::decode(sym)
            .map_err(|e| OnionError::DecryptionFailure(format!("body segment: {}", e)))?;

        Ok(Self {
            sealed_key,
            ciphertext,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asym_segment_width() {
        assert_eq!(SEALED_LEN, 104);
        assert_eq!(ASYM_SEGMENT_WIDTH, 140);
    }

    #[test]
    fn test_next_hop_encoding() {
        assert_eq!(NextHop::new(3001).encode(), "0000003001");
        assert_eq!(NextHop::new(0).encode(), "0000000000");
        assert_eq!(NextHop::new(u16::MAX).encode().len(), NEXT_HOP_WIDTH);
    }

    #[test]
    fn test_next_hop_parse() {
        assert_eq!(NextHop::parse("0000004002").unwrap(), NextHop::new(4002));
        assert!(matches!(
            NextHop::parse("000004002"),
            Err(OnionError::DecryptionFailure(_))
        ));
        assert!(NextHop::parse("00000040a2").is_err());
        assert!(NextHop::parse("+000004002").is_err());
        assert!(matches!(
            NextHop::parse("0000070000"),
            Err(OnionError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_layer_body_layout() {
        let body = LayerBody {
            next_hop: NextHop::new(4001),
            payload: "hello".to_string(),
        };
        assert_eq!(body.to_bytes(), b"0000004001hello");
        assert_eq!(LayerBody::from_bytes(b"0000004001hello").unwrap(), body);
    }

    #[test]
    fn test_layer_body_empty_payload() {
        let body = LayerBody::from_bytes(b"0000003000").unwrap();
        assert_eq!(body.next_hop.port(), 3000);
        assert!(body.payload.is_empty());
    }

    #[test]
    fn test_layer_body_too_short() {
        assert!(LayerBody::from_bytes(b"00003").is_err());
        assert!(LayerBody::from_bytes(&[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn test_frame_decode_rejects_short_input() {
        assert!(OnionFrame::decode("abc").is_err());
        assert!(OnionFrame::decode("").is_err());
    }

    #[test]
    fn test_frame_decode_rejects_missing_body() {
        let frame = OnionFrame::new(vec![7u8; SEALED_LEN], vec![1, 2, 3]);
        let wire = frame.encode();
        assert!(OnionFrame::decode(&wire[..ASYM_SEGMENT_WIDTH]).is_err());
    }

    #[test]
    fn test_frame_decode_rejects_bad_hex() {
        let frame = OnionFrame::new(vec![7u8; SEALED_LEN], vec![1, 2, 3]);
        let mut wire = frame.encode();
        wire.push_str("zz");
        assert!(OnionFrame::decode(&wire).is_err());
    }

    #[test]
    fn test_frame_encode_decode() {
        let frame = OnionFrame::new(vec![9u8; SEALED_LEN], vec![0xab; 40]);
        let wire = frame.encode();
        assert_eq!(wire.len(), ASYM_SEGMENT_WIDTH + 80);
        assert_eq!(OnionFrame::decode(&wire).unwrap(), frame);
    }
}

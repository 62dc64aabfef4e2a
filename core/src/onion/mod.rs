// Onion routing — wire frame plus the layered encryption engine

pub mod frame;
pub mod layer;

pub use frame::{LayerBody, NextHop, OnionFrame, ASYM_SEGMENT_WIDTH, NEXT_HOP_WIDTH};
pub use layer::{build_onion, encrypt_layer, peel_layer};

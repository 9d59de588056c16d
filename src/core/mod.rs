//! Core primitives shared by the game and network layers.

pub mod hash;

pub use hash::{StateHash, StateHasher, digest_encoded, short_hex};

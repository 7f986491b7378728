//! From-scratch symmetric and asymmetric primitives the wire protocol's
//! guarantees depend on exactly: AES-128 (key schedule + single block),
//! CBC streaming mode, CMAC (OMAC1), SHA-256, and X25519.

pub mod aes;
pub mod cbc;
pub mod cmac;
pub mod sha256;
pub mod x25519;

pub use aes::{RoundKey, BLOCK_SIZE};
pub use cbc::CbcCipher;
pub use cmac::Cmac;
pub use sha256::Sha256;

//! Shared transport core for parcel: the framed wire format, the group
//! Diffie-Hellman handshake and rekey protocol, typed payloads, and the
//! from-scratch cryptographic primitives they're built from. `parceld`
//! and `parcel-client` both depend on this crate rather than duplicating
//! any of it.

pub mod crypto;
pub mod error;
pub mod handshake;
pub mod keys;
pub mod logging;
pub mod payload;
pub mod wire;

pub use error::{CoreError, Result};
pub use keys::{KeyPair, SymKey};
pub use wire::{Wire, WireType};

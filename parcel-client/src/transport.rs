//! Thin cable-framing helpers over a connected `TcpStream`. Grounded in
//! `original_source/src/parcel/wire-interface.c`'s `transmit_wire` and
//! `client.c`'s `recv_new_wire`/`decrypt_received_message` — encrypt under
//! the session key and frame into a cable to send; read a cable header,
//! then its body, then try the session key before falling back to the
//! control key to receive.

use std::io::{Read, Write};
use std::net::TcpStream;

use parcel_core::error::{CoreError, Result};
use parcel_core::keys::SymKey;
use parcel_core::wire::{self, Wire};

/// Encrypt `wire` under `session_key` and write it to `stream` as a
/// length-framed cable. Mirrors `transmit_wire`.
pub fn transmit(stream: &mut TcpStream, mut wire: Wire, session_key: &SymKey) -> Result<()> {
    wire.encrypt(session_key)?;
    let cabled = wire::frame_cable(&wire);
    stream.write_all(&cabled).map_err(|e| CoreError::io("transmit", e))
}

/// Block for exactly one cable off `stream`, decrypting its wire against
/// `candidates` in order (session key first, then control key). Mirrors
/// `recv_new_wire` + `decrypt_received_message`'s two-key fallback.
pub fn receive(stream: &mut TcpStream, candidates: &[&SymKey]) -> Result<Wire> {
    let mut header = [0u8; wire::CABLE_HEADER_LEN];
    stream.read_exact(&mut header).map_err(|e| CoreError::io("receive", e))?;
    let total_len = wire::parse_cable_header(&header)?;

    let mut cable = vec![0u8; total_len];
    cable[..wire::CABLE_HEADER_LEN].copy_from_slice(&header);
    stream
        .read_exact(&mut cable[wire::CABLE_HEADER_LEN..])
        .map_err(|e| CoreError::io("receive", e))?;

    let (raw, len) = wire::unwrap_cable(cable);
    wire::decrypt_wire(raw, len, candidates)
}

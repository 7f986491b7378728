//! The framed wire format every peer and the relay speak: a `wire` carries
//! one encrypted, double-MAC'd payload; a `cable` carries one `wire` over a
//! length-prefixed TCP stream. Grounded field-for-field in
//! `original_source/src/common/wire/wire.c` and `common/cable.c`, with the
//! byte layout kept exact (`byteorder`'s little-endian helpers standing in
//! for the original's `wire_pack64`/`wire_unpack64`) so the two
//! implementations are interchangeable on the wire.

use byteorder::{ByteOrder, LittleEndian};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::{CbcCipher, Cmac, BLOCK_SIZE};
use crate::error::{CoreError, Result};
use crate::keys::SymKey;

/// `-wire-`, the six-byte signature stamped into every header block.
pub const WIRE_SIGNATURE: &[u8; 6] = b"-wire-";

/// `.cable`, the six-byte signature stamped into every cable header.
pub const CABLE_SIGNATURE: &[u8; 6] = b".cable";

const AUTH_LEN: usize = 48; // mac_outer(16) + mac_inner(16) + iv(16)
const HEADER_LEN: usize = BLOCK_SIZE; // signature(6) + wire_len(8) + alignment(1) + type(1)
pub const WIRE_HEADER_LEN: usize = AUTH_LEN + HEADER_LEN;
pub const CABLE_HEADER_LEN: usize = 14; // signature(6) + len(8)

const OFF_MAC_OUTER: usize = 0;
const OFF_MAC_INNER: usize = 16;
const OFF_IV: usize = 32;
const OFF_SIGNATURE: usize = AUTH_LEN;
const OFF_WIRE_LEN: usize = AUTH_LEN + 6;
const OFF_ALIGNMENT: usize = AUTH_LEN + 14;
const OFF_TYPE: usize = AUTH_LEN + 15;
const OFF_DATA: usize = WIRE_HEADER_LEN;

/// Data region is capped at 64 KiB, matching `DATA_LEN_MAX` in `wire.h`.
pub const DATA_LEN_MAX: usize = 1 << 16;

/// Alignment only ever needs to express 0..=15 padding bytes; the upper
/// nibble must stay zero. A non-zero upper nibble is rejected as framing
/// corruption rather than silently masked off.
const ALIGNMENT_VALUE_MASK: u8 = 0x0f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    None = 0,
    Text = 1,
    File = 2,
    Ctrl = 3,
    Stat = 4,
    SessionKey = 5,
}

impl WireType {
    fn from_u8(b: u8) -> Result<WireType> {
        Ok(match b {
            0 => WireType::None,
            1 => WireType::Text,
            2 => WireType::File,
            3 => WireType::Ctrl,
            4 => WireType::Stat,
            5 => WireType::SessionKey,
            _ => return Err(CoreError::framing("wire_type", "unrecognized wire type byte")),
        })
    }
}

fn round_up_block(len: usize) -> usize {
    (len + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE
}

/// An owned, contiguous wire buffer: `auth || header || data`. Builders
/// produce one in plaintext form via [`Wire::build`]; [`Wire::encrypt`]
/// and [`decrypt_wire`] transition it between plaintext and wire form in
/// place.
pub struct Wire {
    buf: Vec<u8>,
}

impl Wire {
    /// Frame `data` as a new plaintext wire of the given type, padding it
    /// up to a block boundary and stamping a fresh random IV. Mirrors
    /// `init_wire`.
    pub fn build(wire_type: WireType, data: &[u8]) -> Result<Wire> {
        if data.len() > DATA_LEN_MAX {
            return Err(CoreError::framing("init_wire", "payload exceeds maximum data length"));
        }

        let aligned_len = round_up_block(data.len());
        let alignment = aligned_len - data.len();
        let wire_len = WIRE_HEADER_LEN + aligned_len;

        let mut buf = vec![0u8; wire_len];

        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);
        buf[OFF_IV..OFF_IV + BLOCK_SIZE].copy_from_slice(&iv);

        buf[OFF_SIGNATURE..OFF_SIGNATURE + 6].copy_from_slice(WIRE_SIGNATURE);
        LittleEndian::write_u64(&mut buf[OFF_WIRE_LEN..OFF_WIRE_LEN + 8], wire_len as u64);
        buf[OFF_ALIGNMENT] = alignment as u8;
        buf[OFF_TYPE] = wire_type as u8;
        buf[OFF_DATA..OFF_DATA + data.len()].copy_from_slice(data);

        Ok(Wire { buf })
    }

    pub fn wire_type(&self) -> Result<WireType> {
        WireType::from_u8(self.buf[OFF_TYPE])
    }

    pub fn wire_len(&self) -> usize {
        LittleEndian::read_u64(&self.buf[OFF_WIRE_LEN..OFF_WIRE_LEN + 8]) as usize
    }

    pub fn alignment(&self) -> usize {
        (self.buf[OFF_ALIGNMENT] & ALIGNMENT_VALUE_MASK) as usize
    }

    /// The original, unpadded payload — `data()` with the trailing
    /// alignment bytes dropped.
    pub fn payload(&self) -> &[u8] {
        let end = self.buf.len() - self.alignment();
        &self.buf[OFF_DATA..end]
    }

    fn aligned_data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[OFF_DATA..]
    }

    /// Encrypt this wire in place under `key`: the cipher key (low 16
    /// bytes) keys AES-CBC over the header then the data, the MAC key
    /// (high 16 bytes) keys the inner CMAC (over the encrypted header)
    /// and the outer CMAC (over inner-MAC || iv || header || data).
    /// Mirrors `encrypt_wire`.
    pub fn encrypt(&mut self, key: &SymKey) -> Result<()> {
        let wire_len = self.wire_len();
        let iv: [u8; BLOCK_SIZE] = self.buf[OFF_IV..OFF_IV + BLOCK_SIZE].try_into().unwrap();

        let mut cipher = CbcCipher::new(key.cipher_half(), &iv);
        let cmac = Cmac::new(key.mac_half());

        {
            let header = &mut self.buf[OFF_SIGNATURE..OFF_SIGNATURE + HEADER_LEN];
            cipher.encrypt(header);
        }
        cipher.encrypt(self.aligned_data_mut());

        let inner_tag = cmac.tag(&self.buf[OFF_SIGNATURE..OFF_SIGNATURE + HEADER_LEN]);
        self.buf[OFF_MAC_INNER..OFF_MAC_INNER + BLOCK_SIZE].copy_from_slice(&inner_tag);

        let outer_tag = cmac.tag(&self.buf[OFF_MAC_INNER..wire_len]);
        self.buf[OFF_MAC_OUTER..OFF_MAC_OUTER + BLOCK_SIZE].copy_from_slice(&outer_tag);

        Ok(())
    }

    /// Borrow the full encrypted (or plaintext, pre-encrypt) buffer for
    /// transmission or framing into a cable.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn from_raw(buf: Vec<u8>) -> Wire {
        Wire { buf }
    }
}

/// Decrypt `raw` (an encrypted wire of `len` bytes received off the
/// socket) trying each key in `candidates` in order, stopping at the
/// first whose inner MAC verifies. Mirrors `decrypt_wire`'s two-key
/// fallback, generalized from exactly two keys to a candidate slice per
/// §7's resolution (session key, then control key).
pub fn decrypt_wire(raw: Vec<u8>, len: usize, candidates: &[&SymKey]) -> Result<Wire> {
    if len < WIRE_HEADER_LEN || raw.len() != len {
        return Err(CoreError::framing("decrypt_wire", "wire shorter than minimum header length"));
    }
    if candidates.is_empty() {
        return Err(CoreError::auth("decrypt_wire", "no candidate keys supplied"));
    }

    let iv: [u8; BLOCK_SIZE] = raw[OFF_IV..OFF_IV + BLOCK_SIZE].try_into().unwrap();

    let mut matched: Option<(&SymKey, Cmac)> = None;
    for key in candidates {
        let cmac = Cmac::new(key.mac_half());
        let inner_expected: [u8; BLOCK_SIZE] =
            raw[OFF_MAC_INNER..OFF_MAC_INNER + BLOCK_SIZE].try_into().unwrap();
        if cmac.verify(&raw[OFF_SIGNATURE..OFF_SIGNATURE + HEADER_LEN], &inner_expected) {
            matched = Some((key, cmac));
            break;
        }
    }

    let (key, cmac) = matched.ok_or_else(|| {
        CoreError::auth("decrypt_wire", "inner mac verification failed under every candidate key")
    })?;

    let mut cipher = CbcCipher::new(key.cipher_half(), &iv);

    let mut header_block = [0u8; HEADER_LEN];
    header_block.copy_from_slice(&raw[OFF_SIGNATURE..OFF_SIGNATURE + HEADER_LEN]);
    cipher.decrypt(&mut header_block);

    if &header_block[0..6] != WIRE_SIGNATURE {
        return Err(CoreError::framing("decrypt_wire", "decrypted header signature mismatch"));
    }

    let header_wire_len = LittleEndian::read_u64(&header_block[6..14]) as usize;
    if header_wire_len != len {
        return Err(CoreError::auth("decrypt_wire", "wire length doesn't match received length"));
    }

    let alignment_byte = header_block[14];
    if alignment_byte & !ALIGNMENT_VALUE_MASK != 0 {
        return Err(CoreError::framing("decrypt_wire", "alignment byte has non-zero upper bits"));
    }

    let outer_expected: [u8; BLOCK_SIZE] = raw[OFF_MAC_OUTER..OFF_MAC_OUTER + BLOCK_SIZE].try_into().unwrap();
    if !cmac.verify(&raw[OFF_MAC_INNER..len], &outer_expected) {
        return Err(CoreError::auth("decrypt_wire", "outer mac verification failed"));
    }

    let mut wire = Wire::from_raw(raw);
    let aligned_len = len - OFF_DATA;
    cipher.decrypt(&mut wire.buf[OFF_DATA..OFF_DATA + aligned_len]);
    wire.buf[OFF_SIGNATURE..OFF_SIGNATURE + HEADER_LEN].copy_from_slice(&header_block);

    Ok(wire)
}

/// Build a `.cable`-framed buffer around an already-encrypted `wire`,
/// ready to hand to a socket write. Mirrors `init_cable`.
pub fn frame_cable(wire: &Wire) -> Vec<u8> {
    let payload = wire.as_bytes();
    let total_len = CABLE_HEADER_LEN + payload.len();

    let mut buf = Vec::with_capacity(total_len);
    buf.extend_from_slice(CABLE_SIGNATURE);
    let mut len_bytes = [0u8; 8];
    LittleEndian::write_u64(&mut len_bytes, total_len as u64);
    buf.extend_from_slice(&len_bytes);
    buf.extend_from_slice(payload);
    buf
}

/// The largest cable a well-formed peer can ever send: its own header
/// plus the biggest possible wire. An untrusted, pre-authentication
/// length field above this is a framing failure, not an allocation
/// request — without this cap a single forged header could demand an
/// arbitrarily large `vec![0u8; total_len]` from the caller.
pub const CABLE_LEN_MAX: usize = CABLE_HEADER_LEN + WIRE_HEADER_LEN + DATA_LEN_MAX;

/// Parse a just-received 14-byte cable header, returning the total cable
/// length the caller must read the remainder of. Mirrors `recv_cable`'s
/// header stage (`cable_check_magic` then `cable_get_total_len`).
pub fn parse_cable_header(header: &[u8; CABLE_HEADER_LEN]) -> Result<usize> {
    if &header[0..6] != CABLE_SIGNATURE {
        return Err(CoreError::framing("parse_cable_header", "invalid cable magic"));
    }
    let total_len = LittleEndian::read_u64(&header[6..14]) as usize;
    if total_len < CABLE_HEADER_LEN {
        return Err(CoreError::framing("parse_cable_header", "cable length shorter than its own header"));
    }
    if total_len > CABLE_LEN_MAX {
        return Err(CoreError::framing("parse_cable_header", "cable length exceeds the maximum possible wire size"));
    }
    Ok(total_len)
}

/// Extract the encapsulated, still-encrypted wire and its length out of
/// a complete cable buffer (header + payload). Mirrors `get_cabled_wire`.
pub fn unwrap_cable(cable: Vec<u8>) -> (Vec<u8>, usize) {
    let len = cable.len() - CABLE_HEADER_LEN;
    (cable[CABLE_HEADER_LEN..].to_vec(), len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SymKey {
        SymKey::new([byte; 32])
    }

    #[test]
    fn round_trips_under_the_same_key() {
        let k = key(0x11);
        let mut wire = Wire::build(WireType::Text, b"hello group").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&k).unwrap();
        let raw = wire.into_bytes();

        let decrypted = decrypt_wire(raw, len, &[&k]).unwrap();
        assert_eq!(decrypted.wire_type().unwrap(), WireType::Text);
        assert_eq!(decrypted.payload(), b"hello group");
    }

    #[test]
    fn falls_back_to_second_candidate_key() {
        let session = key(0x22);
        let control = key(0x33);
        let mut wire = Wire::build(WireType::Ctrl, b"rekey").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&control).unwrap();
        let raw = wire.into_bytes();

        let decrypted = decrypt_wire(raw, len, &[&session, &control]).unwrap();
        assert_eq!(decrypted.payload(), b"rekey");
    }

    #[test]
    fn rejects_when_no_candidate_key_matches() {
        let real = key(0x44);
        let wrong_a = key(0x55);
        let wrong_b = key(0x66);
        let mut wire = Wire::build(WireType::Text, b"secret").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&real).unwrap();
        let raw = wire.into_bytes();

        assert!(decrypt_wire(raw, len, &[&wrong_a, &wrong_b]).is_err());
    }

    #[test]
    fn detects_tampered_data() {
        let k = key(0x77);
        let mut wire = Wire::build(WireType::Text, b"untampered").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&k).unwrap();
        let mut raw = wire.into_bytes();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        assert!(decrypt_wire(raw, len, &[&k]).is_err());
    }

    #[test]
    fn detects_tampered_mac_outer() {
        let k = key(0xa1);
        let mut wire = Wire::build(WireType::Text, b"untampered").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&k).unwrap();
        let mut raw = wire.into_bytes();
        raw[OFF_MAC_OUTER] ^= 0x01;

        assert!(decrypt_wire(raw, len, &[&k]).is_err());
    }

    #[test]
    fn detects_tampered_mac_inner() {
        let k = key(0xa2);
        let mut wire = Wire::build(WireType::Text, b"untampered").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&k).unwrap();
        let mut raw = wire.into_bytes();
        raw[OFF_MAC_INNER] ^= 0x01;

        assert!(decrypt_wire(raw, len, &[&k]).is_err());
    }

    #[test]
    fn detects_tampered_iv() {
        let k = key(0xa3);
        let mut wire = Wire::build(WireType::Text, b"untampered").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&k).unwrap();
        let mut raw = wire.into_bytes();
        raw[OFF_IV] ^= 0x01;

        assert!(decrypt_wire(raw, len, &[&k]).is_err());
    }

    #[test]
    fn detects_tampered_header() {
        let k = key(0xa4);
        let mut wire = Wire::build(WireType::Text, b"untampered").unwrap();
        let len = wire.wire_len();
        wire.encrypt(&k).unwrap();
        let mut raw = wire.into_bytes();
        raw[OFF_SIGNATURE] ^= 0x01;

        assert!(decrypt_wire(raw, len, &[&k]).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let k = key(0x88);
        let mut wire = Wire::build(WireType::Text, b"payload").unwrap();
        let real_len = wire.wire_len();
        wire.encrypt(&k).unwrap();
        let raw = wire.into_bytes();

        assert!(decrypt_wire(raw, real_len + BLOCK_SIZE, &[&k]).is_err());
    }

    #[test]
    fn pads_unaligned_payload_up_to_a_block() {
        let wire = Wire::build(WireType::Text, b"13 bytes long").unwrap();
        assert_eq!(wire.alignment(), 3);
        assert_eq!(wire.wire_len() % BLOCK_SIZE, 0);
    }

    #[test]
    fn rejects_cable_length_above_the_sane_cap() {
        let mut header = [0u8; CABLE_HEADER_LEN];
        header[0..6].copy_from_slice(CABLE_SIGNATURE);
        LittleEndian::write_u64(&mut header[6..14], (CABLE_LEN_MAX + 1) as u64);
        assert!(parse_cable_header(&header).is_err());
    }

    #[test]
    fn accepts_cable_length_at_the_sane_cap() {
        let mut header = [0u8; CABLE_HEADER_LEN];
        header[0..6].copy_from_slice(CABLE_SIGNATURE);
        LittleEndian::write_u64(&mut header[6..14], CABLE_LEN_MAX as u64);
        assert_eq!(parse_cable_header(&header).unwrap(), CABLE_LEN_MAX);
    }

    #[test]
    fn cable_framing_round_trips_length() {
        let k = key(0x99);
        let mut wire = Wire::build(WireType::Text, b"framed").unwrap();
        wire.encrypt(&k).unwrap();
        let cabled = frame_cable(&wire);

        let mut header = [0u8; CABLE_HEADER_LEN];
        header.copy_from_slice(&cabled[..CABLE_HEADER_LEN]);
        let total_len = parse_cable_header(&header).unwrap();
        assert_eq!(total_len, cabled.len());

        let (payload, payload_len) = unwrap_cable(cabled);
        assert_eq!(payload_len, payload.len());
        assert_eq!(payload.len(), total_len - CABLE_HEADER_LEN);
    }
}

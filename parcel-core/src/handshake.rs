//! The two-party client/relay handshake and the relay-coordinated N-party
//! ring Diffie-Hellman rekey. Grounded directly in
//! `original_source/src/common/key-exchange.c`: `ke_snd`/`ke_rcv` become
//! [`send_key_frame`]/[`recv_key_frame`], `point_d`/`point_q`/`point_kx`
//! become thin calls into [`crate::crypto::x25519`], and
//! `two_party_client`/`two_party_server`/`server_send_ctrl_key`/
//! `rotate_intermediates`/`n_party_server`/`n_party_client` keep their
//! names and control flow, generalized over any `Read + Write` transport
//! instead of a raw platform socket handle.

use std::io::{Read, Write};

use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::{sha256::Sha256, x25519};
use crate::error::{CoreError, Result};
use crate::keys::SymKey;
use crate::payload::{CtrlMessage, CtrlMsgType, SessionKeyMessage, WirePayload};
use crate::wire::{self, Wire, WireType};

const KEY_LEN: usize = 32;
const KE_FRAME_LEN: usize = 1 + KEY_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum KeyFrameType {
    ClientPublic = 1,
    ServerPublic = 2,
    ExIntermediate = 4,
}

fn io_err(stage: &'static str, e: std::io::Error) -> CoreError {
    CoreError::io(stage, e)
}

/// Send a raw 33-byte `{type, key}` key-exchange frame. Mirrors `ke_snd`.
fn send_key_frame<W: Write>(w: &mut W, kind: KeyFrameType, key: &[u8; KEY_LEN]) -> Result<()> {
    let mut frame = [0u8; KE_FRAME_LEN];
    frame[0] = kind as u8;
    frame[1..].copy_from_slice(key);
    w.write_all(&frame).map_err(|e| io_err("send_key_frame", e))
}

/// Receive and validate a raw 33-byte key-exchange frame. Mirrors `ke_rcv`.
fn recv_key_frame<R: Read>(r: &mut R, expected: KeyFrameType) -> Result<[u8; KEY_LEN]> {
    let mut frame = [0u8; KE_FRAME_LEN];
    r.read_exact(&mut frame).map_err(|e| io_err("recv_key_frame", e))?;
    if frame[0] != expected as u8 {
        return Err(CoreError::handshake("recv_key_frame", "unexpected key frame type"));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&frame[1..]);
    Ok(key)
}

/// Generate a fresh, clamped X25519 private scalar. Mirrors `point_d`.
fn generate_secret() -> [u8; KEY_LEN] {
    let mut secret = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut secret);
    x25519::clamp(&mut secret);
    secret
}

fn send_cable<W: Write>(w: &mut W, cable: &[u8]) -> Result<()> {
    w.write_all(cable).map_err(|e| io_err("send_cable", e))
}

fn recv_cable<R: Read>(r: &mut R) -> Result<(Vec<u8>, usize)> {
    let mut header = [0u8; wire::CABLE_HEADER_LEN];
    r.read_exact(&mut header).map_err(|e| io_err("recv_cable", e))?;
    let total_len = wire::parse_cable_header(&header)?;

    let mut cable = vec![0u8; total_len];
    cable[..wire::CABLE_HEADER_LEN].copy_from_slice(&header);
    r.read_exact(&mut cable[wire::CABLE_HEADER_LEN..]).map_err(|e| io_err("recv_cable", e))?;

    Ok(wire::unwrap_cable(cable))
}

fn transmit_cabled_wire<W: Write>(w: &mut W, wire: &mut Wire, key: &SymKey) -> Result<()> {
    wire.encrypt(key)?;
    let cabled = wire::frame_cable(wire);
    send_cable(w, &cabled)
}

/// The client side of the two-party handshake run against the relay on
/// connect: generate an ephemeral key pair, exchange public keys, derive
/// the shared secret, then receive and decrypt the relay's current
/// control key under it. Mirrors `two_party_client`.
pub fn two_party_client<S: Read + Write>(stream: &mut S) -> Result<SymKey> {
    let secret = generate_secret();
    let public = x25519::public_key(&secret);

    send_key_frame(stream, KeyFrameType::ClientPublic, &public)?;
    let server_public = recv_key_frame(stream, KeyFrameType::ServerPublic)?;

    let shared = x25519::shared_secret(&secret, &server_public);
    let shared_key = SymKey::new(shared);

    let (raw, len) = recv_cable(stream)?;
    let wire = wire::decrypt_wire(raw, len, &[&shared_key])?;
    if wire.wire_type()? != WireType::SessionKey {
        return Err(CoreError::handshake("two_party_client", "expected a session-key wire"));
    }

    let session_key_msg = SessionKeyMessage::decode(wire.payload())?;
    Ok(SymKey::new(session_key_msg.key))
}

/// The relay side of the two-party handshake: receive the client's
/// public key, generate our own ephemeral pair, derive the shared
/// secret, and hand the client the relay's current control key,
/// encrypted under that shared secret. Mirrors `two_party_server`.
pub fn two_party_server<S: Read + Write>(stream: &mut S, control_key: &SymKey) -> Result<()> {
    let client_public = recv_key_frame(stream, KeyFrameType::ClientPublic)?;

    let secret = generate_secret();
    let server_public = x25519::public_key(&secret);
    send_key_frame(stream, KeyFrameType::ServerPublic, &server_public)?;

    let shared = x25519::shared_secret(&secret, &client_public);
    let shared_key = SymKey::new(shared);

    let payload = SessionKeyMessage { key: *control_key.as_bytes() };
    let mut wire = Wire::build(WireType::SessionKey, &payload.encode())?;
    transmit_cabled_wire(stream, &mut wire, &shared_key)
}

/// Broadcast a fresh control key to every connected peer, encrypted
/// under the outgoing control key, and overwrite `control_key` with the
/// new value in place. Mirrors `server_send_ctrl_key`.
fn server_send_ctrl_key<S: Read + Write>(peers: &mut [S], control_key: &mut SymKey) -> Result<()> {
    let mut renewed = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut renewed);

    let rounds = (peers.len() - 1) as u16;
    let payload = CtrlMessage { kind: CtrlMsgType::Dhke, rounds, renewed_key: renewed };
    let mut wire = Wire::build(WireType::Ctrl, &payload.encode())?;
    wire.encrypt(control_key)?;
    let cabled = wire::frame_cable(&wire);

    for peer in peers.iter_mut() {
        send_cable(peer, &cabled)?;
    }

    *control_key = SymKey::new(renewed);
    Ok(())
}

/// One round of the ring rotation: each peer's freshly-combined
/// intermediate key is forwarded to the next peer in the ring. Mirrors
/// `rotate_intermediates`.
fn rotate_intermediates<S: Read + Write>(peers: &mut [S]) -> Result<()> {
    let count = peers.len();
    for i in 0..count {
        let intermediate = recv_key_frame(&mut peers[i], KeyFrameType::ExIntermediate)?;
        let next = (i + 1) % count;
        send_key_frame(&mut peers[next], KeyFrameType::ExIntermediate, &intermediate)?;
    }
    Ok(())
}

/// Drive a full N-party rekey across every connected peer: announce the
/// new control key, then run `count - 1` rounds of ring rotation so each
/// peer folds every other peer's contribution into a shared session key.
/// A single connected peer has nothing to rekey against and is skipped.
/// Mirrors `n_party_server`.
pub fn n_party_server<S: Read + Write>(peers: &mut [S], control_key: &mut SymKey) -> Result<()> {
    if peers.is_empty() {
        return Err(CoreError::handshake("n_party_server", "no connected peers"));
    }

    let rounds = peers.len() - 1;
    if rounds < 1 {
        return Ok(());
    }

    server_send_ctrl_key(peers, control_key)?;

    for _ in 0..rounds {
        rotate_intermediates(peers)?;
    }

    Ok(())
}

/// The client side of an N-party rekey: contribute an ephemeral key pair
/// to the ring, fold in each forwarded intermediate for `rounds` rounds,
/// and derive the new session key as `SHA-256` of the final round's
/// shared secret. Mirrors `n_party_client`.
pub fn n_party_client<S: Read + Write>(stream: &mut S, rounds: usize) -> Result<SymKey> {
    let secret = generate_secret();
    let public = x25519::public_key(&secret);
    send_key_frame(stream, KeyFrameType::ExIntermediate, &public)?;

    let mut shared = [0u8; KEY_LEN];
    for round in 0..rounds {
        let intermediate_public = recv_key_frame(stream, KeyFrameType::ExIntermediate)?;
        shared = x25519::shared_secret(&secret, &intermediate_public);

        if round == rounds - 1 {
            let digest = Sha256::digest(&shared);
            return Ok(SymKey::new(digest));
        }
        send_key_frame(stream, KeyFrameType::ExIntermediate, &shared)?;
    }

    Err(CoreError::handshake("n_party_client", "ring rotation ended without a final round"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        (server, client.join().unwrap())
    }

    #[test]
    fn two_party_handshake_delivers_matching_control_key() {
        let (mut server_sock, mut client_sock) = loopback_pair();
        let control_key = SymKey::new([0x42u8; KEY_LEN]);
        let expected = *control_key.as_bytes();

        let server = thread::spawn(move || two_party_server(&mut server_sock, &control_key).unwrap());
        let delivered = two_party_client(&mut client_sock).unwrap();
        server.join().unwrap();

        assert_eq!(delivered.as_bytes(), &expected);
    }

    #[test]
    fn three_party_rekey_converges_on_shared_session_key() {
        let (a_server, a_client) = loopback_pair();
        let (b_server, b_client) = loopback_pair();
        let (c_server, c_client) = loopback_pair();

        let mut peers = vec![a_server, b_server, c_server];
        let mut control_key = SymKey::new([0x11u8; KEY_LEN]);

        let relay = thread::spawn(move || {
            n_party_server(&mut peers, &mut control_key).unwrap();
        });

        let clients: Vec<_> = [a_client, b_client, c_client]
            .into_iter()
            .map(|mut sock| thread::spawn(move || n_party_client(&mut sock, 2).unwrap()))
            .collect();

        relay.join().unwrap();
        let session_keys: Vec<SymKey> = clients.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(session_keys[0].as_bytes(), session_keys[1].as_bytes());
        assert_eq!(session_keys[1].as_bytes(), session_keys[2].as_bytes());
    }

    #[test]
    fn single_peer_rekey_is_a_no_op() {
        let (server_sock, _client_sock) = loopback_pair();
        let mut peers = vec![server_sock];
        let mut control_key = SymKey::new([0x22u8; KEY_LEN]);
        let before = *control_key.as_bytes();

        n_party_server(&mut peers, &mut control_key).unwrap();
        assert_eq!(control_key.as_bytes(), &before);
    }
}

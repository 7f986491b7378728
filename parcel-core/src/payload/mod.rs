//! Typed payload bodies carried inside a wire's `data` region.
//!
//! Grounded in `original_source/src/common/wire/wire-gen.h`'s
//! `{type(1), len[8], data[]}` header shared by every `*_msg_t`, and in the
//! per-type field layouts of `wire-text.c`, `wire-file.c`, `wire-stat.c`,
//! `wire-ctrl.c`. Design note "Code-generation macros" replaces the C
//! macro-generated structs with one [`Payload`] enum plus a [`WirePayload`]
//! trait each concrete type implements.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CoreError, Result};
use crate::wire::WireType;

pub const USERNAME_LENGTH: usize = 64;
pub const FILE_NAME_LEN: usize = 255;
pub const KEY_LEN: usize = 32;

const PREFIX_LEN: usize = 1 + 8; // sub-type(1) + inner len(8)

fn read_fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn write_fixed_str(dst: &mut [u8], s: &str) -> Result<()> {
    if s.len() >= dst.len() {
        return Err(CoreError::framing("write_fixed_str", "string too long for fixed-width field"));
    }
    for b in dst.iter_mut() {
        *b = 0;
    }
    dst[..s.len()].copy_from_slice(s.as_bytes());
    Ok(())
}

/// Common shape every typed payload implements: a stable `WIRE_TYPE` tag
/// for the outer wire, and byte-exact encode/decode of the sub-header
/// plus body. `encode` returns the buffer handed to `Wire::build`
/// unchanged; `decode` takes `Wire::payload()` unchanged.
pub trait WirePayload: Sized {
    const WIRE_TYPE: WireType;

    fn encode(&self) -> Vec<u8>;
    fn decode(body: &[u8]) -> Result<Self>;
}

fn require_len(body: &[u8], min: usize, stage: &'static str) -> Result<()> {
    if body.len() < min {
        return Err(CoreError::framing(stage, "payload shorter than its fixed header"));
    }
    Ok(())
}

// --- TEXT ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TextMsgType {
    Normal = 0,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub user: String,
    pub text: Vec<u8>,
}

impl WirePayload for TextMessage {
    const WIRE_TYPE: WireType = WireType::Text;

    fn encode(&self) -> Vec<u8> {
        // `len + 1` zeroed bytes with only `len` copied in, same as
        // `text_msg_from_text`: the trailing byte stays NUL.
        let total = PREFIX_LEN + USERNAME_LENGTH + self.text.len() + 1;
        let mut buf = vec![0u8; total];
        buf[0] = TextMsgType::Normal as u8;
        LittleEndian::write_u64(&mut buf[1..9], total as u64);
        write_fixed_str(&mut buf[9..9 + USERNAME_LENGTH], &self.user).expect("username pre-validated");
        let text_start = 9 + USERNAME_LENGTH;
        buf[text_start..text_start + self.text.len()].copy_from_slice(&self.text);
        buf
    }

    fn decode(body: &[u8]) -> Result<TextMessage> {
        require_len(body, PREFIX_LEN + USERNAME_LENGTH + 1, "text_msg")?;
        let user = read_fixed_str(&body[9..9 + USERNAME_LENGTH]);
        let trailing = &body[9 + USERNAME_LENGTH..];
        let text = trailing.strip_suffix(&[0u8]).unwrap_or(trailing).to_vec();
        Ok(TextMessage { user, text })
    }
}

// --- STAT ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatMsgType {
    UserConnect = 0,
    UserDisconnect = 1,
    UserRename = 2,
}

impl StatMsgType {
    fn from_u8(b: u8) -> Result<StatMsgType> {
        Ok(match b {
            0 => StatMsgType::UserConnect,
            1 => StatMsgType::UserDisconnect,
            2 => StatMsgType::UserRename,
            _ => return Err(CoreError::framing("stat_msg", "unrecognized stat sub-type")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatMessage {
    pub kind: StatMsgType,
    pub user: String,
    /// Only populated for `UserRename`: the user's new name.
    pub new_name: Option<String>,
}

impl WirePayload for StatMessage {
    const WIRE_TYPE: WireType = WireType::Stat;

    fn encode(&self) -> Vec<u8> {
        let trailing = self.new_name.as_deref().unwrap_or("").as_bytes().to_vec();
        let total = PREFIX_LEN + USERNAME_LENGTH + trailing.len();
        let mut buf = vec![0u8; total];
        buf[0] = self.kind as u8;
        LittleEndian::write_u64(&mut buf[1..9], total as u64);
        write_fixed_str(&mut buf[9..9 + USERNAME_LENGTH], &self.user).expect("username pre-validated");
        buf[9 + USERNAME_LENGTH..].copy_from_slice(&trailing);
        buf
    }

    fn decode(body: &[u8]) -> Result<StatMessage> {
        require_len(body, PREFIX_LEN + USERNAME_LENGTH, "stat_msg")?;
        let kind = StatMsgType::from_u8(body[0])?;
        let user = read_fixed_str(&body[9..9 + USERNAME_LENGTH]);
        let trailing = &body[9 + USERNAME_LENGTH..];
        let new_name = if kind == StatMsgType::UserRename && !trailing.is_empty() {
            Some(String::from_utf8_lossy(trailing).into_owned())
        } else {
            None
        };
        Ok(StatMessage { kind, user, new_name })
    }
}

// --- CTRL ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum CtrlMsgType {
    Error = -1,
    Exit = 0,
    Dhke = 1,
}

impl CtrlMsgType {
    fn from_u8(b: u8) -> Result<CtrlMsgType> {
        Ok(match b as i8 {
            -1 => CtrlMsgType::Error,
            0 => CtrlMsgType::Exit,
            1 => CtrlMsgType::Dhke,
            _ => return Err(CoreError::framing("ctrl_msg", "unrecognized ctrl sub-type")),
        })
    }
}

/// A `CTRL`/`DHKE` message: the relay's announcement that a rekey is
/// starting, carrying the number of ring-rotation rounds remaining and a
/// freshly generated control key, itself encrypted under the outgoing
/// control key (see [`crate::handshake::server_send_ctrl_key`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtrlMessage {
    pub kind: CtrlMsgType,
    pub rounds: u16,
    pub renewed_key: [u8; KEY_LEN],
}

impl WirePayload for CtrlMessage {
    const WIRE_TYPE: WireType = WireType::Ctrl;

    fn encode(&self) -> Vec<u8> {
        let total = PREFIX_LEN + 2 + KEY_LEN;
        let mut buf = vec![0u8; total];
        buf[0] = self.kind as u8;
        LittleEndian::write_u64(&mut buf[1..9], total as u64);
        LittleEndian::write_u16(&mut buf[9..11], self.rounds);
        buf[11..11 + KEY_LEN].copy_from_slice(&self.renewed_key);
        buf
    }

    fn decode(body: &[u8]) -> Result<CtrlMessage> {
        require_len(body, PREFIX_LEN + 2 + KEY_LEN, "ctrl_msg")?;
        let kind = CtrlMsgType::from_u8(body[0])?;
        let rounds = LittleEndian::read_u16(&body[9..11]);
        let mut renewed_key = [0u8; KEY_LEN];
        renewed_key.copy_from_slice(&body[11..11 + KEY_LEN]);
        Ok(CtrlMessage { kind, rounds, renewed_key })
    }
}

// --- SESSION KEY -------------------------------------------------------

/// The 32 bytes of key material the relay hands a freshly connected
/// client at the end of the two-party handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyMessage {
    pub key: [u8; KEY_LEN],
}

impl WirePayload for SessionKeyMessage {
    const WIRE_TYPE: WireType = WireType::SessionKey;

    fn encode(&self) -> Vec<u8> {
        self.key.to_vec()
    }

    fn decode(body: &[u8]) -> Result<SessionKeyMessage> {
        require_len(body, KEY_LEN, "session_key_msg")?;
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&body[..KEY_LEN]);
        Ok(SessionKeyMessage { key })
    }
}

// --- FILE ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileMsgType {
    Unknown = 0,
    Binary = 1,
    Text = 2,
}

impl FileMsgType {
    fn from_u8(b: u8) -> Result<FileMsgType> {
        Ok(match b {
            0 => FileMsgType::Unknown,
            1 => FileMsgType::Binary,
            2 => FileMsgType::Text,
            _ => return Err(CoreError::framing("file_msg", "unrecognized file sub-type")),
        })
    }
}

const FILE_FIXED_LEN: usize = USERNAME_LENGTH + FILE_NAME_LEN + 4 + 4 + 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMessage {
    pub kind: FileMsgType,
    pub user: String,
    pub filename: String,
    pub gid: u32,
    pub uid: u32,
    pub mode: u16,
    pub data: Vec<u8>,
}

impl WirePayload for FileMessage {
    const WIRE_TYPE: WireType = WireType::File;

    fn encode(&self) -> Vec<u8> {
        let total = PREFIX_LEN + FILE_FIXED_LEN + self.data.len();
        let mut buf = vec![0u8; total];
        buf[0] = self.kind as u8;
        LittleEndian::write_u64(&mut buf[1..9], total as u64);

        let mut off = 9;
        write_fixed_str(&mut buf[off..off + USERNAME_LENGTH], &self.user).expect("username pre-validated");
        off += USERNAME_LENGTH;
        write_fixed_str(&mut buf[off..off + FILE_NAME_LEN], &self.filename).expect("filename pre-validated");
        off += FILE_NAME_LEN;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.gid);
        off += 4;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.uid);
        off += 4;
        LittleEndian::write_u16(&mut buf[off..off + 2], self.mode);
        off += 2;
        buf[off..].copy_from_slice(&self.data);
        buf
    }

    fn decode(body: &[u8]) -> Result<FileMessage> {
        require_len(body, PREFIX_LEN + FILE_FIXED_LEN, "file_msg")?;
        let kind = FileMsgType::from_u8(body[0])?;

        let mut off = 9;
        let user = read_fixed_str(&body[off..off + USERNAME_LENGTH]);
        off += USERNAME_LENGTH;
        let filename = read_fixed_str(&body[off..off + FILE_NAME_LEN]);
        off += FILE_NAME_LEN;
        let gid = LittleEndian::read_u32(&body[off..off + 4]);
        off += 4;
        let uid = LittleEndian::read_u32(&body[off..off + 4]);
        off += 4;
        let mode = LittleEndian::read_u16(&body[off..off + 2]);
        off += 2;
        let data = body[off..].to_vec();

        Ok(FileMessage { kind, user, filename, gid, uid, mode, data })
    }
}

/// Any decoded typed payload, tagged by the outer wire's [`WireType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(TextMessage),
    File(FileMessage),
    Stat(StatMessage),
    Ctrl(CtrlMessage),
    SessionKey(SessionKeyMessage),
}

impl Payload {
    /// Decode `body` (a wire's unpadded `payload()`) according to the
    /// wire's own `type` tag.
    pub fn decode(wire_type: WireType, body: &[u8]) -> Result<Payload> {
        Ok(match wire_type {
            WireType::Text => Payload::Text(TextMessage::decode(body)?),
            WireType::File => Payload::File(FileMessage::decode(body)?),
            WireType::Stat => Payload::Stat(StatMessage::decode(body)?),
            WireType::Ctrl => Payload::Ctrl(CtrlMessage::decode(body)?),
            WireType::SessionKey => Payload::SessionKey(SessionKeyMessage::decode(body)?),
            WireType::None => return Err(CoreError::framing("payload_decode", "TYPE_NONE carries no payload")),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Payload::Text(m) => m.encode(),
            Payload::File(m) => m.encode(),
            Payload::Stat(m) => m.encode(),
            Payload::Ctrl(m) => m.encode(),
            Payload::SessionKey(m) => m.encode(),
        }
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            Payload::Text(_) => WireType::Text,
            Payload::File(_) => WireType::File,
            Payload::Stat(_) => WireType::Stat,
            Payload::Ctrl(_) => WireType::Ctrl,
            Payload::SessionKey(_) => WireType::SessionKey,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_round_trips() {
        let msg = TextMessage { user: "alice".into(), text: b"hi group".to_vec() };
        let encoded = msg.encode();
        let decoded = TextMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn text_message_encode_appends_trailing_nul() {
        let msg = TextMessage { user: "alice".into(), text: b"hello".to_vec() };
        let encoded = msg.encode();
        assert_eq!(&encoded[encoded.len() - 6..], b"hello\0");
    }

    #[test]
    fn stat_rename_round_trips_new_name() {
        let msg = StatMessage {
            kind: StatMsgType::UserRename,
            user: "bob".into(),
            new_name: Some("bobby".into()),
        };
        let encoded = msg.encode();
        let decoded = StatMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn stat_connect_has_no_new_name() {
        let msg = StatMessage { kind: StatMsgType::UserConnect, user: "carol".into(), new_name: None };
        let decoded = StatMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.new_name, None);
    }

    #[test]
    fn ctrl_dhke_round_trips() {
        let msg = CtrlMessage { kind: CtrlMsgType::Dhke, rounds: 4, renewed_key: [0x5au8; KEY_LEN] };
        let decoded = CtrlMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn file_message_round_trips() {
        let msg = FileMessage {
            kind: FileMsgType::Binary,
            user: "dave".into(),
            filename: "report.bin".into(),
            gid: 1000,
            uid: 1000,
            mode: 0o644,
            data: vec![1, 2, 3, 4, 5],
        };
        let decoded = FileMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn session_key_round_trips() {
        let msg = SessionKeyMessage { key: [0x99u8; KEY_LEN] };
        let decoded = SessionKeyMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn payload_enum_dispatches_on_wire_type() {
        let msg = TextMessage { user: "eve".into(), text: b"dispatch me".to_vec() };
        let encoded = Payload::Text(msg.clone()).encode();
        let decoded = Payload::decode(WireType::Text, &encoded).unwrap();
        assert_eq!(decoded, Payload::Text(msg));
    }

    #[test]
    fn rejects_truncated_body() {
        assert!(TextMessage::decode(&[0u8; 4]).is_err());
    }
}

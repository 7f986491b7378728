//! File I/O for the `/file` command and received `FILE` payloads.
//!
//! Grounded in `original_source/src/common/wire/wire-file.c`'s
//! `file_msg_from_file`/`file_msg_to_file`: read the whole file into
//! memory along with its owner/mode metadata to build a [`FileMessage`],
//! or write a received one to a configured directory with its requested
//! mode bits. A whole file rides inside a single wire, so its usable size
//! is bounded by [`wire::DATA_LEN_MAX`] minus the FILE sub-format's fixed
//! header — not by `wire-file.c`'s own much larger `FILE_DATA_MAX_SIZE`,
//! a constant the original source never reconciles with its own
//! 64 KiB-per-wire `DATA_LEN_MAX`.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use parcel_core::error::{CoreError, Result};
use parcel_core::payload::{FileMessage, FileMsgType, USERNAME_LENGTH};
use parcel_core::wire::DATA_LEN_MAX;

const FILE_FIXED_LEN: usize = USERNAME_LENGTH + 255 + 4 + 4 + 2;
const PREFIX_LEN: usize = 1 + 8;

/// The largest file body that still fits in one wire alongside the FILE
/// sub-format's fixed header.
pub const MAX_FILE_BODY_LEN: usize = DATA_LEN_MAX - PREFIX_LEN - FILE_FIXED_LEN;

/// Build a `FileMessage` from a path on disk, matching `file_msg_from_file`:
/// read the full contents, tag the sub-type by a crude text/binary sniff,
/// and carry the file's basename, gid/uid, and mode bits.
pub fn file_message_from_path(user: &str, path: &Path) -> Result<FileMessage> {
    let data = fs::read(path).map_err(|e| CoreError::io("file_message_from_path", e))?;
    if data.is_empty() {
        return Err(CoreError::framing("file_message_from_path", "refusing to send an empty file"));
    }
    if data.len() > MAX_FILE_BODY_LEN {
        return Err(CoreError::framing("file_message_from_path", "file exceeds the per-wire size limit"));
    }

    let metadata = fs::metadata(path).map_err(|e| CoreError::io("file_message_from_path", e))?;
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CoreError::framing("file_message_from_path", "path has no usable filename"))?
        .to_string();

    Ok(FileMessage {
        kind: if looks_like_text(&data) { FileMsgType::Text } else { FileMsgType::Binary },
        user: user.to_string(),
        filename,
        gid: metadata.gid(),
        uid: metadata.uid(),
        mode: (metadata.permissions().mode() & 0o7777) as u16,
        data,
    })
}

/// Write a received `FileMessage` into `directory` under its (sanitized)
/// basename, then apply its requested mode bits. Mirrors
/// `file_msg_to_file`.
pub fn write_file_message(msg: &FileMessage, directory: &Path) -> Result<PathBuf> {
    let basename = Path::new(&msg.filename)
        .file_name()
        .ok_or_else(|| CoreError::framing("write_file_message", "empty filename field"))?;

    let path = directory.join(basename);
    fs::write(&path, &msg.data).map_err(|e| CoreError::io("write_file_message", e))?;

    let mode = (msg.mode & 0o7777) as u32;
    fs::set_permissions(&path, fs::Permissions::from_mode(mode))
        .map_err(|e| CoreError::io("write_file_message", e))?;

    Ok(path)
}

/// A crude binary/text sniff: a NUL byte anywhere in the first 8 KiB
/// means "binary", matching the spirit of `xfiletype`'s own heuristic.
fn looks_like_text(data: &[u8]) -> bool {
    let probe = &data[..data.len().min(8192)];
    !probe.contains(&0u8)
}

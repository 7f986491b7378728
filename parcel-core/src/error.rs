//! `CoreError`, the single error type every layer of `parcel-core` converts
//! into. Grounded in the shape of `t51core/src/net/result.rs`'s `Error`
//! enum (one variant per failure family, `Io` wrapping `io::ErrorKind`
//! rather than the whole `io::Error` so the type stays `Clone`-friendly),
//! but named and grouped per §7 of the protocol's error handling design.

use std::io;
use thiserror::Error;

/// Stage tag identifying which protocol step raised an error, used for
/// logging without printing key material.
pub type Stage = &'static str;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error during {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("framing error during {stage}: {reason}")]
    Framing { stage: Stage, reason: &'static str },

    /// MAC verification failed under every attempted key, or the decrypted
    /// `wire_len` didn't match the received length (length mismatch is
    /// folded in here per §7: "treated as authentication failure").
    #[error("authentication failed during {stage}: {reason}")]
    Auth { stage: Stage, reason: &'static str },

    #[error("handshake failed during {stage}: {reason}")]
    Handshake { stage: Stage, reason: &'static str },

    #[error("command error: {0}")]
    Command(String),
}

impl CoreError {
    pub fn io(stage: Stage, source: io::Error) -> CoreError {
        CoreError::Io { stage, source }
    }

    pub fn framing(stage: Stage, reason: &'static str) -> CoreError {
        CoreError::Framing { stage, reason }
    }

    pub fn auth(stage: Stage, reason: &'static str) -> CoreError {
        CoreError::Auth { stage, reason }
    }

    pub fn handshake(stage: Stage, reason: &'static str) -> CoreError {
        CoreError::Handshake { stage, reason }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

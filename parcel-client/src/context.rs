//! The mutex-guarded state shared between the send and receive threads.
//!
//! Grounded in `original_source/src/parcel/client.h`'s `client_t`: a
//! username, the session/control key pair, a "connection announced" flag,
//! and a kill flag, all behind one lock (`mutex_lock` there, a single
//! `Mutex<ClientContext>` here). `parcel-core`'s design note §9
//! ("Thread context sharing via mutex + memcpy snapshots") calls for
//! replacing the raw memcpy snapshot idiom with explicit lock scopes,
//! which is what [`ClientContext::snapshot`] and the setters below do.

use std::sync::{Arc, Mutex};

use parcel_core::keys::KeyPair;

/// A point-in-time copy of the fields the send/receive threads need to
/// act on without holding the lock across a blocking socket call.
#[derive(Clone)]
pub struct ContextSnapshot {
    pub username: String,
    pub keys: KeyPair,
    pub announced: bool,
    pub kill: bool,
}

pub struct ClientContext {
    username: String,
    keys: KeyPair,
    announced: bool,
    kill: bool,
}

impl ClientContext {
    pub fn new(username: String, keys: KeyPair) -> Arc<Mutex<ClientContext>> {
        Arc::new(Mutex::new(ClientContext {
            username,
            keys,
            announced: false,
            kill: false,
        }))
    }
}

/// Read-dominant accessors over the shared context. Each call takes the
/// lock for exactly as long as it takes to copy or replace a field —
/// never across a socket read/write.
pub trait SharedContext {
    fn snapshot(&self) -> ContextSnapshot;
    fn set_username(&self, username: String);
    fn set_keys(&self, keys: KeyPair);
    fn mark_announced(&self);
    fn request_shutdown(&self);
    fn should_shutdown(&self) -> bool;
}

impl SharedContext for Arc<Mutex<ClientContext>> {
    fn snapshot(&self) -> ContextSnapshot {
        let guard = self.lock().unwrap_or_else(|p| p.into_inner());
        ContextSnapshot {
            username: guard.username.clone(),
            keys: guard.keys.clone(),
            announced: guard.announced,
            kill: guard.kill,
        }
    }

    fn set_username(&self, username: String) {
        let mut guard = self.lock().unwrap_or_else(|p| p.into_inner());
        guard.username = username;
    }

    fn set_keys(&self, keys: KeyPair) {
        let mut guard = self.lock().unwrap_or_else(|p| p.into_inner());
        guard.keys = keys;
    }

    fn mark_announced(&self) {
        let mut guard = self.lock().unwrap_or_else(|p| p.into_inner());
        guard.announced = true;
    }

    fn request_shutdown(&self) {
        let mut guard = self.lock().unwrap_or_else(|p| p.into_inner());
        guard.kill = true;
    }

    fn should_shutdown(&self) -> bool {
        let guard = self.lock().unwrap_or_else(|p| p.into_inner());
        guard.kill
    }
}

//! The receive thread: block on cables, decrypt each wire (session key
//! first, then control key), and dispatch on the wire's type. Grounded in
//! `original_source/src/parcel/client.c`'s `recv_thread` and
//! `proc-type.c`'s `proc_type`/`proc_ctrl`/`proc_text`/`proc_stat`/
//! `proc_file`, restructured around [`SharedContext`] snapshots instead of
//! the original's whole-struct `memcpy`.

use std::net::TcpStream;
use std::path::PathBuf;

use parcel_core::handshake::n_party_client;
use parcel_core::keys::KeyPair;
use parcel_core::payload::{CtrlMsgType, Payload};
use parcel_core::wire::WireType;

use crate::context::{ClientContext, SharedContext};
use crate::files::write_file_message;
use crate::send::send_announcement;
use crate::transport::receive;
use std::sync::{Arc, Mutex};

/// Run the receive loop until the socket closes or the shared context's
/// kill flag is observed.
pub fn run(mut stream: TcpStream, ctx: Arc<Mutex<ClientContext>>, file_dir: Option<PathBuf>) {
    loop {
        if ctx.should_shutdown() {
            break;
        }

        let snapshot = ctx.snapshot();
        let wire = {
            let candidates = [&snapshot.keys.session, &snapshot.keys.control];
            match receive(&mut stream, &candidates) {
                Ok(w) => w,
                Err(e) => {
                    if !ctx.should_shutdown() {
                        log::warn!("receive failed, disconnecting: {e}");
                    }
                    break;
                }
            }
        };

        let wire_type = match wire.wire_type() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("unrecognized wire type: {e}");
                continue;
            }
        };

        let payload = match Payload::decode(wire_type, wire.payload()) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("failed to decode payload: {e}");
                continue;
            }
        };

        match payload {
            Payload::Text(msg) => {
                println!("\x1b[2K\r{}: {}", msg.user, String::from_utf8_lossy(&msg.text));
            }
            Payload::Stat(msg) => {
                use parcel_core::payload::StatMsgType::*;
                match msg.kind {
                    UserConnect => println!("\x1b[1m{} is online\x1b[0m", msg.user),
                    UserDisconnect => println!("\x1b[1m{} is offline\x1b[0m", msg.user),
                    UserRename => println!(
                        "\x1b[2K\r{} has changed their name to {}\x1b[0m",
                        msg.user,
                        msg.new_name.as_deref().unwrap_or("")
                    ),
                }
            }
            Payload::File(msg) => {
                println!("{} sent a file: {} ({} kb)", msg.user, msg.filename, msg.data.len() >> 10);
                if let Some(dir) = &file_dir {
                    match write_file_message(&msg, dir) {
                        Ok(path) => log::info!("wrote received file to {}", path.display()),
                        Err(e) => log::error!("failed to persist received file: {e}"),
                    }
                }
            }
            Payload::Ctrl(msg) => match msg.kind {
                CtrlMsgType::Dhke => {
                    log::info!("received DHKE ctrl msg, {} rounds", msg.rounds);
                    let new_session = match n_party_client(&mut stream, msg.rounds as usize) {
                        Ok(key) => key,
                        Err(e) => {
                            log::error!("n-party rekey failed: {e}");
                            ctx.request_shutdown();
                            break;
                        }
                    };
                    let new_control = parcel_core::keys::SymKey::new(msg.renewed_key);
                    ctx.set_keys(KeyPair::new(new_session, new_control));

                    if !snapshot.announced {
                        ctx.mark_announced();
                        send_announcement(&mut stream, &ctx);
                    }
                }
                CtrlMsgType::Exit | CtrlMsgType::Error => {
                    log::info!("received shutdown control message");
                    ctx.request_shutdown();
                    break;
                }
            },
            Payload::SessionKey(_) => {
                log::warn!("unexpected session-key wire outside the handshake");
            }
        }
    }
}

//! The send thread: read a line from the prompt, parse it as a runtime
//! command or plain chat text, and transmit the matching typed payload.
//! Grounded in `original_source/src/parcel/client.c`'s `send_thread` and
//! `commands.c`'s `exec_cmd`, restructured around [`SharedContext`]
//! instead of the original's per-iteration `xmemcpy_locked` snapshot.

use std::io::{self, Write};
use std::net::TcpStream;
use std::path::Path;

use parcel_core::payload::{Payload, StatMessage, StatMsgType, TextMessage};
use parcel_core::wire::Wire;

use crate::commands::{parse_command, Command, ParsedCommand};
use crate::context::{ClientContext, SharedContext};
use crate::files::file_message_from_path;
use crate::transport::transmit;
use std::sync::{Arc, Mutex};

fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    if line.is_empty() {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Send the one-time `STAT`/`UserConnect` announcement once a client's
/// first rekey completes and it has a usable session key. Called from the
/// receive thread right after installing the post-handshake keys.
pub fn send_announcement(stream: &mut TcpStream, ctx: &Arc<Mutex<ClientContext>>) {
    let username = ctx.snapshot().username;
    let payload = Payload::Stat(StatMessage { kind: StatMsgType::UserConnect, user: username, new_name: None });
    if !send_payload(stream, ctx, payload) {
        log::warn!("failed to send connection announcement");
    }
}

fn send_payload(stream: &mut TcpStream, ctx: &Arc<Mutex<ClientContext>>, payload: Payload) -> bool {
    let session_key = ctx.snapshot().keys.session;
    let wire = match Wire::build(payload.wire_type(), &payload.encode()) {
        Ok(w) => w,
        Err(e) => {
            log::error!("failed to build outgoing wire: {e}");
            return false;
        }
    };
    if let Err(e) = transmit(stream, wire, &session_key) {
        log::error!("failed to transmit wire: {e}");
        return false;
    }
    true
}

/// Run the send loop until the user disconnects or the shared context's
/// kill flag is observed. Returns once the connection is torn down.
pub fn run(mut stream: TcpStream, ctx: Arc<Mutex<ClientContext>>) {
    loop {
        if ctx.should_shutdown() {
            break;
        }

        let snapshot = ctx.snapshot();
        let prompt = format!("{}: ", snapshot.username);
        let line = match prompt_line(&prompt) {
            Ok(l) => l,
            Err(_) => {
                ctx.request_shutdown();
                break;
            }
        };

        if line.is_empty() {
            continue;
        }

        match parse_command(&line) {
            ParsedCommand::NotACommand => {
                let payload = Payload::Text(TextMessage { user: snapshot.username, text: line.into_bytes() });
                if !send_payload(&mut stream, &ctx, payload) {
                    log::warn!("error sending encrypted text");
                }
            }
            ParsedCommand::Unrecognized => {
                eprintln!("Unrecognized command, \"{line}\"");
            }
            ParsedCommand::Ambiguous => {
                eprintln!("Ambiguous command entered");
                print_command_list();
            }
            ParsedCommand::Command(Command::List) => print_command_list(),
            ParsedCommand::Command(Command::Clear) => {
                print!("\x1b[2J\x1b[H");
                let _ = io::stdout().flush();
            }
            ParsedCommand::Command(Command::Version) => {
                println!("parcel {}", env!("CARGO_PKG_VERSION"));
            }
            ParsedCommand::Command(Command::EncInfo) => {
                let snap = ctx.snapshot();
                println!("Session Key: {}", hex(snap.keys.session.as_bytes()));
                println!("Control Key: {}", hex(snap.keys.control.as_bytes()));
            }
            ParsedCommand::Command(Command::Username) => {
                let new_name = match prompt_line("> New username: ") {
                    Ok(n) => n,
                    Err(_) => {
                        ctx.request_shutdown();
                        break;
                    }
                };
                let payload = Payload::Stat(StatMessage {
                    kind: StatMsgType::UserRename,
                    user: snapshot.username.clone(),
                    new_name: Some(new_name.clone()),
                });
                if send_payload(&mut stream, &ctx, payload) {
                    ctx.set_username(new_name);
                } else {
                    log::warn!("error sending rename notification");
                }
            }
            ParsedCommand::Command(Command::File) => {
                let path = match prompt_line("> File path: ") {
                    Ok(p) => p,
                    Err(_) => {
                        ctx.request_shutdown();
                        break;
                    }
                };
                match file_message_from_path(&snapshot.username, Path::new(&path)) {
                    Ok(msg) => {
                        if !send_payload(&mut stream, &ctx, Payload::File(msg)) {
                            log::warn!("error sending encrypted file");
                        }
                    }
                    Err(e) => eprintln!("> File \"{path}\" could not be sent: {e}"),
                }
            }
            ParsedCommand::Command(Command::Exit) => {
                let payload = Payload::Stat(StatMessage {
                    kind: StatMsgType::UserDisconnect,
                    user: snapshot.username,
                    new_name: None,
                });
                let _ = send_payload(&mut stream, &ctx, payload);
                ctx.request_shutdown();
                let _ = stream.shutdown(std::net::Shutdown::Both);
                break;
            }
        }
    }
}

fn print_command_list() {
    println!(
        "parcel commands:\n\
         \x20 /list         list available commands\n\
         \x20 /q            exit the server and close parcel\n\
         \x20 /username     change username\n\
         \x20 /encinfo      display current encryption parameters\n\
         \x20 /file         send a file\n\
         \x20 /clear        clear the screen\n\
         \x20 /version      print build version"
    );
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

//! `parcel`: the group-chat client. Parses CLI args (prompting for
//! anything mandatory left unset), completes the two-party handshake with
//! the relay, then runs the send and receive threads against a shared,
//! mutex-guarded context. Mirrors the shape of
//! `original_source/src/parcel/parcel.c`'s `main`.

mod cli;
mod commands;
mod context;
mod files;
mod recv;
mod send;
mod transport;

use std::io::{self, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::thread;

use clap::Parser;

use parcel_core::handshake::two_party_client;
use parcel_core::keys::{KeyPair, SymKey};

use context::ClientContext;

const USERNAME_MAX_LENGTH: usize = 32;

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn login_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "parcel-user".to_string())
}

fn resolve_address(args: &cli::ClientArgs) -> io::Result<String> {
    match &args.address {
        Some(addr) if !addr.is_empty() => Ok(addr.clone()),
        _ => prompt("> Enter server address: "),
    }
}

fn resolve_username(args: &cli::ClientArgs) -> io::Result<String> {
    if args.use_login_name {
        return Ok(login_name());
    }
    match &args.username {
        Some(name) if !name.is_empty() => Ok(name.clone()),
        _ => prompt("> Enter username: "),
    }
}

fn main() {
    parcel_core::logging::init(log::LevelFilter::Info);
    let args = cli::ClientArgs::parse();

    let address = match resolve_address(&args) {
        Ok(a) => a,
        Err(e) => {
            log::error!("failed to read server address: {e}");
            std::process::exit(1);
        }
    };

    let mut username = match resolve_username(&args) {
        Ok(u) => u,
        Err(e) => {
            log::error!("failed to read username: {e}");
            std::process::exit(1);
        }
    };
    username.truncate(USERNAME_MAX_LENGTH);

    let target = format!("{address}:{port}", port = args.port);
    let mut stream = match TcpStream::connect(&target) {
        Ok(s) => s,
        Err(e) => {
            log::error!("could not connect to {target}: {e}");
            std::process::exit(1);
        }
    };

    let control_key = match two_party_client(&mut stream) {
        Ok(key) => key,
        Err(e) => {
            log::error!("failed to perform initial key exchange with server: {e}");
            std::process::exit(1);
        }
    };

    println!("=== Connected to server ===");

    let keys = KeyPair::new(SymKey::zero(), control_key);
    let ctx = ClientContext::new(username, keys);

    let recv_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to clone socket for receive thread: {e}");
            std::process::exit(1);
        }
    };

    let file_dir = dirs::home_dir().map(|home| -> PathBuf { home.join("parcel-downloads") });
    if let Some(dir) = &file_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("could not create file download directory {}: {e}", dir.display());
        }
    }

    let recv_ctx = ctx.clone();
    let receiver = thread::spawn(move || recv::run(recv_stream, recv_ctx, file_dir));

    send::run(stream, ctx);

    let _ = receiver.join();
}

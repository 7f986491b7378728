//! `parceld`: the relay daemon. Parses CLI args, wires up the logging
//! sink, binds the listener, and runs the event loop. Mirrors the shape
//! of the original's `main`/`init_daemon`/`main_thread` split in
//! `original_source/src/parceld/daemon.c` and `parceld.c`.

mod cli;
mod relay;

use clap::Parser;

fn main() {
    let args = cli::RelayArgs::parse();
    parcel_core::logging::init(log::LevelFilter::Info);

    log::info!("starting parceld on port {}", args.port);

    let mut relay = match relay::Relay::bind(args.port) {
        Ok(relay) => relay,
        Err(e) => {
            log::error!("failed to bind relay on port {}: {e}", args.port);
            std::process::exit(1);
        }
    };

    if let Err(e) = relay.run() {
        log::error!("relay event loop exited: {e}");
        std::process::exit(1);
    }
}

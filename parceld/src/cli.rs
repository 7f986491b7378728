//! Command-line surface for `parceld`, via `clap`'s derive API — the
//! modern counterpart to the teacher's legacy `clap` 2.x `App`/`Arg`
//! builder usage in `server/services/authenticator/src/main.rs`.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "parceld", about = "Relay daemon for parcel group chats")]
pub struct RelayArgs {
    /// TCP port to listen on.
    #[arg(short = 'p', long, default_value_t = 2315)]
    pub port: u16,
}

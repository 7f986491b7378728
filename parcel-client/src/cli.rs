//! Command-line surface for `parcel`, via `clap`'s derive API — matching
//! `parceld::cli`'s use of the same modern `clap` derive style the teacher
//! carried for its own CLI binaries.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "parcel", about = "Encrypted group-chat client")]
pub struct ClientArgs {
    /// Server address to connect to. Prompted interactively if omitted.
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// Server TCP port.
    #[arg(short = 'p', long, default_value_t = 2315)]
    pub port: u16,

    /// Username to present to other peers. Prompted interactively if
    /// omitted (unless `-l` is given).
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Use the local login name as the username instead of prompting.
    #[arg(short = 'l', long = "login-name")]
    pub use_login_name: bool,
}

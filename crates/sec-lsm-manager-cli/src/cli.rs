//! Command-line argument definitions.

use clap::Parser;

use sec_lsm_manager_config::{SocketEndpoint, default_socket_endpoint};

/// Sends commands to the sec-lsm-manager daemon.
///
/// With a COMMAND, runs it once. Otherwise reads one command per line from
/// standard input, skipping blank lines and `#` comments.
#[derive(Parser, Debug)]
#[command(name = "sec-lsm-manager-cmd", version)]
pub(crate) struct Cli {
    /// Daemon endpoint, `unix:<path>` or `tcp:<host>:<port>`.
    #[arg(short, long, value_name = "SPEC", default_value_t = default_socket_endpoint())]
    pub(crate) socket: SocketEndpoint,
    /// Prints each command before its replies.
    #[arg(short, long)]
    pub(crate) echo: bool,
    /// Command word followed by its arguments.
    #[arg(
        value_name = "COMMAND",
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) command: Vec<String>,
}

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a storage node until ctrl-c.
    Serve(ServeArgs),
    /// Print the data held by a storage node as a JSON array.
    Get(GetArgs),
    /// Replace the data held by a storage node.
    Set(SetArgs),
    /// Check that a UDP echo responder is reachable.
    Ping(PingArgs),
    /// Ask a question on stdin and wait a bounded time for the answer.
    Ask(AskArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind, as host:port. Port 0 picks an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:7000")]
    pub listen: String,

    /// Also answer UDP liveness pings on this address.
    #[arg(long)]
    pub echo: Option<SocketAddr>,
}

#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// Address of the storage node.
    #[arg(long, default_value = "127.0.0.1:7000")]
    pub server: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    /// Address of the storage node.
    #[arg(long, default_value = "127.0.0.1:7000")]
    pub server: SocketAddr,

    /// New contents. No values clears the node.
    pub values: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PingArgs {
    /// Address of the echo responder, as host:port.
    #[arg(long)]
    pub server: String,

    /// Give up after this many milliseconds.
    #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    /// An answer option. Repeat for each option, in menu order.
    #[arg(long = "option", required = true)]
    pub options: Vec<String>,

    /// How long to wait for an answer, in milliseconds.
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,
}

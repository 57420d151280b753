//! Top-level CLI: `voxgate-server` with no subcommand serves the process;
//! `voxgate-server config ...` nests the tenant-config tool (spec §4.10).

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "voxgate-server", version, about = "Voice-AI telephony bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP/WebSocket server (the default when no subcommand is given).
    Serve,
    /// Tenant config get/set/unset/merge/validate.
    Config(voxgate_config::ConfigArgs),
}

//! Command line interface for the `coredump-recv` binary.
//!
//! Shared with `build.rs`, which renders the manual page, so this module may
//! only depend on `clap` and `std`.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `coredump-recv` binary.
#[derive(Debug, Parser)]
#[command(
    name = "coredump-recv",
    version,
    about = "Receive coredumps streamed by devices over TCP"
)]
pub struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept connections and store every received dump.
    Serve(ServeArgs),
    /// Stream a dump file to a receiver as a device would.
    Send(SendArgs),
}

/// Options for `serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:8766")]
    pub bind: SocketAddr,

    /// Directory receiving dump files.
    #[arg(short, long, default_value = "received_coredump_files")]
    pub output_dir: PathBuf,

    /// Seconds a connection may stay silent before it is dropped; 0 disables.
    #[arg(long, default_value_t = 60)]
    pub idle_timeout_secs: u64,

    /// Largest accepted payload per transfer frame, in bytes.
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    pub max_payload_len: usize,

    /// Number of accept tasks; defaults to the number of CPUs.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Maximum number of dumps received at once.
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

/// Options for `send`.
#[derive(Debug, Args)]
pub struct SendArgs {
    /// Receiver address.
    #[arg(short, long, default_value = "127.0.0.1:8766")]
    pub addr: String,

    /// Device identifier, e.g. `aa:bb:cc:dd:ee:ff`.
    #[arg(short, long)]
    pub device: String,

    /// Firmware version reported in every frame.
    #[arg(short = 'V', long)]
    pub firmware_version: String,

    /// Payload bytes per transfer frame.
    #[arg(long, default_value_t = 1024)]
    pub chunk_size: usize,

    /// Dump file to send.
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn serve_defaults_match_receiver_defaults() {
        let cli = Cli::parse_from(["coredump-recv", "serve"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind.port(), 8766);
        assert_eq!(args.output_dir.to_str(), Some("received_coredump_files"));
        assert_eq!(args.idle_timeout_secs, 60);
        assert_eq!(args.max_payload_len, 16 * 1024 * 1024);
        assert!(args.workers.is_none());
        assert!(args.max_connections.is_none());
    }

    #[test]
    fn send_requires_identity() {
        assert!(Cli::try_parse_from(["coredump-recv", "send", "dump.bin"]).is_err());

        let cli = Cli::parse_from([
            "coredump-recv",
            "send",
            "--device",
            "aa:bb:cc:dd:ee:ff",
            "-V",
            "v2.1.2",
            "dump.bin",
        ]);
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.device, "aa:bb:cc:dd:ee:ff");
        assert_eq!(args.chunk_size, 1024);
        assert_eq!(args.file.to_str(), Some("dump.bin"));
    }
}

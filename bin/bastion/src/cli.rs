//! Command line definition.

use std::path::PathBuf;

use bastion_node_core::args::LogArgs;
use clap::{Args, Parser, Subcommand};
use libp2p::{Multiaddr, PeerId};

/// Bastion - connection admission control for libp2p nodes
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, short, value_name = "PATH", global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Load the configuration, build every component and print a summary.
    Validate,
    /// Evaluate an outbound dial against the gating policy.
    Dial(DialArgs),
    /// Evaluate an inbound connection against the gating policy.
    Accept(AcceptArgs),
    /// Configuration helpers.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Args)]
pub(crate) struct DialArgs {
    /// Peer to dial.
    #[arg(long)]
    pub(crate) peer: PeerId,

    /// Address to dial the peer at.
    #[arg(long)]
    pub(crate) addr: Option<Multiaddr>,
}

#[derive(Debug, Args)]
pub(crate) struct AcceptArgs {
    /// Remote address of the connection.
    #[arg(long)]
    pub(crate) addr: Multiaddr,

    /// Authenticated remote peer, if the handshake completed.
    #[arg(long)]
    pub(crate) peer: Option<PeerId>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum ConfigCommands {
    /// Print the default configuration as TOML.
    Default,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dial() {
        let peer = PeerId::random();
        let cli = Cli::try_parse_from([
            "bastion",
            "dial",
            "--peer",
            &peer.to_string(),
            "--addr",
            "/ip4/8.8.8.8/tcp/4001",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.logs.verbosity, 2);
        let Commands::Dial(args) = cli.command else {
            panic!("expected dial");
        };
        assert_eq!(args.peer, peer);
        assert_eq!(args.addr, Some("/ip4/8.8.8.8/tcp/4001".parse().unwrap()));
    }

    #[test]
    fn test_parse_rejects_bad_peer() {
        assert!(Cli::try_parse_from(["bastion", "dial", "--peer", "nope"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["bastion", "accept", "--addr", "/ip4/1.2.3.4/tcp/1", "--config", "b.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("b.toml")));
        assert!(matches!(cli.command, Commands::Accept(AcceptArgs { peer: None, .. })));
    }
}

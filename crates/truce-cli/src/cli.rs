//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand, ValueEnum};

use truce_client::{AlertKind, RequestKind, Vote};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Relay WebSocket URL (overrides the configuration file)
    #[arg(short, long)]
    pub relay: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Identity file path (defaults to the platform config directory)
    #[arg(short, long)]
    pub identity_file: Option<String>,

    /// Display name to register with (defaults to the hostname)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stay connected and print incoming requests, votes, and alerts
    Listen {
        /// Automatically answer incoming requests with this vote
        #[arg(long)]
        auto_vote: Option<VoteArg>,
    },
    /// Send a request to a peer and wait for their vote
    Request {
        /// Target peer, by id or display name
        peer: String,
        /// Kind of request to send
        #[arg(short, long, default_value = "surrender")]
        kind: RequestKindArg,
        /// Requested duration in seconds
        #[arg(short, long, default_value_t = 30.0)]
        duration: f64,
        /// Optional title shown to the peer
        #[arg(short, long)]
        title: Option<String>,
        /// Seconds to wait for the vote before giving up
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Send a one-shot alert to a peer and exit
    Alert {
        /// Target peer, by id or display name
        peer: String,
        /// Kind of alert to send
        #[arg(short, long, default_value = "fatigue")]
        kind: AlertKindArg,
    },
    /// List currently connected peers
    Peers,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RequestKindArg {
    Surrender,
    Coffee,
}

impl From<RequestKindArg> for RequestKind {
    fn from(kind: RequestKindArg) -> Self {
        match kind {
            RequestKindArg::Surrender => RequestKind::Surrender,
            RequestKindArg::Coffee => RequestKind::Coffee,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AlertKindArg {
    Fatigue,
    GoodBoy,
}

impl From<AlertKindArg> for AlertKind {
    fn from(kind: AlertKindArg) -> Self {
        match kind {
            AlertKindArg::Fatigue => AlertKind::Fatigue,
            AlertKindArg::GoodBoy => AlertKind::GoodBoy,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VoteArg {
    Yes,
    No,
}

impl From<VoteArg> for Vote {
    fn from(vote: VoteArg) -> Self {
        match vote {
            VoteArg::Yes => Vote::Yes,
            VoteArg::No => Vote::No,
        }
    }
}

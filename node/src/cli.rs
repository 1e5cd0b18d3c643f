//! # CLI Interface
//!
//! Defines the command-line argument structure for `lendpact-node` using
//! `clap` derive. Supports four subcommands: `run`, `keygen`, `sign`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lendpact_contracts::{CancelPolicy, LoanId};
use lendpact_protocol::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};
use lendpact_protocol::identity::Address;

/// LendPact devnet node.
///
/// Serves the loan escrow over HTTP against an in-memory ledger, exposes
/// Prometheus metrics, and produces the signatures sponsors submit on a
/// receiver's behalf.
#[derive(Parser, Debug)]
#[command(
    name = "lendpact-node",
    about = "LendPact loan escrow devnet node",
    version,
    propagate_version = true
)]
pub struct LendPactNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the devnet node.
    Run(RunArgs),
    /// Generate a fresh secp256k1 key and print its address.
    Keygen(KeygenArgs),
    /// Sign a sponsorship digest with a receiver's key.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Address to bind both listeners on.
    #[arg(long, env = "LENDPACT_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port for the HTTP API.
    #[arg(long, env = "LENDPACT_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "LENDPACT_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Identity allowed to cancel requests under the `administrator`
    /// policy. A random one is generated when omitted.
    #[arg(long, env = "LENDPACT_ADMINISTRATOR")]
    pub administrator: Option<Address>,

    /// Who may cancel a request: `administrator` or `open`.
    #[arg(long, env = "LENDPACT_CANCEL_POLICY", default_value = "administrator")]
    pub cancel_policy: CancelPolicy,

    /// Mine one block every N milliseconds. 0 leaves the height to
    /// `POST /blocks`.
    #[arg(long, env = "LENDPACT_BLOCK_INTERVAL_MS", default_value_t = 0)]
    pub block_interval_ms: u64,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "LENDPACT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Write the hex secret key to this file (mode 0600) instead of stdout.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Hex-encoded secp256k1 secret key of the receiver.
    ///
    /// **Devnet only.** Prefer the environment variable over the flag so
    /// the key does not end up in shell history.
    #[arg(long, env = "LENDPACT_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Emit `v` as 0/1 instead of 27/28.
    #[arg(long)]
    pub low_v: bool,

    #[command(subcommand)]
    pub action: SignAction,
}

/// The sponsorship digest to sign.
#[derive(Subcommand, Debug)]
pub enum SignAction {
    /// Consent to a request for `amount` until block `ttl`.
    Request {
        #[arg(long)]
        amount: u128,
        #[arg(long)]
        ttl: u64,
    },
    /// Consent to a sponsor taking loan `id`.
    Take {
        #[arg(long)]
        id: LoanId,
    },
    /// Consent to a sponsor refusing loan `id`.
    Refuse {
        #[arg(long)]
        id: LoanId,
    },
}

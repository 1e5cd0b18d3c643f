// Copyright (c) 2026 LendPact Contributors. MIT License.
// See LICENSE for details.

//! # LendPact Devnet Node
//!
//! Entry point for the `lendpact-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and serves the escrow HTTP API.
//!
//! The binary supports four subcommands:
//!
//! - `run`: start the devnet node
//! - `keygen`: generate a secp256k1 key and print its address
//! - `sign`: sign a sponsorship digest for a receiver
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use lendpact_contracts::authorization::{refuse_digest, request_digest, take_digest};
use lendpact_contracts::{EscrowConfig, LoanEscrow};
use lendpact_protocol::crypto::LendKeypair;
use lendpact_protocol::storage::Ledger;

use cli::{Commands, LendPactNodeCli, SignAction};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = LendPactNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Sign(args) => sign(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the devnet node: API server, metrics endpoint and, optionally, a
/// block ticker.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    let administrator = match args.administrator {
        Some(address) => address,
        None => {
            let generated = LendKeypair::generate().address();
            tracing::warn!(
                administrator = %generated,
                "no administrator configured, generated one"
            );
            generated
        }
    };

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        administrator = %administrator,
        cancel_policy = %args.cancel_policy,
        "starting lendpact-node"
    );

    // --- Escrow over the devnet ledger ---
    let config = EscrowConfig::new(administrator).with_cancel_policy(args.cancel_policy);
    let escrow = LoanEscrow::with_ledger(config, Ledger::new());

    // --- Metrics ---
    let node_metrics =
        Arc::new(NodeMetrics::new().context("failed to create prometheus registry")?);

    // --- Application state ---
    let app_state = api::AppState::new(
        format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            lendpact_protocol::config::PROTOCOL_VERSION,
        ),
        escrow,
        Arc::clone(&node_metrics),
    );

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("{}:{}", args.bind, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Block ticker ---
    // With an interval set, the height moves on its own; otherwise only
    // `POST /blocks` advances it.
    let block_loop = (args.block_interval_ms > 0).then(|| {
        let escrow = Arc::clone(&app_state.escrow);
        let metrics_ref = Arc::clone(&node_metrics);
        let interval_ms = args.block_interval_ms;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            loop {
                interval.tick().await;
                let mut guard = escrow.write().await;
                let height = guard.gateway_mut().advance(1);
                metrics_ref.observe_escrow(guard.gateway().custody(), height);
                tracing::trace!(height, "block produced");
            }
        })
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    if let Some(handle) = block_loop {
        handle.abort();
    }

    let escrow = app_state.escrow.read().await;
    match escrow.check_solvency() {
        Ok(custody) => tracing::info!(custody, loans = escrow.loans().len(), "escrow solvent"),
        Err(e) => tracing::error!(error = %e, "escrow insolvent at shutdown"),
    }
    tracing::info!("lendpact-node stopped");
    Ok(())
}

/// Generates a secp256k1 keypair and prints its address.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = LendKeypair::generate();
    let secret_hex = hex::encode(keypair.secret_key_bytes());

    println!("Address    : {}", keypair.address());

    match args.out {
        Some(path) => {
            std::fs::write(&path, &secret_hex)
                .with_context(|| format!("failed to write secret key to {}", path.display()))?;

            // Restrict permissions on Unix.
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                    .with_context(|| format!("failed to restrict {}", path.display()))?;
            }
            println!("Secret key : {}", path.display());
        }
        None => println!("Secret key : 0x{}", secret_hex),
    }

    Ok(())
}

/// Signs the digest a sponsor needs for one delegated action and prints the
/// 65-byte signature.
fn sign(args: cli::SignArgs) -> Result<()> {
    let keypair =
        LendKeypair::from_hex(&args.secret_key).context("failed to parse secret key")?;

    let (action, digest) = match &args.action {
        SignAction::Request { amount, ttl } => ("request", request_digest(*amount, *ttl)),
        SignAction::Take { id } => ("take", take_digest(id)),
        SignAction::Refuse { id } => ("refuse", refuse_digest(id)),
    };

    let mut signature = keypair.sign_digest(&digest);
    if args.low_v {
        signature = signature.with_low_v();
    }

    println!("Action    : {}", action);
    println!("Receiver  : {}", keypair.address());
    println!("Digest    : 0x{}", hex::encode(digest));
    println!("Signature : {}", signature);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("lendpact-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol      {}", lendpact_protocol::config::PROTOCOL_VERSION);
    println!(
        "signing       {}",
        lendpact_protocol::config::SIGNING_ALGORITHM
    );
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! planstore server
//!
//! Conditional-write REST API for hierarchical plan documents.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command};
use planstore::api::auth::JwtVerifier;
use planstore::api::start_server;
use planstore::core::config::parse_storage_type;
use planstore::core::logging::init_tracing;
use planstore::core::{AppState, Config};
use planstore::engine::spawn_orphan_collector;
use planstore::{Error, Result};
use tokio::signal;
use tracing::{info, warn};

fn main() -> Result<()> {
    let matches = Command::new("planstore")
        .version(planstore::VERSION)
        .about("Conditional-write plan document service.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("http-addr")
                .long("http-addr")
                .value_name("ADDR")
                .help("HTTP server bind address"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory path"),
        )
        .arg(
            Arg::new("storage-type")
                .long("storage-type")
                .value_name("TYPE")
                .help("Storage backend type (memory, disk)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .subcommand(
            Command::new("issue-token")
                .about("Sign a bearer token with the configured auth secret and print it")
                .arg(
                    Arg::new("subject")
                        .long("subject")
                        .value_name("SUB")
                        .required(true)
                        .help("Subject claim of the token"),
                )
                .arg(
                    Arg::new("ttl")
                        .long("ttl")
                        .value_name("SECONDS")
                        .default_value("3600")
                        .value_parser(clap::value_parser!(u64))
                        .help("Token lifetime in seconds"),
                ),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = Config::load(config_path.as_deref())?;
    apply_cli_overrides(&mut config, &matches)?;
    config.validate()?;

    if let Some(("issue-token", sub)) = matches.subcommand() {
        return issue_token(&config, sub);
    }

    init_tracing(&config.logging)?;
    info!("Starting planstore v{}", planstore::VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.optimal_worker_threads())
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(addr) = matches.get_one::<String>("http-addr") {
        config.server.http_addr = addr
            .parse()
            .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
    }

    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.storage.data_dir = data_dir.into();
    }

    if let Some(storage_type) = matches.get_one::<String>("storage-type") {
        config.storage.storage_type = parse_storage_type(storage_type)?;
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    Ok(())
}

/// Print a signed token for the `issue-token` subcommand
fn issue_token(config: &Config, matches: &ArgMatches) -> Result<()> {
    let subject = matches
        .get_one::<String>("subject")
        .ok_or_else(|| Error::config("--subject is required"))?;
    let ttl = matches.get_one::<u64>("ttl").copied().unwrap_or(3600);

    let token = JwtVerifier::from_config(&config.auth)?.issue(subject, ttl)?;
    println!("{}", token);
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let gc_interval = config.gc.interval_secs;
    let state = Arc::new(AppState::from_config(config)?);
    info!(
        backend = state.engine.store().backend_name(),
        auth = state.verifier.is_some(),
        "Services initialized"
    );

    let collector = if gc_interval > 0 {
        info!(interval_secs = gc_interval, "Scheduling orphan collection");
        Some(spawn_orphan_collector(
            state.engine.clone(),
            Duration::from_secs(gc_interval),
        ))
    } else {
        None
    };

    start_server(state, shutdown_signal()).await?;

    if let Some(handle) = collector {
        handle.abort();
    }
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
    warn!("Initiating graceful shutdown");
}

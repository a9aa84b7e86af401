//! ocserv-exporter - version 0.1.0
//!
//! Prometheus exporter for the OpenConnect VPN server with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, level_filters::LevelFilter};

use ocserv_exporter::cache_updater::{spawn_refresh_loop, update_cache};
use ocserv_exporter::cli::{Args, Commands, LogLevel};
use ocserv_exporter::commands::{command_check, command_config, command_test};
use ocserv_exporter::config::{resolve_config, show_config, validate_effective_config, Config};
use ocserv_exporter::handlers::router;
use ocserv_exporter::occtl::Client;
use ocserv_exporter::startup_checks;
use ocserv_exporter::state::AppState;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(level: LogLevel) {
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return Ok(command_config(output.clone(), format.clone(), *commented)?);
        }

        let config = load_validated_config(&args)?;
        setup_logging(config.log_level()?);

        return match command {
            Commands::Check => Ok(command_check(&config).await?),
            Commands::Test {
                iterations,
                verbose,
            } => Ok(command_test(*iterations, *verbose, &config).await?),
            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;
    setup_logging(config.log_level()?);

    info!("Starting ocserv-exporter");

    let interval = config.refresh_interval()?;
    let timeout = config.command_timeout()?;

    // occtl is the only data source; without it the exporter is useless.
    let commander = match startup_checks::validate_requirements(config.occtl_path(), timeout) {
        Ok(commander) => commander,
        Err(e) => {
            error!("❌ Failed to initialize occtl client: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(Client::new(Arc::new(commander)))?;
    info!("Prometheus registry initialized");

    // Run once to ensure we have data before starting the server
    info!("Performing initial refresh");
    update_cache(&state).await;

    let refresh_task = spawn_refresh_loop(state.clone(), interval);
    info!("Background refresh scheduled every {:?}", interval);

    let bind_addr = config.bind_address()?;
    let app = router(state.clone());

    if config.enable_tls.unwrap_or(false) {
        // Paths were checked by validate_effective_config().
        let (cert_path, key_path) = match (&config.tls_cert_path, &config.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => return Err("TLS enabled without certificate and key paths".into()),
        };

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        let addr: SocketAddr = tokio::net::lookup_host(&bind_addr)
            .await?
            .next()
            .ok_or_else(|| format!("Listen address {} did not resolve", bind_addr))?;

        info!("ocserv-exporter listening on https://{}", addr);

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind {}: {}", bind_addr, e);
                return Err(e.into());
            }
        };
        info!("ocserv-exporter listening on http://{}", bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("Server error: {}", e);
                e
            })?;
    }

    refresh_task.abort();
    info!(
        "ocserv-exporter stopped gracefully after {:?}",
        state.start_time.elapsed()
    );
    Ok(())
}

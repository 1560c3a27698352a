//! StockCoach CLI and REST API entry point.
//!
//! Binary name: `coach`
//!
//! Parses CLI arguments, initializes storage and clients, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use std::net::SocketAddr;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;
use stockcoach_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        json: cli.log_json,
        enable_otel: cli.otel,
        ..TracingOptions::from_verbosity(cli.verbose)
    };
    if let Err(e) = init_tracing(&options) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    let user = cli.identity.current_user(&state);

    match cli.command {
        Commands::Send { message, image } => {
            cli::chat::send(&state, user, &message.join(" "), image.as_deref(), cli.json).await?;
        }

        Commands::Show { date } => {
            cli::chat::show(&state, user, date.as_deref(), cli.json).await?;
        }

        Commands::History => {
            cli::history::list_history(&state, user, cli.json).await?;
        }

        Commands::NewSession => {
            cli::chat::new_session(&state, user, cli.json).await?;
        }

        Commands::Transcribe { file } => {
            cli::transcribe::transcribe_file(&state, &file, cli.json).await?;
        }

        Commands::Config => {
            cli::config::show_config(&state, cli.json)?;
        }

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} StockCoach API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            if !state.webhook_configured() {
                println!(
                    "  {}",
                    console::style("No webhook configured, replies are canned").yellow()
                );
            }
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);

            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;

            println!("\n  Server stopped.");
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

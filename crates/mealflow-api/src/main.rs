//! mealflow CLI and HTTP/SSE API entry point.
//!
//! Parses CLI arguments, loads configuration, wires the session manager, then
//! dispatches to the appropriate command handler or starts the API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, SessionsCommand};
use mealflow_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need logging or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "mealflow", &mut std::io::stdout());
        return Ok(());
    }

    let serving = matches!(cli.command, Commands::Serve { .. });
    let options = TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.log_json,
        otel: cli.otel,
        default_directive: if serving { "info" } else { "warn" }.to_string(),
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = mealflow_infra::config::resolve_data_dir();
    let mut config = mealflow_infra::config::load_config(&data_dir).await?;

    if let Commands::Serve { port, host } = &cli.command {
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(host) = host {
            config.server.host = host.clone();
        }
    }

    let state = AppState::init(config, data_dir).await?;

    match cli.command {
        Commands::Serve { .. } => {
            state.prepare_for_serving().await?;

            let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(%addr, backend = state.backend(), "server listening");

            if !cli.quiet {
                println!(
                    "  {} mealflow API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {}",
                    console::style(format!("Checkpoints: {}. Press Ctrl+C to stop", state.backend())).dim()
                );
            }

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Plan(args) => {
            cli::plan::run_plan(&state, args, cli.json).await?;
        }

        Commands::Sessions { action } => match action {
            SessionsCommand::List { status, limit } => {
                cli::sessions::list_sessions(&state, status, limit, cli.json).await?;
            }
            SessionsCommand::Show { id } => {
                cli::sessions::show_session(&state, &id, cli.json).await?;
            }
            SessionsCommand::Delete { id, force } => {
                cli::sessions::delete_session(&state, &id, force, cli.json).await?;
            }
            SessionsCommand::Purge { older_than_days } => {
                cli::sessions::purge_sessions(&state, older_than_days, cli.json).await?;
            }
        },

        Commands::Completions { .. } => unreachable!("handled before app state"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use embed_store::cli::commands::{handle_config, handle_run};
use embed_store::cli::output::get_formatter;
use embed_store::cli::{Cli, Commands};
use embed_store::error::AppError;
use embed_store::models::OutputFormat;

const INTERRUPTED: u8 = 130;

fn init_tracing(verbose: bool) {
    let default = if verbose { "embed_store=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = cli.format.unwrap_or_default();

    tokio::select! {
        result = run_command(cli, format) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                // AppError messages already embed their cause.
                let (code, text) = match err.downcast_ref::<AppError>() {
                    Some(app) => (app.exit_code(), app.to_string()),
                    None => (1, format!("{err:#}")),
                };
                let message = get_formatter(format).format_error(&text);
                eprintln!("{}", message.trim_end());
                ExitCode::from(code)
            }
        },
        _ = shutdown_signal() => {
            eprintln!("\nInterrupted");
            ExitCode::from(INTERRUPTED)
        }
    }
}

async fn run_command(cli: Cli, format: OutputFormat) -> Result<()> {
    match cli.command {
        Some(Commands::Config(cmd)) => handle_config(cmd, cli.config_file, format).await,
        None => handle_run(cli.run, cli.config_file, format).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

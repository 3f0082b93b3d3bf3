mod cli;
mod dispatcher;
mod logging;
mod shell;

use crate::cli::Cli;
use crate::dispatcher::Dispatcher;
use clap::Parser;
use opc_ua_client::{OpcUaClient, OpcUaProvider};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match logging::init(&cli.log_dir, &cli.log_level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {e:#}");
            None
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting opcli");

    let client = match OpcUaClient::with_options(cli.client_options()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = ?e, "Failed to initialize OPC UA client");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let provider: Arc<dyn OpcUaProvider> = Arc::new(client);
    let mut dispatcher = Dispatcher::new(Arc::clone(&provider), io::stdout(), cli.timeout());

    let mut interrupts = match shell::spawn_interrupt_listener() {
        Ok(rx) => rx,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("opcli - OPC UA Interactive Client");
    println!("Type 'help' for available commands");
    println!();

    let startup_args = cli.startup_args();
    let startup = tokio::select! {
        result = dispatcher.parse_startup_arguments(&startup_args) => Some(result),
        Some(()) = interrupts.recv() => None,
    };

    let code = match startup {
        Some(Ok(())) => {
            let mut lines = shell::spawn_stdin_reader();
            match shell::run(&mut dispatcher, &mut lines, &mut interrupts).await {
                Ok(exit) => {
                    tracing::info!(?exit, "Shell finished");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Shell terminated abnormally");
                    eprintln!("Error: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "Startup connect failed");
            eprintln!("Failed to connect: {e}");
            ExitCode::FAILURE
        }
        None => {
            tracing::info!("Interrupted during startup");
            ExitCode::FAILURE
        }
    };

    // Every exit path, including startup failure and signals, ends here.
    // Dropping the client afterwards joins the worker, so an abandoned
    // connect is rolled back before the process exits.
    match tokio::time::timeout(cli.timeout(), provider.disconnect()).await {
        Ok(Ok(true)) => tracing::info!("Session closed on exit"),
        Ok(Ok(false)) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Disconnect on exit failed"),
        Err(_) => tracing::warn!("Disconnect on exit timed out"),
    }

    tracing::info!("opcli stopped");
    code
}

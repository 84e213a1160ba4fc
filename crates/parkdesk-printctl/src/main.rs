// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printctl: check the receipt printer from an attendant workstation.
//
//   printctl [test]   print a test receipt and wait for it to come out
//   printctl status   connect and print the driver status as JSON
//
// Configuration comes from the JSON file given by --config / PARKDESK_CONFIG
// (if set) plus the PARKDESK_PRINTER_* environment variables.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use parkdesk_core::config::PrinterConfig;
use parkdesk_core::error::Result;
use parkdesk_core::types::DriverEvent;
use parkdesk_print::PrinterDriver;

#[derive(Parser, Debug)]
#[command(author, version, about = "Check the receipt printer from an attendant workstation")]
struct Cli {
    /// JSON printer configuration; PARKDESK_PRINTER_* variables override it.
    #[arg(long, short, env = "PARKDESK_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds `test` waits for the receipt to print.
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    wait: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Print a test receipt and wait for it (default).
    Test,
    /// Connect and print the driver status as JSON.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "printctl failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PrinterConfig> {
    match path {
        Some(path) => PrinterConfig::load(path),
        None => PrinterConfig::from_env(),
    }
}

async fn run(cli: &Cli) -> Result<bool> {
    let command = cli.command.unwrap_or(Command::Test);
    let wait = Duration::from_secs(cli.wait);
    let config = load_config(cli.config.as_ref())?;
    tracing::info!(endpoint = %config.endpoint(), ?command, "printctl starting");

    let driver = PrinterDriver::new(config)?;
    let mut events = driver.subscribe();
    let connected = driver.connect().await;

    let ok = match command {
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&driver.status())?);
            connected
        }
        Command::Test if !connected => {
            tracing::warn!("printer not reachable, test receipt not printed");
            false
        }
        Command::Test => {
            driver.print_test_receipt();
            let outcome = tokio::time::timeout(wait, async {
                loop {
                    match events.recv().await {
                        Ok(DriverEvent::JobCompleted(job)) => {
                            tracing::info!(job_id = %job.id, "test receipt printed");
                            return true;
                        }
                        Ok(DriverEvent::JobFailed(job)) => {
                            tracing::error!(job_id = %job.id, error = ?job.last_error, "test receipt failed");
                            return false;
                        }
                        Ok(_) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => return false,
                    }
                }
            })
            .await;
            outcome.unwrap_or_else(|_| {
                tracing::warn!(waited_secs = wait.as_secs(), "timed out waiting for the printer");
                false
            })
        }
    };

    driver.destroy().await;
    Ok(ok)
}

//! `fencewatch`: geofence enforcement for RCON-managed game servers

use clap::Parser;

use fencewatch::cli::args::Cli;
use fencewatch::cli::commands;
use fencewatch::error::ExitCode;
use fencewatch::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Human
        };
        init_logging(format, cli.verbose);
    }

    match commands::dispatch(cli).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

use clap::Parser;
use sand_lib::cli::{self, Cli, CliCommand};
use sand_lib::timers::config::DaemonConfig;
use sand_lib::{daemon, logging};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Daemon => {
            logging::init("info");
            let result = DaemonConfig::from_env()
                .map_err(anyhow::Error::from)
                .and_then(daemon::main);
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Daemon failed: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
        command => {
            logging::init("warn");
            match cli::run(command) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

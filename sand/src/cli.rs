// Command line interface: argument parsing and client-side output
// The daemon subcommand is dispatched by main; everything else is a single request/reply

use crate::client::DaemonConnection;
use crate::duration::{parse_duration_component, sum_durations, DurationExt};
use crate::timers::config::ClientConfig;
use crate::timers::protocol::{Command, ErrorReason, Payload, Response, TimerInfo, TimerState};
use crate::timers::timer::TimerId;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "sand",
    about = "Command line countdown timers that don't take up a terminal.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Duration components, summed: `5m`, `1h 30m`, `90s`, `500ms`
    #[arg(value_name = "DURATION", value_parser = parse_duration_component, num_args = 1.., required = true)]
    pub durations: Vec<Duration>,
}

#[derive(Debug, Args)]
pub struct TimerArgs {
    /// Timer ID, as shown by `sand ls` (`3` or `#3`)
    #[arg(value_name = "TIMER_ID", value_parser = parse_timer_id)]
    pub timer_id: TimerId,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Start a new timer for the given duration
    Start(StartArgs),
    /// List active timers
    #[command(alias = "list")]
    Ls,
    /// Pause the timer with the given ID
    Pause(TimerArgs),
    /// Resume the timer with the given ID
    Resume(TimerArgs),
    /// Cancel the timer with the given ID
    Cancel(TimerArgs),
    /// Print the version
    Version,
    /// Run the daemon on the socket passed in SAND_SOCKFD
    Daemon,
}

/// Accepts `3` or `#3`
pub fn parse_timer_id(s: &str) -> Result<TimerId, String> {
    let digits = s.trim().strip_prefix('#').unwrap_or(s.trim());
    digits
        .parse::<u64>()
        .map(TimerId::new)
        .map_err(|_| format!("invalid timer id {:?}", s))
}

/// Build the protocol request for a client subcommand. `None` for commands
/// that never talk to the daemon.
pub fn request_for(command: &CliCommand) -> Result<Option<Command>> {
    let request = match command {
        CliCommand::Start(args) => {
            let total = sum_durations(&args.durations).context("Invalid duration")?;
            Command::AddTimer {
                duration: total.into(),
            }
        }
        CliCommand::Ls => Command::List,
        CliCommand::Pause(args) => Command::Pause(args.timer_id),
        CliCommand::Resume(args) => Command::Resume(args.timer_id),
        CliCommand::Cancel(args) => Command::Cancel(args.timer_id),
        CliCommand::Version | CliCommand::Daemon => return Ok(None),
    };
    Ok(Some(request))
}

/// What the client prints for a reply: `Ok` goes to stdout, `Err` to stderr
/// with a failing exit status.
pub fn render_reply(request: &Command, response: Response) -> Result<Result<String, String>> {
    let payload = match response {
        Response::Ok(payload) => payload,
        Response::Err(reason) => return Ok(Err(render_error(request, reason))),
    };

    let text = match (request, payload) {
        (Command::List, Payload::Timers { timers }) => render_timer_list(&timers),
        (Command::AddTimer { duration }, Payload::CreatedId { created_id }) => format!(
            "Timer {} created for {}.",
            created_id,
            Duration::from(*duration).format_colon_separated()
        ),
        (Command::Pause(id), Payload::Empty {}) => format!("Paused timer {}.", id),
        (Command::Resume(id), Payload::Empty {}) => format!("Resumed timer {}.", id),
        (Command::Cancel(id), Payload::Empty {}) => format!("Cancelled timer {}.", id),
        (request, payload) => bail!(
            "Unexpected reply from daemon to {:?}: {:?}",
            request,
            payload
        ),
    };
    Ok(Ok(text))
}

fn render_error(request: &Command, reason: ErrorReason) -> String {
    match (request, reason) {
        (Command::Pause(id) | Command::Resume(id) | Command::Cancel(id), ErrorReason::NotFound) => {
            format!("Timer {} not found.", id)
        }
        (Command::Pause(id), ErrorReason::InvalidTransition) => {
            format!("Timer {} is already paused.", id)
        }
        (Command::Resume(id), ErrorReason::InvalidTransition) => {
            format!("Timer {} is already running.", id)
        }
        (_, reason) => format!("Daemon error: {}.", reason),
    }
}

/// One line per timer in the order given (the daemon lists newest first)
pub fn render_timer_list(timers: &[TimerInfo]) -> String {
    if timers.is_empty() {
        return "No running timers.".to_string();
    }

    timers
        .iter()
        .map(|timer| {
            let phase = match timer.state {
                TimerState::Running { .. } => "Running",
                TimerState::Paused { .. } => "Paused",
            };
            format!(
                "{}  {}  {}",
                timer.id,
                timer.remaining().format_colon_separated(),
                phase
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run a client subcommand to completion
pub fn run(command: CliCommand) -> Result<ExitCode> {
    let Some(request) = request_for(&command)? else {
        if let CliCommand::Version = command {
            println!("sand v{}", crate::VERSION);
        }
        return Ok(ExitCode::SUCCESS);
    };

    let config = ClientConfig::from_env()?;
    let mut conn = DaemonConnection::connect(&config)?;
    let response = conn.request(&request)?;

    match render_reply(&request, response)? {
        Ok(text) => {
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
        Err(message) => {
            eprintln!("{}", message);
            Ok(ExitCode::FAILURE)
        }
    }
}

// Timer daemon library (shared between the daemon and the CLI client)

// Timer registry, wire protocol and configuration
pub mod timers;

// Daemon: channel adoption, accept loop and per-client sessions
pub mod daemon;

// Client side: socket connection and CLI
pub mod cli;
pub mod client;

pub mod duration;
pub mod logging;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Timer domain shared between the daemon and the CLI client
// Registry and clock live on the daemon side; protocol and config are used by both

pub mod clock;
pub mod config;
pub mod notify;
pub mod protocol;
pub mod registry;
pub mod timer;

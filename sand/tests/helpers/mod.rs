pub mod daemon_guard;

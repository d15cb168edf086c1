// Environment configuration for the daemon and the client
// The daemon only learns which inherited descriptor to listen on; the client needs a socket path

use std::os::fd::RawFd;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming the inherited listening descriptor
pub const SOCKFD_ENV: &str = "SAND_SOCKFD";

/// Environment variable overriding the client's socket path
pub const SOCK_PATH_ENV: &str = "SAND_SOCK_PATH";

/// First descriptor passed by systemd socket activation
pub const SYSTEMD_SOCKFD: RawFd = 3;

/// Socket file name inside the runtime directory
pub const SOCKET_FILENAME: &str = "sand.sock";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SAND_SOCKFD is set to {value:?}, which is not a valid file descriptor")]
    InvalidSockFd { value: String },
    #[error("SAND_SOCK_PATH is not set and no runtime directory is available")]
    NoSocketPath,
}

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Already-listening socket inherited from the launcher
    pub listen_fd: RawFd,
}

impl DaemonConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::var(SOCKFD_ENV).ok().as_deref())
    }

    /// Build configuration from the raw `SAND_SOCKFD` value
    pub fn from_vars(sockfd: Option<&str>) -> Result<Self, ConfigError> {
        let listen_fd = match sockfd {
            None => {
                tracing::info!("{} not found, falling back on fd {}", SOCKFD_ENV, SYSTEMD_SOCKFD);
                SYSTEMD_SOCKFD
            }
            Some(raw) => raw
                .trim()
                .parse::<RawFd>()
                .ok()
                .filter(|fd| *fd >= 0)
                .ok_or_else(|| ConfigError::InvalidSockFd {
                    value: raw.to_string(),
                })?,
        };
        Ok(Self { listen_fd })
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Path of the daemon's socket
    pub socket_path: PathBuf,
}

impl ClientConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var_os(SOCK_PATH_ENV).map(PathBuf::from),
            dirs::runtime_dir(),
        )
    }

    /// `SAND_SOCK_PATH` wins; otherwise `<runtime_dir>/sand.sock`
    pub fn from_vars(
        sock_path: Option<PathBuf>,
        runtime_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let socket_path = sock_path
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| runtime_dir.map(|dir| dir.join(SOCKET_FILENAME)))
            .ok_or(ConfigError::NoSocketPath)?;
        Ok(Self { socket_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_config_reads_sockfd() {
        let config = DaemonConfig::from_vars(Some("7")).unwrap();
        assert_eq!(config.listen_fd, 7);

        let config = DaemonConfig::from_vars(Some(" 12\n")).unwrap();
        assert_eq!(config.listen_fd, 12);
    }

    #[test]
    fn test_daemon_config_falls_back_to_systemd_fd() {
        let config = DaemonConfig::from_vars(None).unwrap();
        assert_eq!(config.listen_fd, SYSTEMD_SOCKFD);
    }

    #[test]
    fn test_daemon_config_rejects_garbage() {
        for value in ["", "abc", "-1", "99999999999999"] {
            assert_eq!(
                DaemonConfig::from_vars(Some(value)),
                Err(ConfigError::InvalidSockFd {
                    value: value.to_string()
                }),
                "value {:?} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_client_config_prefers_explicit_path() {
        let config = ClientConfig::from_vars(
            Some(PathBuf::from("/tmp/dev.sock")),
            Some(PathBuf::from("/run/user/1000")),
        )
        .unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/dev.sock"));
    }

    #[test]
    fn test_client_config_uses_runtime_dir() {
        let config = ClientConfig::from_vars(None, Some(PathBuf::from("/run/user/1000"))).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/run/user/1000/sand.sock"));

        let config =
            ClientConfig::from_vars(Some(PathBuf::new()), Some(PathBuf::from("/run/user/1000")))
                .unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/run/user/1000/sand.sock"));
    }

    #[test]
    fn test_client_config_without_any_path() {
        assert_eq!(
            ClientConfig::from_vars(None, None),
            Err(ConfigError::NoSocketPath)
        );
    }
}

use std::fmt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const INITIAL_DELAY_MS: u64 = 10;
const MAX_DELAY_MS: u64 = 200;

/// How the listening socket is handed to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Descriptor number passed in SAND_SOCKFD
    SockFd,
    /// Socket placed on descriptor 3 with SAND_SOCKFD unset
    SystemdFd,
}

/// RAII wrapper that ensures the daemon process is cleaned up.
///
/// Binds the socket itself and passes the listening descriptor to `sand daemon`,
/// the same way the launcher does. The socket is accepting from the moment
/// `start` returns; connections made before the daemon polls simply queue.
pub struct DaemonGuard {
    child: Child,
    socket_path: PathBuf,
    _dir: TempDir,
}

impl DaemonGuard {
    pub fn start() -> Result<Self, DaemonError> {
        Self::start_with(Handoff::SockFd)
    }

    pub fn start_with(handoff: Handoff) -> Result<Self, DaemonError> {
        let dir = TempDir::new().map_err(DaemonError::Setup)?;
        let socket_path = dir.path().join("sand.sock");
        let listener = UnixListener::bind(&socket_path).map_err(DaemonError::Setup)?;
        let fd = listener.as_raw_fd();

        let mut command = daemon_command();
        match handoff {
            Handoff::SockFd => {
                command.env("SAND_SOCKFD", fd.to_string());
                inherit_fd(&mut command, fd, None);
            }
            Handoff::SystemdFd => {
                command.env_remove("SAND_SOCKFD");
                inherit_fd(&mut command, fd, Some(3));
            }
        }
        let child = command.spawn().map_err(DaemonError::SpawnFailed)?;

        // The child owns the socket now; our copy would keep it accepting after the daemon exits
        drop(listener);

        Ok(Self {
            child,
            socket_path,
            _dir: dir,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn connect(&self) -> UnixStream {
        let stream = UnixStream::connect(&self.socket_path).expect("connect to daemon");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        stream
    }

    /// A `sand` client invocation pointed at this daemon
    pub fn client(&self) -> Command {
        let mut command = Command::new(sand_binary());
        command.env("SAND_SOCK_PATH", &self.socket_path);
        command
    }

    pub fn signal(&self, signal: libc::c_int) {
        unsafe {
            libc::kill(self.pid() as libc::pid_t, signal);
        }
    }

    /// Poll for exit with backoff; `None` if still running after `timeout`
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let start = Instant::now();
        let mut delay = Duration::from_millis(INITIAL_DELAY_MS);

        loop {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Some(status);
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return None;
            }
            thread::sleep(delay.min(remaining));
            delay = (delay * 2).min(Duration::from_millis(MAX_DELAY_MS));
        }
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        if let Err(err) = self.child.kill() {
            eprintln!("Failed to terminate sand daemon pid {}: {}", self.child.id(), err);
            return;
        }

        let _ = self.child.wait();
    }
}

pub fn sand_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sand"))
}

/// `sand daemon` with output captured and a quiet log filter
pub fn daemon_command() -> Command {
    let mut command = Command::new(sand_binary());
    command
        .arg("daemon")
        .env("SAND_LOG", "warn")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    command
}

/// Keep `fd` open across exec, optionally moving it to `target` in the child
pub fn inherit_fd(command: &mut Command, fd: RawFd, target: Option<RawFd>) {
    unsafe {
        command.pre_exec(move || {
            let rc = match target {
                // dup2 leaves FD_CLOEXEC clear on the new descriptor
                Some(target) if target != fd => libc::dup2(fd, target),
                _ => libc::fcntl(fd, libc::F_SETFD, 0),
            };
            if rc == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Wait for a process to exit, used by tests to ensure no orphans remain.
pub fn wait_for_process_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    let mut delay = Duration::from_millis(INITIAL_DELAY_MS);

    while process_is_running(pid) && start.elapsed() < timeout {
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(delay.min(remaining));
        delay = (delay * 2).min(Duration::from_millis(MAX_DELAY_MS));
    }

    !process_is_running(pid)
}

fn process_is_running(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Errors that can occur when starting the daemon for tests.
#[derive(Debug)]
pub enum DaemonError {
    Setup(std::io::Error),
    SpawnFailed(std::io::Error),
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(err) => write!(f, "failed to bind test socket: {}", err),
            Self::SpawnFailed(err) => write!(f, "failed to spawn daemon: {}", err),
        }
    }
}

impl std::error::Error for DaemonError {}

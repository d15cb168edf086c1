// Adoption of the listening socket inherited from the launcher
// The daemon never binds, creates or unlinks the socket path itself

use std::io;
use std::os::fd::{FromRawFd, RawFd};
use thiserror::Error;
use tokio::net::UnixListener;

#[derive(Debug, Error)]
pub enum ChannelAdoptionError {
    #[error("file descriptor {fd} is not open")]
    NotOpen {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
    #[error("file descriptor {fd} is not a socket")]
    NotSocket {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
    #[error("socket on file descriptor {fd} is not listening")]
    NotListening { fd: RawFd },
    #[error("socket on file descriptor {fd} is not a Unix domain socket")]
    NotUnixSocket {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare file descriptor {fd} for accepting")]
    Setup {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
}

/// Take over an already-bound, already-listening Unix socket.
///
/// The descriptor is only owned by the returned listener (and closed on
/// failure) once it has been confirmed to be a listening socket; for
/// `NotOpen`, `NotSocket` and `NotListening` the caller still owns it.
///
/// Must be called from within a tokio runtime.
pub fn adopt_listener(fd: RawFd) -> Result<UnixListener, ChannelAdoptionError> {
    // SAFETY: fcntl/getsockopt only inspect the descriptor table entry
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(ChannelAdoptionError::NotOpen {
            fd,
            source: io::Error::last_os_error(),
        });
    }

    let mut accepting: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ACCEPTCONN,
            &mut accepting as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if rc == -1 {
        return Err(ChannelAdoptionError::NotSocket {
            fd,
            source: io::Error::last_os_error(),
        });
    }
    if accepting == 0 {
        return Err(ChannelAdoptionError::NotListening { fd });
    }

    // The launcher cleared close-on-exec so we could inherit it; don't leak it further
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(ChannelAdoptionError::Setup {
            fd,
            source: io::Error::last_os_error(),
        });
    }

    // SAFETY: fd is open, is a listening socket, and nothing else in this process owns it
    let std_listener = unsafe { std::os::unix::net::UnixListener::from_raw_fd(fd) };

    let addr = std_listener
        .local_addr()
        .map_err(|source| ChannelAdoptionError::NotUnixSocket { fd, source })?;
    tracing::info!(fd, path = ?addr.as_pathname(), "adopted listening socket");

    std_listener
        .set_nonblocking(true)
        .map_err(|source| ChannelAdoptionError::Setup { fd, source })?;
    UnixListener::from_std(std_listener).map_err(|source| ChannelAdoptionError::Setup { fd, source })
}

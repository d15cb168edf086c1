// Client side of the timer protocol
// Blocking std socket: one request line out, one reply line back

use crate::timers::config::ClientConfig;
use crate::timers::protocol::{deserialize_message, serialize_message, Command, Response};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// How long to wait for a reply before giving up
const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DaemonConnection {
    reader: BufReader<UnixStream>,
    writer: LineWriter<UnixStream>,
}

impl DaemonConnection {
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let stream = UnixStream::connect(&config.socket_path).with_context(|| {
            format!(
                "Failed to connect to sand daemon at {} (is it running?)",
                config.socket_path.display()
            )
        })?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .context("Failed to set read timeout")?;

        let reader = BufReader::new(stream.try_clone().context("Failed to clone socket")?);
        let writer = LineWriter::new(stream);
        Ok(Self { reader, writer })
    }

    /// Send one command and wait for its reply
    pub fn request(&mut self, command: &Command) -> Result<Response> {
        let bytes = serialize_message(command).context("Failed to serialize request")?;
        self.writer
            .write_all(&bytes)
            .context("Failed to send request to daemon")?;
        self.writer.flush().context("Failed to flush request")?;

        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .context("Failed to read reply from daemon")?;
        if n == 0 {
            bail!("Daemon closed the connection without replying");
        }

        tracing::debug!(reply = line.trim_end(), "daemon reply");
        deserialize_message(line.as_bytes()).context("Failed to parse reply from daemon")
    }
}

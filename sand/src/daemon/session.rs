// Per-connection session: read a request, apply it to the registry, write exactly one reply
// A session ends on peer close or I/O error; neither affects other sessions or the registry

use crate::timers::protocol::{
    decode_command, serialize_message, Command, ErrorReason, Frame, MessageBuffer, Response,
    MAX_REQUEST_FRAME_SIZE,
};
use crate::timers::registry::TimerRegistry;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

const READ_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection I/O failed")]
    Io(#[from] io::Error),
    #[error("failed to encode reply")]
    Encode(#[from] serde_json::Error),
    #[error("request frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Apply one decoded command to the registry
pub async fn handle_command(registry: &TimerRegistry, command: Command) -> Response {
    match command {
        Command::List => Response::timers(registry.list().await),
        Command::AddTimer { duration } => {
            let id = registry.add(duration.into()).await;
            debug!(%id, millis = duration.millis, "timer created");
            Response::created(id)
        }
        Command::Pause(id) => registry.pause(id).await.into(),
        Command::Resume(id) => registry.resume(id).await.into(),
        Command::Cancel(id) => registry.cancel(id).await.into(),
    }
}

/// Serve one client connection until it closes
pub async fn serve_connection<S>(registry: &TimerRegistry, mut stream: S) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = MessageBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        while let Some(frame) = buffer.next_frame() {
            let response = match frame {
                Frame::Message(value) => match decode_command(value) {
                    Ok(command) => {
                        debug!(?command, "request");
                        handle_command(registry, command).await
                    }
                    Err(e) => {
                        warn!("Failed to decode request: {}", e);
                        Response::Err(ErrorReason::DecodeError)
                    }
                },
                Frame::Malformed(e) => {
                    warn!("Failed to parse request: {}", e);
                    Response::Err(ErrorReason::DecodeError)
                }
            };
            write_response(&mut stream, &response).await?;
        }

        // Enforce max request frame size (1MB)
        if buffer.len() > MAX_REQUEST_FRAME_SIZE {
            let size = buffer.len();
            write_response(&mut stream, &Response::Err(ErrorReason::FrameTooLarge)).await?;
            return Err(SessionError::FrameTooLarge {
                size,
                max: MAX_REQUEST_FRAME_SIZE,
            });
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if !buffer.is_empty() {
                debug!(
                    bytes = buffer.len(),
                    "client disconnected mid-request, dropping partial input"
                );
            }
            return Ok(());
        }
        buffer.extend(&chunk[..n]);
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = serialize_message(response)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

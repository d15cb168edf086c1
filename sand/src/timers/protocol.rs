// Timer protocol - shared structs for daemon <-> client communication
// One self-delimiting JSON value per request, one newline-terminated JSON reply per request

use crate::timers::timer::{TimerError, TimerId, TimerNotFound, TimerPhase, TimerSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Maximum size of a single request frame (1MB)
pub const MAX_REQUEST_FRAME_SIZE: usize = 1024 * 1024;

/// Longest timer the daemon accepts (100 years)
pub const MAX_TIMER_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Duration on the wire: `{"millis": N}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Millis {
    pub millis: u64,
}

impl From<Duration> for Millis {
    fn from(duration: Duration) -> Self {
        Millis {
            millis: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<Millis> for Duration {
    fn from(millis: Millis) -> Self {
        Duration::from_millis(millis.millis)
    }
}

// ============================================================================
// Client -> Daemon requests
// ============================================================================

/// Request message from a client to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    /// List every live timer, newest first
    List,
    /// Start a new running timer
    AddTimer { duration: Millis },
    /// Pause a running timer
    Pause(TimerId),
    /// Resume a paused timer
    Resume(TimerId),
    /// Remove a timer
    Cancel(TimerId),
}

// ============================================================================
// Daemon -> Client responses
// ============================================================================

/// One entry of a `list` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerInfo {
    pub id: TimerId,
    pub state: TimerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerState {
    /// `due` is the time left until the due instant, clamped at zero
    Running { due: Millis },
    Paused { remaining: Millis },
}

impl From<TimerSnapshot> for TimerInfo {
    fn from(snapshot: TimerSnapshot) -> Self {
        let remaining = snapshot.remaining().into();
        let state = match snapshot.phase() {
            TimerPhase::Running => TimerState::Running { due: remaining },
            TimerPhase::Paused => TimerState::Paused { remaining },
        };
        TimerInfo {
            id: snapshot.id,
            state,
        }
    }
}

impl TimerInfo {
    /// Time left on the timer regardless of state
    pub fn remaining(&self) -> Duration {
        match self.state {
            TimerState::Running { due } => due.into(),
            TimerState::Paused { remaining } => remaining.into(),
        }
    }
}

/// Successful reply payloads. Distinguished by their single field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Timers {
        timers: Vec<TimerInfo>,
    },
    CreatedId {
        #[serde(rename = "createdId")]
        created_id: TimerId,
    },
    /// `{}` for pause, resume and cancel
    Empty {},
}

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorReason {
    /// The referenced timer does not exist
    NotFound,
    /// Pause of a paused timer or resume of a running one
    InvalidTransition,
    /// The request was not valid JSON or not a known command
    DecodeError,
    /// The request exceeded `MAX_REQUEST_FRAME_SIZE`
    FrameTooLarge,
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorReason::NotFound => write!(f, "timer not found"),
            ErrorReason::InvalidTransition => write!(f, "timer is not in a state that allows this"),
            ErrorReason::DecodeError => write!(f, "request could not be decoded"),
            ErrorReason::FrameTooLarge => write!(f, "request too large"),
        }
    }
}

/// Reply message from daemon to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    Ok(Payload),
    Err(ErrorReason),
}

impl Response {
    pub fn timers(snapshots: Vec<TimerSnapshot>) -> Self {
        Response::Ok(Payload::Timers {
            timers: snapshots.into_iter().map(TimerInfo::from).collect(),
        })
    }

    pub fn created(id: TimerId) -> Self {
        Response::Ok(Payload::CreatedId { created_id: id })
    }

    pub fn empty() -> Self {
        Response::Ok(Payload::Empty {})
    }
}

impl From<TimerError> for ErrorReason {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::NotFound(_) => ErrorReason::NotFound,
            TimerError::InvalidTransition { .. } => ErrorReason::InvalidTransition,
        }
    }
}

impl From<Result<(), TimerError>> for Response {
    fn from(result: Result<(), TimerError>) -> Self {
        match result {
            Ok(()) => Response::empty(),
            Err(err) => Response::Err(err.into()),
        }
    }
}

impl From<Result<(), TimerNotFound>> for Response {
    fn from(result: Result<(), TimerNotFound>) -> Self {
        result.map_err(TimerError::from).into()
    }
}

// ============================================================================
// Decoding
// ============================================================================

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unrecognized command: {0}")]
    UnknownCommand(#[source] serde_json::Error),
    #[error("duration of {millis}ms exceeds the maximum of {max}ms")]
    DurationOutOfRange { millis: u64, max: u64 },
}

/// Turn one framed JSON value into a typed command
pub fn decode_command(value: Value) -> Result<Command, DecodeError> {
    let command: Command = serde_json::from_value(value).map_err(DecodeError::UnknownCommand)?;

    if let Command::AddTimer { duration } = &command {
        let max = Millis::from(MAX_TIMER_DURATION).millis;
        if duration.millis > max {
            return Err(DecodeError::DurationOutOfRange {
                millis: duration.millis,
                max,
            });
        }
    }

    Ok(command)
}

// ============================================================================
// Helpers for message framing
// ============================================================================

/// Serialize a message to JSON bytes with newline delimiter
pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(msg)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserialize a message from JSON bytes (strips trailing newline)
pub fn deserialize_message<T: for<'de> Deserialize<'de>>(
    bytes: &[u8],
) -> Result<T, serde_json::Error> {
    let trimmed = if bytes.last() == Some(&b'\n') {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    };
    serde_json::from_slice(trimmed)
}

/// One unit cut from the inbound byte stream
#[derive(Debug)]
pub enum Frame {
    /// A complete JSON value
    Message(Value),
    /// Bytes that can never form a JSON value; they have been discarded
    Malformed(DecodeError),
}

/// Accumulates inbound bytes and cuts them into self-delimited JSON values.
///
/// Values may arrive split across reads or several per read, with or without
/// whitespace between them.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    buf: Vec<u8>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as a frame
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Next complete frame, or `None` if more bytes are needed.
    ///
    /// Whitespace between values is consumed, so once this returns `None` the
    /// buffer is either empty or holds the start of an unfinished value.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.skip_whitespace();
        if self.buf.is_empty() {
            return None;
        }

        let (next, consumed) = {
            let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
            let next = stream.next();
            (next, stream.byte_offset())
        };

        match next {
            None => {
                self.buf.clear();
                None
            }
            Some(Ok(value)) => {
                self.buf.drain(..consumed);
                Some(Frame::Message(value))
            }
            Some(Err(err)) if err.is_eof() => None,
            Some(Err(err)) => {
                let at = error_offset(&self.buf, err.line(), err.column());
                self.discard_line_from(at);
                Some(Frame::Malformed(DecodeError::Malformed(err)))
            }
        }
    }

    fn skip_whitespace(&mut self) {
        let start = self
            .buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buf.len());
        self.buf.drain(..start);
    }

    /// Drop everything up to and including the first newline at or after `at`
    fn discard_line_from(&mut self, at: usize) {
        let at = at.min(self.buf.len());
        match self.buf[at..].iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.buf.drain(..=at + pos);
            }
            None => self.buf.clear(),
        }
    }
}

/// Byte offset of a serde_json error position (1-based line, 1-based column)
fn error_offset(buf: &[u8], line: usize, column: usize) -> usize {
    let line_start = if line <= 1 {
        0
    } else {
        buf.iter()
            .enumerate()
            .filter(|(_, &b)| b == b'\n')
            .nth(line - 2)
            .map(|(i, _)| i + 1)
            .unwrap_or(buf.len())
    };
    line_start + column.saturating_sub(1)
}

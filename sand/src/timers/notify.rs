//! Alerts raised when a running timer reaches its due instant.
//!
//! The registry arms one countdown per running timer and calls an
//! [`ElapsedNotifier`] when it fires. The timer itself is left untouched
//! (still Running, remaining 0) until a client cancels it.

use crate::duration::DurationExt;
use crate::timers::timer::TimerSnapshot;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Sound file shipped alongside sand
pub const SOUND_FILENAME: &str = "timer_sound.opus";

/// Called once per elapsed countdown, from inside the daemon's runtime.
pub trait ElapsedNotifier: Send + Sync + Debug {
    fn timer_elapsed(&self, timer: &TimerSnapshot);
}

/// Desktop notification plus an optional sound, via the platform's helper tools
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier {
    sound: Option<PathBuf>,
}

impl DesktopNotifier {
    pub fn new(sound: Option<PathBuf>) -> Self {
        Self { sound }
    }

    /// Look for the sound in `<data_dir>/sand`, then `/usr/share/sand`
    pub fn from_env() -> Self {
        let sound = find_sound(dirs::data_dir().as_deref());
        if sound.is_none() {
            warn!("Failed to locate notification sound; timers will elapse silently");
        }
        Self::new(sound)
    }
}

impl ElapsedNotifier for DesktopNotifier {
    fn timer_elapsed(&self, timer: &TimerSnapshot) {
        let body = elapsed_message(timer);
        show_notification("Time's up!", &body);
        if let Some(sound) = &self.sound {
            play_sound(sound);
        }
    }
}

/// Body text for the notification
pub fn elapsed_message(timer: &TimerSnapshot) -> String {
    format!(
        "Timer {} ({}) has elapsed",
        timer.id,
        timer.duration.format_colon_separated()
    )
}

/// First existing sound file among the known install locations
pub fn find_sound(data_dir: Option<&Path>) -> Option<PathBuf> {
    let candidates = [
        data_dir.map(|dir| dir.join("sand").join(SOUND_FILENAME)),
        Some(Path::new("/usr/share/sand").join(SOUND_FILENAME)),
    ];
    candidates.into_iter().flatten().find(|path| path.is_file())
}

// Children are dropped without waiting; tokio reaps them in the background

#[cfg(target_os = "macos")]
fn show_notification(title: &str, body: &str) {
    let script = format!(
        "display notification {:?} with title {:?}",
        body.replace('"', "'"),
        title.replace('"', "'")
    );
    spawn_detached(Command::new("osascript").arg("-e").arg(script));
}

#[cfg(not(target_os = "macos"))]
fn show_notification(title: &str, body: &str) {
    spawn_detached(
        Command::new("notify-send")
            .arg("--urgency=critical")
            .arg("--icon=alarm")
            .arg(title)
            .arg(body),
    );
}

#[cfg(target_os = "macos")]
fn play_sound(path: &Path) {
    spawn_detached(Command::new("afplay").arg(path));
}

#[cfg(not(target_os = "macos"))]
fn play_sound(path: &Path) {
    // paplay (PulseAudio/PipeWire) handles opus; fall back to ffplay
    if !spawn_detached(Command::new("paplay").arg(path)) {
        spawn_detached(
            Command::new("ffplay")
                .args(["-nodisp", "-autoexit", "-loglevel", "quiet"])
                .arg(path),
        );
    }
}

fn spawn_detached(command: &mut Command) -> bool {
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    match command.spawn() {
        Ok(_child) => true,
        Err(e) => {
            debug!(program = ?command.as_std().get_program(), "Failed to spawn: {}", e);
            false
        }
    }
}

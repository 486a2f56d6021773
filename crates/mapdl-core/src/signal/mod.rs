//! Cross-process named signals used for the ready/go handshake.

mod file;
mod waitfor;

pub use file::FileSignalChannel;
pub use waitfor::WaitforChannel;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Replacement for characters the OS signal namespace does not accept.
pub const SIGNAL_FILLER: char = '0';

/// Raises and awaits named signals on the host side, and renders the shell
/// commands the engine runs to do the same from inside the control script.
pub trait SignalChannel: Send {
    fn raise(&self, name: &str) -> Result<(), SignalError>;

    /// Blocks until `name` is raised or `timeout` elapses. Returns `false` on
    /// timeout.
    fn await_signal(&self, name: &str, timeout: Duration) -> Result<bool, SignalError>;

    /// Drops a pending signal, if the primitive can hold one.
    fn clear(&self, name: &str) -> Result<(), SignalError>;

    fn engine_raise_command(&self, name: &str) -> String;

    fn engine_await_command(&self, name: &str, timeout: Duration) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("signal '{name}' i/o failed: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },
    #[error("signal command for '{name}' failed to start: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },
    #[error("signal command for '{name}' exited with status {status}")]
    CommandFailed { name: String, status: String },
}

/// Keeps letters, digits and the 128..=255 code point range; everything else
/// becomes [`SIGNAL_FILLER`].
pub fn sanitize_signal_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            let code = ch as u32;
            if ch.is_ascii_alphanumeric() || (128..=255).contains(&code) {
                ch
            } else {
                SIGNAL_FILLER
            }
        })
        .collect()
}

/// The two signals of one session, derived from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalPair {
    /// Raised by the engine: ready for the next instruction.
    pub ready: String,
    /// Raised by the controller: an instruction is available.
    pub go: String,
}

impl SignalPair {
    pub fn for_session(session_name: &str) -> Self {
        let stem = sanitize_signal_name(session_name);
        Self {
            ready: format!("SES{}READY", stem),
            go: format!("SES{}GO", stem),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalBackend {
    File,
    Waitfor,
}

impl Default for SignalBackend {
    fn default() -> Self {
        if cfg!(windows) { Self::Waitfor } else { Self::File }
    }
}

impl SignalBackend {
    pub fn open(self, signal_dir: PathBuf) -> Box<dyn SignalChannel> {
        match self {
            Self::File => Box::new(FileSignalChannel::new(signal_dir)),
            Self::Waitfor => Box::new(WaitforChannel::from_env()),
        }
    }
}

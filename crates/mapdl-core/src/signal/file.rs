use super::{SignalChannel, SignalError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lock-file-plus-poll signals for hosts without a native named-signal
/// primitive. A raised signal is the file `<dir>/<name>.sig`; awaiting
/// consumes it.
#[derive(Debug, Clone)]
pub struct FileSignalChannel {
    dir: PathBuf,
    poll_interval: Duration,
}

impl FileSignalChannel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn signal_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.sig", name))
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.signal_path(name).is_file()
    }

    fn consume(&self, name: &str) -> Result<bool, SignalError> {
        match fs::remove_file(self.signal_path(name)) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SignalError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }
}

impl SignalChannel for FileSignalChannel {
    fn raise(&self, name: &str) -> Result<(), SignalError> {
        fs::write(self.signal_path(name), b"").map_err(|source| SignalError::Io {
            name: name.to_string(),
            source,
        })
    }

    fn await_signal(&self, name: &str, timeout: Duration) -> Result<bool, SignalError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.consume(name)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn clear(&self, name: &str) -> Result<(), SignalError> {
        self.consume(name).map(|_| ())
    }

    fn engine_raise_command(&self, name: &str) -> String {
        format!("touch '{}'", self.signal_path(name).display())
    }

    fn engine_await_command(&self, name: &str, timeout: Duration) -> String {
        let path = self.signal_path(name);
        format!(
            "i=0; while [ ! -f '{path}' ] && [ $i -lt {secs} ]; do sleep 1; i=$((i+1)); done; rm -f '{path}'",
            path = path.display(),
            secs = timeout.as_secs().max(1)
        )
    }
}
